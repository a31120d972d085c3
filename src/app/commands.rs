// ==========================================
// 棒料发料窗口 - 命令层
// ==========================================
// 职责: 异步入口，阻塞的 API 调用放到 spawn_blocking 中执行
// 约定: 成功返回 JSON 字符串；失败返回 ErrorResponse 的 JSON 字符串
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::api::ApiError;
use crate::app::state::AppState;
use crate::domain::issue_window::{NewIssueWindowDraft, RequisitionItem};
use crate::domain::types::{DraftStatus, PieceStatus};
use crate::importer::ImportError;

// ==========================================
// 错误响应
// ==========================================

/// 错误响应结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

/// 将ApiError转换为JSON字符串
pub fn map_api_error(err: ApiError) -> String {
    let error_response = ErrorResponse {
        code: match &err {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ApiError::ReservationConflict(_) => "RESERVATION_CONFLICT",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::ImportError(_) => "IMPORT_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
        .to_string(),
        message: err.to_string(),
        details: match &err {
            ApiError::InvalidStateTransition { from, to } => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            _ => None,
        },
    };

    serde_json::to_string(&error_response).unwrap_or_else(|_| err.to_string())
}

/// 导入错误：逐行错误放入 details.rows
pub fn map_import_error(err: ImportError) -> String {
    let details = match &err {
        ImportError::InvalidRows(rows) => Some(serde_json::json!({
            "rows": rows.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        })),
        ImportError::MissingColumn(column) => Some(serde_json::json!({ "column": column })),
        _ => None,
    };
    let error_response = ErrorResponse {
        code: "IMPORT_ERROR".to_string(),
        message: err.to_string(),
        details,
    };
    serde_json::to_string(&error_response).unwrap_or_else(|_| err.to_string())
}

fn invalid_input(message: String) -> String {
    map_api_error(ApiError::InvalidInput(message))
}

/// 解析日期字符串
fn parse_date(date_str: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| invalid_input(format!("日期格式错误（应为YYYY-MM-DD）: {}", e)))
}

fn parse_piece_status(status: Option<String>) -> Result<Option<PieceStatus>, String> {
    match status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => PieceStatus::parse(&s.to_ascii_uppercase())
            .map(Some)
            .ok_or_else(|| invalid_input(format!("未知的棒料状态: {}", s))),
    }
}

fn parse_draft_status(status: Option<String>) -> Result<Option<DraftStatus>, String> {
    match status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => DraftStatus::parse(&s.to_ascii_uppercase())
            .map(Some)
            .ok_or_else(|| invalid_input(format!("未知的草案状态: {}", s))),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("序列化失败: {}", e))
}

/// 在阻塞线程池中执行 API 调用；PerfGuard 与 SQL 同线程
async fn run_blocking<T, F>(op: &'static str, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new(op);
        f()
    })
    .await
    .map_err(|e| format!("任务执行失败: {}", e))?
    .map_err(map_api_error)
}

// ==========================================
// 棒料件命令
// ==========================================

/// FIFO 可用棒料（可选长度下限）
pub async fn list_available_pieces(
    state: &AppState,
    material_id: i64,
    required_length: Option<i64>,
) -> Result<String, String> {
    let piece_api = state.piece_api.clone();
    let result = run_blocking("cmd.list_available_pieces", move || match required_length {
        Some(len) => piece_api.get_available_pieces_meeting_length(material_id, len),
        None => piece_api.get_available_pieces(material_id),
    })
    .await?;

    to_json(&result)
}

/// 按材料列出棒料（可按状态过滤）
pub async fn list_pieces(
    state: &AppState,
    material_id: i64,
    status: Option<String>,
) -> Result<String, String> {
    let status = parse_piece_status(status)?;
    let piece_api = state.piece_api.clone();
    let result = run_blocking("cmd.list_pieces", move || {
        piece_api.list_pieces(material_id, status)
    })
    .await?;

    to_json(&result)
}

/// 可用总长度
pub async fn get_total_available_length(
    state: &AppState,
    material_id: i64,
) -> Result<String, String> {
    let piece_api = state.piece_api.clone();
    let total = run_blocking("cmd.get_total_available_length", move || {
        piece_api.total_available_length(material_id)
    })
    .await?;

    to_json(&serde_json::json!({ "material_id": material_id, "total_length": total }))
}

pub async fn allocate_piece(
    state: &AppState,
    piece_id: i64,
    requisition_id: i64,
    operator: String,
) -> Result<String, String> {
    let piece_api = state.piece_api.clone();
    let applied = run_blocking("cmd.allocate_piece", move || {
        piece_api.allocate_piece(piece_id, requisition_id, &operator)
    })
    .await?;

    to_json(&serde_json::json!({ "piece_id": piece_id, "applied": applied }))
}

pub async fn issue_piece(
    state: &AppState,
    piece_id: i64,
    job_card_id: i64,
    issued_date: String,
    issued_by: String,
) -> Result<String, String> {
    let issued_date = parse_date(&issued_date)?;
    let piece_api = state.piece_api.clone();
    let applied = run_blocking("cmd.issue_piece", move || {
        piece_api.issue_piece(piece_id, job_card_id, issued_date, &issued_by)
    })
    .await?;

    to_json(&serde_json::json!({ "piece_id": piece_id, "applied": applied }))
}

pub async fn issue_reserved_piece(
    state: &AppState,
    piece_id: i64,
    draft_id: i64,
    job_card_id: i64,
    issued_date: String,
    issued_by: String,
) -> Result<String, String> {
    let issued_date = parse_date(&issued_date)?;
    let piece_api = state.piece_api.clone();
    let applied = run_blocking("cmd.issue_reserved_piece", move || {
        piece_api.issue_reserved_piece(piece_id, draft_id, job_card_id, issued_date, &issued_by)
    })
    .await?;

    to_json(&serde_json::json!({
        "piece_id": piece_id,
        "draft_id": draft_id,
        "applied": applied,
    }))
}

pub async fn consume_piece(
    state: &AppState,
    piece_id: i64,
    consumed_length: i64,
    consumed_weight: f64,
    operator: String,
) -> Result<String, String> {
    let piece_api = state.piece_api.clone();
    let applied = run_blocking("cmd.consume_piece", move || {
        piece_api.consume_piece(piece_id, consumed_length, consumed_weight, &operator)
    })
    .await?;

    to_json(&serde_json::json!({ "piece_id": piece_id, "applied": applied }))
}

pub async fn return_piece(
    state: &AppState,
    piece_id: i64,
    operator: String,
) -> Result<String, String> {
    let piece_api = state.piece_api.clone();
    let applied = run_blocking("cmd.return_piece", move || {
        piece_api.return_piece(piece_id, &operator)
    })
    .await?;

    to_json(&serde_json::json!({ "piece_id": piece_id, "applied": applied }))
}

// ==========================================
// 发料窗口命令
// ==========================================

/// 为领料行生成建议切割方案（只读）
///
/// # 参数
/// - items_json: RequisitionItem 数组的 JSON
pub async fn plan_issue_window(state: &AppState, items_json: String) -> Result<String, String> {
    let items: Vec<RequisitionItem> = serde_json::from_str(&items_json)
        .map_err(|e| invalid_input(format!("领料行JSON格式错误: {}", e)))?;

    let issue_window_api = state.issue_window_api.clone();
    let plan = run_blocking("cmd.plan_issue_window", move || {
        issue_window_api.plan_draft(&items)
    })
    .await?;

    to_json(&plan)
}

/// 保存草案
///
/// # 参数
/// - draft_json: NewIssueWindowDraft 的 JSON
pub async fn save_issue_window_draft(
    state: &AppState,
    draft_json: String,
    operator: String,
) -> Result<String, String> {
    let draft: NewIssueWindowDraft = serde_json::from_str(&draft_json)
        .map_err(|e| invalid_input(format!("草案JSON格式错误: {}", e)))?;

    let issue_window_api = state.issue_window_api.clone();
    let draft_id = run_blocking("cmd.save_issue_window_draft", move || {
        issue_window_api.save_draft(&draft, &operator)
    })
    .await?;

    to_json(&serde_json::json!({ "draft_id": draft_id }))
}

pub async fn list_issue_window_drafts(
    state: &AppState,
    status: Option<String>,
) -> Result<String, String> {
    let status = parse_draft_status(status)?;
    let issue_window_api = state.issue_window_api.clone();
    let drafts = run_blocking("cmd.list_issue_window_drafts", move || {
        issue_window_api.list_drafts(status)
    })
    .await?;

    to_json(&drafts)
}

pub async fn get_issue_window_draft_detail(
    state: &AppState,
    draft_id: i64,
) -> Result<String, String> {
    let issue_window_api = state.issue_window_api.clone();
    let detail = run_blocking("cmd.get_issue_window_draft_detail", move || {
        issue_window_api.get_draft_detail(draft_id)
    })
    .await?;

    to_json(&detail)
}

/// 批量草案详情（并发读取，任一失败整体失败）
pub async fn get_issue_window_draft_details(
    state: &AppState,
    draft_ids: Vec<i64>,
) -> Result<String, String> {
    let tasks = draft_ids.into_iter().map(|draft_id| {
        let issue_window_api = state.issue_window_api.clone();
        run_blocking("cmd.get_issue_window_draft_details", move || {
            issue_window_api.get_draft_detail(draft_id)
        })
    });
    let details = futures::future::try_join_all(tasks).await?;

    to_json(&details)
}

pub async fn finalize_issue_window_draft(
    state: &AppState,
    draft_id: i64,
    operator: String,
) -> Result<String, String> {
    let issue_window_api = state.issue_window_api.clone();
    let applied = run_blocking("cmd.finalize_issue_window_draft", move || {
        issue_window_api.finalize_draft(draft_id, &operator)
    })
    .await?;

    to_json(&serde_json::json!({ "draft_id": draft_id, "applied": applied }))
}

pub async fn mark_issue_window_issued(
    state: &AppState,
    draft_id: i64,
    issued_by: String,
    received_by: String,
) -> Result<String, String> {
    let issue_window_api = state.issue_window_api.clone();
    let applied = run_blocking("cmd.mark_issue_window_issued", move || {
        issue_window_api.mark_issued(draft_id, &issued_by, &received_by)
    })
    .await?;

    to_json(&serde_json::json!({ "draft_id": draft_id, "applied": applied }))
}

pub async fn delete_issue_window_draft(
    state: &AppState,
    draft_id: i64,
    operator: String,
) -> Result<String, String> {
    let issue_window_api = state.issue_window_api.clone();
    let applied = run_blocking("cmd.delete_issue_window_draft", move || {
        issue_window_api.delete_draft(draft_id, &operator)
    })
    .await?;

    to_json(&serde_json::json!({ "draft_id": draft_id, "applied": applied }))
}

// ==========================================
// 导入命令
// ==========================================

/// 导入到货清单（CSV）
pub async fn import_piece_receipts(
    state: &AppState,
    file_path: String,
    operator: String,
) -> Result<String, String> {
    let importer = state.receipt_importer.clone();
    let path = PathBuf::from(file_path);
    let summary = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("cmd.import_piece_receipts");
        importer.import_file(&path, &operator)
    })
    .await
    .map_err(|e| format!("任务执行失败: {}", e))?
    .map_err(map_import_error)?;

    to_json(&summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_payload_carries_code() {
        let payload = map_api_error(ApiError::ReservationConflict("piece 7".to_string()));
        let parsed: ErrorResponse = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.code, "RESERVATION_CONFLICT");
        assert!(parsed.details.is_none());

        let payload = map_api_error(ApiError::InvalidStateTransition {
            from: "ISSUED".to_string(),
            to: "DELETED".to_string(),
        });
        let parsed: ErrorResponse = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.code, "INVALID_STATE_TRANSITION");
        assert_eq!(parsed.details.unwrap()["to"], "DELETED");
    }

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!(
            parse_draft_status(Some("finalized".to_string())).unwrap(),
            Some(DraftStatus::Finalized)
        );
        assert_eq!(parse_draft_status(Some("  ".to_string())).unwrap(), None);
        assert!(parse_piece_status(Some("LOST".to_string())).is_err());
    }

    #[test]
    fn test_bad_date_is_invalid_input() {
        let err = parse_date("2024/03/01").unwrap_err();
        assert!(err.contains("INVALID_INPUT"));
    }
}
