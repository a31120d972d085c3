// ==========================================
// 棒料发料窗口 - 棒料件 API
// ==========================================
// 职责: 件级登记簿的参数校验 + 审计记录
// 约定: 条件更新未命中返回 Ok(false)，由调用方给出"已被分配/状态不符"等提示
// ==========================================

use std::sync::Arc;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType, EntityType};
use crate::domain::piece::{MaterialPiece, PieceReceipt};
use crate::domain::types::PieceStatus;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::material_piece_repo::MaterialPieceRepository;

// ==========================================
// PieceApi - 棒料件 API
// ==========================================
pub struct PieceApi {
    piece_repo: Arc<MaterialPieceRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl PieceApi {
    pub fn new(
        piece_repo: Arc<MaterialPieceRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            piece_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// FIFO 可用棒料
    pub fn get_available_pieces(&self, material_id: i64) -> ApiResult<Vec<MaterialPiece>> {
        validate_id("material_id", material_id)?;
        Ok(self.piece_repo.get_available_pieces(material_id)?)
    }

    /// 满足长度要求的 FIFO 可用棒料
    pub fn get_available_pieces_meeting_length(
        &self,
        material_id: i64,
        required_length: i64,
    ) -> ApiResult<Vec<MaterialPiece>> {
        validate_id("material_id", material_id)?;
        if required_length <= 0 {
            return Err(ApiError::InvalidInput(format!(
                "所需长度必须大于0: {}",
                required_length
            )));
        }
        Ok(self
            .piece_repo
            .get_available_pieces_meeting_length(material_id, required_length)?)
    }

    pub fn total_available_length(&self, material_id: i64) -> ApiResult<i64> {
        validate_id("material_id", material_id)?;
        Ok(self.piece_repo.total_available_length(material_id)?)
    }

    /// 单件查询（不存在返回 None）
    pub fn get_piece(&self, piece_id: i64) -> ApiResult<Option<MaterialPiece>> {
        validate_id("piece_id", piece_id)?;
        Ok(self.piece_repo.find_by_id(piece_id)?)
    }

    pub fn list_pieces(
        &self,
        material_id: i64,
        status: Option<PieceStatus>,
    ) -> ApiResult<Vec<MaterialPiece>> {
        validate_id("material_id", material_id)?;
        Ok(self.piece_repo.list_by_material(material_id, status)?)
    }

    // ==========================================
    // 状态迁移
    // ==========================================

    pub fn allocate_piece(
        &self,
        piece_id: i64,
        requisition_id: i64,
        operator: &str,
    ) -> ApiResult<bool> {
        validate_id("piece_id", piece_id)?;
        validate_id("requisition_id", requisition_id)?;
        validate_operator(operator)?;

        let applied = self.piece_repo.allocate(piece_id, requisition_id)?;
        if applied {
            info!(piece_id, requisition_id, "棒料已分配");
            self.record(
                ActionLog::new(EntityType::MaterialPiece, piece_id, ActionType::AllocatePiece, operator)
                    .with_payload(serde_json::json!({ "requisition_id": requisition_id })),
            );
        } else {
            warn!(piece_id, requisition_id, "分配未生效：棒料不处于 AVAILABLE");
        }
        Ok(applied)
    }

    pub fn issue_piece(
        &self,
        piece_id: i64,
        job_card_id: i64,
        issued_date: NaiveDate,
        issued_by: &str,
    ) -> ApiResult<bool> {
        validate_id("piece_id", piece_id)?;
        validate_id("job_card_id", job_card_id)?;
        validate_operator(issued_by)?;

        let applied = self
            .piece_repo
            .issue(piece_id, job_card_id, issued_date, issued_by)?;
        if applied {
            info!(piece_id, job_card_id, "棒料已发放");
            self.record(
                ActionLog::new(EntityType::MaterialPiece, piece_id, ActionType::IssuePiece, issued_by)
                    .with_payload(serde_json::json!({
                        "job_card_id": job_card_id,
                        "issued_date": issued_date.format("%Y-%m-%d").to_string(),
                    })),
            );
        } else {
            warn!(piece_id, job_card_id, "发放未生效：棒料状态不允许发放");
        }
        Ok(applied)
    }

    /// 按已定稿草案发放其预留棒料
    pub fn issue_reserved_piece(
        &self,
        piece_id: i64,
        draft_id: i64,
        job_card_id: i64,
        issued_date: NaiveDate,
        issued_by: &str,
    ) -> ApiResult<bool> {
        validate_id("piece_id", piece_id)?;
        validate_id("draft_id", draft_id)?;
        validate_id("job_card_id", job_card_id)?;
        validate_operator(issued_by)?;

        let applied = self.piece_repo.issue_reserved(
            piece_id,
            draft_id,
            job_card_id,
            issued_date,
            issued_by,
        )?;
        if applied {
            info!(piece_id, draft_id, job_card_id, "预留棒料已按草案发放");
            self.record(
                ActionLog::new(EntityType::MaterialPiece, piece_id, ActionType::IssuePiece, issued_by)
                    .with_payload(serde_json::json!({
                        "job_card_id": job_card_id,
                        "draft_id": draft_id,
                        "issued_date": issued_date.format("%Y-%m-%d").to_string(),
                    })),
            );
        } else {
            warn!(
                piece_id,
                draft_id,
                "发放未生效：棒料不由该草案预留，或草案尚未定稿"
            );
        }
        Ok(applied)
    }

    /// 消耗长度/重量；超量消耗返回 false
    pub fn consume_piece(
        &self,
        piece_id: i64,
        consumed_length: i64,
        consumed_weight: f64,
        operator: &str,
    ) -> ApiResult<bool> {
        validate_id("piece_id", piece_id)?;
        validate_operator(operator)?;
        if consumed_length < 0 || !consumed_weight.is_finite() || consumed_weight < 0.0 {
            return Err(ApiError::InvalidInput(format!(
                "消耗量不能为负: length={}, weight={}",
                consumed_length, consumed_weight
            )));
        }
        if consumed_length == 0 && consumed_weight == 0.0 {
            return Err(ApiError::InvalidInput("消耗量不能全为0".to_string()));
        }

        let applied = self
            .piece_repo
            .consume(piece_id, consumed_length, consumed_weight)?;
        if applied {
            info!(piece_id, consumed_length, consumed_weight, "棒料已消耗");
            self.record(
                ActionLog::new(EntityType::MaterialPiece, piece_id, ActionType::ConsumePiece, operator)
                    .with_payload(serde_json::json!({
                        "consumed_length": consumed_length,
                        "consumed_weight": consumed_weight,
                    })),
            );
        } else {
            warn!(piece_id, consumed_length, consumed_weight, "消耗未生效：超量或状态不符");
        }
        Ok(applied)
    }

    pub fn return_piece(&self, piece_id: i64, operator: &str) -> ApiResult<bool> {
        validate_id("piece_id", piece_id)?;
        validate_operator(operator)?;

        let applied = self.piece_repo.return_piece(piece_id)?;
        if applied {
            info!(piece_id, "棒料已退回");
            self.record(ActionLog::new(
                EntityType::MaterialPiece,
                piece_id,
                ActionType::ReturnPiece,
                operator,
            ));
        } else {
            warn!(piece_id, "退回未生效：棒料不处于 ALLOCATED/ISSUED");
        }
        Ok(applied)
    }

    // ==========================================
    // 到货入库
    // ==========================================

    /// 批量登记到货棒料（单事务），返回 piece_id 列表
    pub fn receive_pieces(&self, receipts: &[PieceReceipt], operator: &str) -> ApiResult<Vec<i64>> {
        validate_operator(operator)?;
        if receipts.is_empty() {
            return Err(ApiError::InvalidInput("到货清单为空".to_string()));
        }
        for receipt in receipts {
            validate_receipt(receipt)?;
        }

        let ids = self.piece_repo.batch_insert_receipts(receipts)?;
        info!(count = ids.len(), "到货棒料已登记");

        for (piece_id, receipt) in ids.iter().zip(receipts) {
            self.record(
                ActionLog::new(EntityType::MaterialPiece, piece_id, ActionType::ReceivePiece, operator)
                    .with_payload(serde_json::json!({
                        "piece_no": receipt.piece_no,
                        "length": receipt.length,
                        "weight": receipt.weight,
                        "grn_no": receipt.grn_no,
                    })),
            );
        }
        Ok(ids)
    }

    /// 审计记录失败不影响已生效的状态迁移
    fn record(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, action_type = %log.action_type, "记录操作日志失败");
        }
    }
}

pub(crate) fn validate_id(field: &str, id: i64) -> ApiResult<()> {
    if id <= 0 {
        return Err(ApiError::InvalidInput(format!("{}无效: {}", field, id)));
    }
    Ok(())
}

pub(crate) fn validate_operator(operator: &str) -> ApiResult<()> {
    if operator.trim().is_empty() {
        return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
    }
    Ok(())
}

fn validate_receipt(receipt: &PieceReceipt) -> ApiResult<()> {
    if receipt.piece_no.trim().is_empty() {
        return Err(ApiError::InvalidInput("件号不能为空".to_string()));
    }
    validate_id("material_id", receipt.material_id)?;
    if receipt.length <= 0 {
        return Err(ApiError::InvalidInput(format!(
            "棒料{}长度必须大于0: {}",
            receipt.piece_no, receipt.length
        )));
    }
    if !receipt.weight.is_finite() || receipt.weight <= 0.0 {
        return Err(ApiError::InvalidInput(format!(
            "棒料{}重量必须大于0: {}",
            receipt.piece_no, receipt.weight
        )));
    }
    Ok(())
}
