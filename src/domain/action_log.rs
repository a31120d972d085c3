// ==========================================
// 棒料发料窗口 - 操作日志领域模型
// ==========================================
// 红线: 棒料件状态变更、草案状态变更必须留痕
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub entity_type: String, // MATERIAL_PIECE / ISSUE_WINDOW_DRAFT
    pub entity_id: String,
    pub action_type: String,
    pub actor: String,
    pub action_ts: NaiveDateTime,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    /// 以当前本地时间创建日志
    pub fn new(
        entity_type: EntityType,
        entity_id: impl ToString,
        action_type: ActionType,
        actor: &str,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            entity_type: entity_type.as_str().to_string(),
            entity_id: entity_id.to_string(),
            action_type: action_type.as_str().to_string(),
            actor: actor.to_string(),
            action_ts: chrono::Local::now().naive_local(),
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    MaterialPiece,
    IssueWindowDraft,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::MaterialPiece => "MATERIAL_PIECE",
            EntityType::IssueWindowDraft => "ISSUE_WINDOW_DRAFT",
        }
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    ReceivePiece,  // 到货入库
    AllocatePiece, // 分配给领料单
    IssuePiece,    // 发放到工卡
    ConsumePiece,  // 消耗长度
    ReturnPiece,   // 退回
    SaveDraft,     // 保存发料窗口草案
    FinalizeDraft, // 草案定稿
    MarkIssued,    // 草案已发料
    DeleteDraft,   // 删除草案（释放预留）
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ReceivePiece => "ReceivePiece",
            ActionType::AllocatePiece => "AllocatePiece",
            ActionType::IssuePiece => "IssuePiece",
            ActionType::ConsumePiece => "ConsumePiece",
            ActionType::ReturnPiece => "ReturnPiece",
            ActionType::SaveDraft => "SaveDraft",
            ActionType::FinalizeDraft => "FinalizeDraft",
            ActionType::MarkIssued => "MarkIssued",
            ActionType::DeleteDraft => "DeleteDraft",
        }
    }
}
