// ==========================================
// 棒料发料窗口 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod issue_window;
pub mod material;
pub mod piece;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType, EntityType};
pub use issue_window::{
    BarAssignment, BarAssignmentInput, Cut, CutInput, DraftSummary, IssueWindowDraft,
    IssueWindowDraftHeader, NewIssueWindowDraft, RequisitionItem,
};
pub use material::{MaterialSnapshot, DEFAULT_MIN_USABLE_LENGTH};
pub use piece::{MaterialPiece, PieceReceipt};
pub use types::{DraftStatus, PieceStatus, PieceTransition};
