// ==========================================
// 棒料发料窗口 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供应用层命令调用
// ==========================================

pub mod error;
pub mod issue_window_api;
pub mod piece_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use issue_window_api::IssueWindowApi;
pub use piece_api::PieceApi;
