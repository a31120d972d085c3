// ==========================================
// 棒料发料窗口 - 应用层
// ==========================================
// 职责: 应用状态装配 + 异步命令入口
// ==========================================

pub mod commands;
pub mod state;

pub use state::{get_default_db_path, AppState};
