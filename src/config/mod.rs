// ==========================================
// 棒料发料窗口 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod issue_window_config;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, DEFAULT_LIST_LIMIT};
pub use issue_window_config::{IssueWindowConfigReader, IssueWindowSettings};
