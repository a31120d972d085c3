// ==========================================
// 棒料发料窗口 - 核心库
// ==========================================
// 范围: 棒料件库存登记（按长度 FIFO）+ 发料窗口草案工作流
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 到货清单
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计（SQL 计数/慢查询）
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配与命令
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{DraftStatus, PieceStatus, PieceTransition};

// 领域实体
pub use domain::{
    ActionLog, ActionType, BarAssignment, BarAssignmentInput, Cut, CutInput, DraftSummary,
    EntityType, IssueWindowDraft, MaterialPiece, MaterialSnapshot, NewIssueWindowDraft,
    PieceReceipt, RequisitionItem,
};

// 引擎
pub use engine::{BarOutcome, CutPlan, CutPlanner};

// API
pub use api::{ApiError, IssueWindowApi, PieceApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "棒料发料窗口";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
