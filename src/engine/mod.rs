// ==========================================
// 棒料发料窗口 - 引擎层
// ==========================================
// 职责: 纯业务规则（编号、余料判废、FIFO 切割方案）
// 红线: 不访问数据库
// ==========================================

pub mod bar_outcome;
pub mod cut_planner;
pub mod draft_numbering;

// 重导出
pub use bar_outcome::{BarOutcome, BarValidationError};
pub use cut_planner::{CutPlan, CutPlanner};
pub use draft_numbering::DEFAULT_DRAFT_NUMBER_PREFIX;
