// ==========================================
// 棒料发料窗口 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 多步写入经由 UnitOfWork，协作者用 *_on(&Connection) 加入同一事务
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod issue_window_repo;
pub mod material_master_repo;
pub mod material_piece_repo;
pub mod unit_of_work;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use issue_window_repo::{IssueWindowDraftRepository, SaveDraftOptions};
pub use material_master_repo::MaterialMasterRepository;
pub use material_piece_repo::MaterialPieceRepository;
pub use unit_of_work::{SqliteUnitOfWork, UnitOfWork};
