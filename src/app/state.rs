// ==========================================
// 棒料发料窗口 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接与API实例
// 约束: 所有仓储共用一个连接，保证工作单元内外看到同一份数据
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{IssueWindowApi, PieceApi};
use crate::config::config_manager::ConfigManager;
use crate::importer::PieceReceiptImporter;
use crate::repository::{
    ActionLogRepository, IssueWindowDraftRepository, MaterialMasterRepository,
    MaterialPieceRepository,
};

/// 数据库路径环境变量
pub const ENV_DB_PATH: &str = "MATERIAL_ISSUE_DB_PATH";

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 棒料件API
    pub piece_api: Arc<PieceApi>,

    /// 发料窗口API
    pub issue_window_api: Arc<IssueWindowApi>,

    /// 到货入库导入器
    pub receipt_importer: Arc<PieceReceiptImporter>,

    /// 材料主数据（只读快照，种子数据写入）
    pub material_master_repo: Arc<MaterialMasterRepository>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// 打开数据库、安装 SQL 追踪、幂等建表，然后装配仓储与API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::perf::install_sqlite_tracing(&mut conn);
        crate::db::ensure_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 基于已初始化（已建表）的连接装配
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        // ==========================================
        // Repository层
        // ==========================================
        let piece_repo = Arc::new(MaterialPieceRepository::new(conn.clone()));
        let draft_repo = Arc::new(IssueWindowDraftRepository::from_connection(conn.clone()));
        let material_master_repo = Arc::new(MaterialMasterRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // API层
        // ==========================================
        let piece_api = Arc::new(PieceApi::new(piece_repo.clone(), action_log_repo.clone()));
        let issue_window_api = Arc::new(IssueWindowApi::new(
            draft_repo,
            piece_repo,
            config_manager.clone(),
        ));
        let receipt_importer = Arc::new(PieceReceiptImporter::new(piece_api.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            piece_api,
            issue_window_api,
            receipt_importer,
            material_master_repo,
            action_log_repo,
            config_manager,
        })
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 MATERIAL_ISSUE_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./material_issue.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        let dir = data_dir.join("material-issue-window-dev");
        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("material-issue-window");

        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("material_issue.db");
        } else {
            tracing::warn!("无法创建数据目录 {}，回退到当前目录", dir.display());
        }
    }

    path.to_string_lossy().to_string()
}
