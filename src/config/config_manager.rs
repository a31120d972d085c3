// ==========================================
// 棒料发料窗口 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope，当前仅 global)
// 约定: 配置缺失或格式错误时回落到默认值并告警，不阻断业务
// ==========================================

use crate::config::issue_window_config::{IssueWindowConfigReader, IssueWindowSettings};
use crate::db::open_sqlite_connection;
use crate::domain::material::DEFAULT_MIN_USABLE_LENGTH;
use crate::engine::draft_numbering::DEFAULT_DRAFT_NUMBER_PREFIX;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 草案列表默认条数上限
pub const DEFAULT_LIST_LIMIT: i64 = 200;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now', 'localtime'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        tracing::info!(config_key = key, value, "配置已更新");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 所有 global 配置的快照（JSON）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 发料窗口配置（同步读取，供工作单元前的参数准备使用） =====

    pub fn draft_number_prefix(&self) -> Result<String, Box<dyn Error>> {
        let value =
            self.get_config_or_default(config_keys::DRAFT_NUMBER_PREFIX, DEFAULT_DRAFT_NUMBER_PREFIX)?;
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.contains('%') || trimmed.contains('_') {
            tracing::warn!(
                config_key = config_keys::DRAFT_NUMBER_PREFIX,
                raw_value = %value,
                "草案编号前缀非法，使用默认值"
            );
            return Ok(DEFAULT_DRAFT_NUMBER_PREFIX.to_string());
        }
        Ok(trimmed.to_string())
    }

    pub fn default_min_usable_length(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::DEFAULT_MIN_USABLE_LENGTH,
            &DEFAULT_MIN_USABLE_LENGTH.to_string(),
        )?;
        match value.trim().parse::<i64>() {
            Ok(v) if v >= 0 => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = config_keys::DEFAULT_MIN_USABLE_LENGTH,
                    raw_value = %value,
                    "最小可用长度配置格式错误，使用默认值"
                );
                Ok(DEFAULT_MIN_USABLE_LENGTH)
            }
        }
    }

    pub fn list_limit(&self) -> Result<i64, Box<dyn Error>> {
        let value =
            self.get_config_or_default(config_keys::LIST_LIMIT, &DEFAULT_LIST_LIMIT.to_string())?;
        Ok(value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_LIST_LIMIT))
    }

    /// 一次读取全部发料窗口配置
    pub fn issue_window_settings(&self) -> Result<IssueWindowSettings, Box<dyn Error>> {
        Ok(IssueWindowSettings {
            draft_number_prefix: self.draft_number_prefix()?,
            default_min_usable_length: self.default_min_usable_length()?,
            list_limit: self.list_limit()?,
        })
    }
}

// ==========================================
// IssueWindowConfigReader Trait 实现
// ==========================================
#[async_trait]
impl IssueWindowConfigReader for ConfigManager {
    async fn get_draft_number_prefix(&self) -> Result<String, Box<dyn Error>> {
        self.draft_number_prefix()
    }

    async fn get_default_min_usable_length(&self) -> Result<i64, Box<dyn Error>> {
        self.default_min_usable_length()
    }

    async fn get_list_limit(&self) -> Result<i64, Box<dyn Error>> {
        self.list_limit()
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const DRAFT_NUMBER_PREFIX: &str = "issue_window.draft_number_prefix";
    pub const DEFAULT_MIN_USABLE_LENGTH: &str = "issue_window.default_min_usable_length";
    pub const LIST_LIMIT: &str = "issue_window.list_limit";
}
