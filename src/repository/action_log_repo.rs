// ==========================================
// 棒料发料窗口 - 操作日志数据仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// insert_on: 加入调用方事务（工作单元内写审计）
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入操作日志（独立语句）
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_on(&conn, log)
    }

    /// 在给定连接/事务上插入操作日志
    pub fn insert_on(conn: &Connection, log: &ActionLog) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, entity_type, entity_id, action_type,
                actor, action_ts, payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                log.action_id,
                log.entity_type,
                log.entity_id,
                log.action_type,
                log.actor,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;
        Ok(log.action_id.clone())
    }

    /// 按实体查询操作历史（时间升序）
    pub fn find_by_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, entity_type, entity_id, action_type,
                   actor, action_ts, payload_json, detail
            FROM action_log
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY action_ts ASC, rowid ASC
            "#,
        )?;

        let logs = stmt
            .query_map(params![entity_type, entity_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<ActionLog> {
    let action_ts_str: String = row.get(5)?;
    let action_ts = NaiveDateTime::parse_from_str(&action_ts_str, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let payload_json: Option<String> = row.get(6)?;

    Ok(ActionLog {
        action_id: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        action_type: row.get(3)?,
        actor: row.get(4)?,
        action_ts,
        payload_json: payload_json.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action_log::{ActionType, EntityType};

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_insert_and_find_by_entity() {
        let repo = ActionLogRepository::new(setup_test_db());

        let first = ActionLog::new(EntityType::MaterialPiece, 11, ActionType::AllocatePiece, "u1")
            .with_payload(serde_json::json!({ "requisition_id": 5 }));
        let second = ActionLog::new(EntityType::MaterialPiece, 11, ActionType::ReturnPiece, "u2")
            .with_detail("退回");
        let other = ActionLog::new(EntityType::MaterialPiece, 12, ActionType::IssuePiece, "u1");

        repo.insert(&first).unwrap();
        repo.insert(&second).unwrap();
        repo.insert(&other).unwrap();

        let logs = repo.find_by_entity("MATERIAL_PIECE", "11").unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action_type, "AllocatePiece");
        assert_eq!(
            logs[0].payload_json,
            Some(serde_json::json!({ "requisition_id": 5 }))
        );
        assert_eq!(logs[1].detail.as_deref(), Some("退回"));
    }
}
