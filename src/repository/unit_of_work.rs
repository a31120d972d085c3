// ==========================================
// 棒料发料窗口 - 工作单元 (Unit of Work)
// ==========================================
// 职责: 多步写入（SaveDraft / DeleteDraft）的事务边界
// - begin → work → commit；work 返回 Err 时整体回滚并原样返回错误
// - 协作者（棒料预留、操作日志）通过 &Connection 加入同一事务
// 约束: work 内部禁止再次调用 execute/read（std Mutex 不可重入）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};

/// 工作单元接口
///
/// 草案仓储对该 trait 泛型化，测试可注入故障实现验证回滚。
pub trait UnitOfWork: Send + Sync {
    /// 在单个事务内执行 work
    fn execute<T, F>(&self, work: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T>;

    /// 只读查询（不开启事务）
    fn read<T, F>(&self, query: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T>;
}

// ==========================================
// SqliteUnitOfWork - 基于共享连接的实现
// ==========================================
#[derive(Clone)]
pub struct SqliteUnitOfWork {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUnitOfWork {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享连接（供同一连接上的其他仓储复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl UnitOfWork for SqliteUnitOfWork {
    fn execute<T, F>(&self, work: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T>,
    {
        let conn = self.get_conn()?;
        // IMMEDIATE: 开始即取写锁，避免“先读后写”在并发下升级失败
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        match work(&tx) {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("事务回滚失败: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    fn read<T, F>(&self, query: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T>,
    {
        let conn = self.get_conn()?;
        query(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> SqliteUnitOfWork {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (v INTEGER NOT NULL)", []).unwrap();
        SqliteUnitOfWork::new(Arc::new(Mutex::new(conn)))
    }

    fn count(uow: &SqliteUnitOfWork) -> i64 {
        uow.read(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn test_commit_on_ok() {
        let uow = setup();
        let result = uow.execute(|conn| {
            conn.execute("INSERT INTO t (v) VALUES (1)", [])?;
            conn.execute("INSERT INTO t (v) VALUES (2)", [])?;
            Ok(2)
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(count(&uow), 2);
    }

    #[test]
    fn test_rollback_on_err_keeps_original_error() {
        let uow = setup();
        let result: RepositoryResult<()> = uow.execute(|conn| {
            conn.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Err(RepositoryError::ValidationError("boom".to_string()))
        });

        match result {
            Err(RepositoryError::ValidationError(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected ValidationError, got {:?}", other),
        }
        assert_eq!(count(&uow), 0);
    }
}
