// ==========================================
// 棒料发料窗口 - 材料主数据查询
// ==========================================
// 材料主数据 CRUD 属外部模块；这里只提供发料窗口需要的快照查询
// 约束: ID 集合通过 json_each(?1) 参数化，不拼接 SQL
// ==========================================

use crate::domain::material::MaterialSnapshot;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct MaterialMasterRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialMasterRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入/覆盖材料主数据（种子数据与测试使用）
    pub fn upsert(&self, material: &MaterialSnapshot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO material_master (
                material_id, material_code, material_name, grade, diameter, min_usable_length
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(material_id) DO UPDATE SET
                material_code = excluded.material_code,
                material_name = excluded.material_name,
                grade = excluded.grade,
                diameter = excluded.diameter,
                min_usable_length = excluded.min_usable_length
            "#,
            params![
                material.material_id,
                material.material_code,
                material.material_name,
                material.grade,
                material.diameter,
                material.min_usable_length,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, material_id: i64) -> RepositoryResult<Option<MaterialSnapshot>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                r#"
                SELECT material_id, material_code, material_name, grade, diameter, min_usable_length
                FROM material_master
                WHERE material_id = ?1
                "#,
                params![material_id],
                map_row,
            )
            .optional()?;
        Ok(found)
    }

    /// 批量查询材料快照（一次查询，避免每根棒料一次查找）
    ///
    /// 缺失的材料不出现在结果中，由调用方套用缺省阈值。
    pub fn find_snapshots_on(
        conn: &Connection,
        material_ids: &[i64],
    ) -> RepositoryResult<HashMap<i64, MaterialSnapshot>> {
        if material_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids_json = serde_json::to_string(material_ids)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT material_id, material_code, material_name, grade, diameter, min_usable_length
            FROM material_master
            WHERE material_id IN (SELECT value FROM json_each(?1))
            "#,
        )?;

        let rows = stmt
            .query_map(params![ids_json], map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().map(|m| (m.material_id, m)).collect())
    }
}

fn map_row(row: &Row) -> rusqlite::Result<MaterialSnapshot> {
    Ok(MaterialSnapshot {
        material_id: row.get(0)?,
        material_code: row.get(1)?,
        material_name: row.get(2)?,
        grade: row.get(3)?,
        diameter: row.get(4)?,
        min_usable_length: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_snapshots_skips_unknown_materials() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = MaterialMasterRepository::new(conn.clone());

        repo.upsert(&MaterialSnapshot {
            material_id: 1,
            material_code: "EN8-40".to_string(),
            material_name: "EN8 Round 40".to_string(),
            grade: Some("EN8".to_string()),
            diameter: Some(40.0),
            min_usable_length: Some(500),
        })
        .unwrap();
        repo.upsert(&MaterialSnapshot {
            material_id: 2,
            material_code: "SS304-25".to_string(),
            material_name: "SS304 Round 25".to_string(),
            grade: Some("SS304".to_string()),
            diameter: Some(25.0),
            min_usable_length: None,
        })
        .unwrap();

        let guard = conn.lock().unwrap();
        let snapshots = MaterialMasterRepository::find_snapshots_on(&guard, &[1, 2, 99]).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[&1].min_usable_length, Some(500));
        assert_eq!(snapshots[&2].min_usable_length, None);
        assert!(!snapshots.contains_key(&99));
    }
}
