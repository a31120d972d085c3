// ==========================================
// 棒料发料窗口 - 棒料件仓储（件级库存登记簿）
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 所有状态写入均为条件更新（WHERE status = 期望状态），
//       并发的第二个调用方看到 0 行受影响，而不是破坏状态
// 约束: ID 集合通过 json_each(?1) 参数化，不拼接 SQL
// ==========================================

mod queries;
mod transitions;


use crate::domain::piece::{MaterialPiece, PieceReceipt};
use crate::domain::types::{DraftStatus, PieceStatus, PieceTransition};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

const PIECE_COLUMNS: &str = r#"
    piece_id, piece_no, material_id,
    original_length, original_weight, current_length, current_weight,
    status, reserved_by_draft_id, allocated_requisition_id,
    issued_job_card_id, issued_date, issued_by,
    location_code, rack_no,
    grn_no, supplier_name, batch_no, unit_cost, receipt_date,
    created_at, updated_at
"#;

// ==========================================
// MaterialPieceRepository - 棒料件仓储
// ==========================================
pub struct MaterialPieceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialPieceRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 到货入库（唯一的创建入口，由外部收货流程调用）
    // ==========================================

    /// 登记一根到货棒料，返回 piece_id
    pub fn insert_receipt(&self, receipt: &PieceReceipt) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert_receipt_on(&conn, receipt, now())
    }

    /// 批量登记（单事务，任一失败整体回滚）
    pub fn batch_insert_receipts(&self, receipts: &[PieceReceipt]) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let ts = now();
        let mut ids = Vec::with_capacity(receipts.len());
        for receipt in receipts {
            ids.push(Self::insert_receipt_on(&tx, receipt, ts)?);
        }

        tx.commit()?;
        Ok(ids)
    }

    pub(crate) fn insert_receipt_on(
        conn: &Connection,
        receipt: &PieceReceipt,
        ts: NaiveDateTime,
    ) -> RepositoryResult<i64> {
        let ts_str = ts.format(TS_FORMAT).to_string();
        conn.execute(
            r#"
            INSERT INTO material_piece (
                piece_no, material_id,
                original_length, original_weight, current_length, current_weight,
                status, location_code, rack_no,
                grn_no, supplier_name, batch_no, unit_cost, receipt_date,
                created_at, updated_at
            ) VALUES (
                ?1, ?2,
                ?3, ?4, ?3, ?4,
                'AVAILABLE', ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?12
            )
            "#,
            params![
                receipt.piece_no.trim(),
                receipt.material_id,
                receipt.length,
                receipt.weight,
                receipt.location_code,
                receipt.rack_no,
                receipt.grn_no,
                receipt.supplier_name,
                receipt.batch_no,
                receipt.unit_cost,
                receipt.receipt_date.format(DATE_FORMAT).to_string(),
                ts_str,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

pub(crate) fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub(crate) fn format_ids(ids: &[i64]) -> RepositoryResult<String> {
    Ok(serde_json::to_string(ids)?)
}

/// 迁移的源状态集合，供 `status IN (SELECT value FROM json_each(?))` 绑定
pub(crate) fn transition_sources(transition: PieceTransition) -> RepositoryResult<String> {
    Ok(serde_json::to_string(&transition.source_names())?)
}

fn map_row(row: &Row) -> rusqlite::Result<MaterialPiece> {
    let status_str: String = row.get(7)?;
    let status = PieceStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("unknown piece status: {}", status_str).into(),
        )
    })?;

    let issued_date_str: Option<String> = row.get(11)?;
    let receipt_date_str: String = row.get(19)?;
    let created_at_str: String = row.get(20)?;
    let updated_at_str: String = row.get(21)?;

    let receipt_date = NaiveDate::parse_from_str(&receipt_date_str, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(19, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(20, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(21, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(MaterialPiece {
        piece_id: row.get(0)?,
        piece_no: row.get(1)?,
        material_id: row.get(2)?,
        original_length: row.get(3)?,
        original_weight: row.get(4)?,
        current_length: row.get(5)?,
        current_weight: row.get(6)?,
        status,
        reserved_by_draft_id: row.get(8)?,
        allocated_requisition_id: row.get(9)?,
        issued_job_card_id: row.get(10)?,
        issued_date: issued_date_str
            .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        issued_by: row.get(12)?,
        location_code: row.get(13)?,
        rack_no: row.get(14)?,
        grn_no: row.get(15)?,
        supplier_name: row.get(16)?,
        batch_no: row.get(17)?,
        unit_cost: row.get(18)?,
        receipt_date,
        created_at,
        updated_at,
    })
}
