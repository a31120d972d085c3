// ==========================================
// 棒料发料窗口 - 发料窗口草案仓储
// ==========================================
// 状态机: DRAFT → FINALIZED → ISSUED；DRAFT 可删除
// 工作单元: SaveDraft / DeleteDraft 各自是一个完整事务
//   - SaveDraft: 编号 + 表头 + N 棒料分配 + M 切割 + 棒料预留 + 审计
//   - DeleteDraft: 释放预留 + 删除表头（级联）+ 审计
// 红线: 预留不足（被并发草案抢占）→ ReservationConflict，整体回滚
// 红线: 切割顺序由 sort_order 显式保存，不依赖行自然顺序
// ==========================================

mod queries;
mod save;
mod transitions;

#[cfg(test)]
mod tests;

use crate::domain::issue_window::{BarAssignment, Cut, IssueWindowDraftHeader};
use crate::domain::material::DEFAULT_MIN_USABLE_LENGTH;
use crate::domain::types::DraftStatus;
use crate::engine::draft_numbering::DEFAULT_DRAFT_NUMBER_PREFIX;
use crate::repository::unit_of_work::{SqliteUnitOfWork, UnitOfWork};
use chrono::NaiveDateTime;
use rusqlite::{Connection, Row};
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEADER_COLUMNS: &str = r#"
    draft_id, draft_number, status, requisition_ids_json, notes,
    created_by, issued_by, received_by,
    created_at, finalized_at, issued_at
"#;

// ==========================================
// SaveDraftOptions - 保存草案的运行参数
// ==========================================
#[derive(Debug, Clone)]
pub struct SaveDraftOptions {
    pub number_prefix: String,
    pub default_min_usable_length: i64,
    pub actor: String,
    pub now: NaiveDateTime, // 决定编号所属月份
}

impl SaveDraftOptions {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            number_prefix: DEFAULT_DRAFT_NUMBER_PREFIX.to_string(),
            default_min_usable_length: DEFAULT_MIN_USABLE_LENGTH,
            actor: actor.into(),
            now: chrono::Local::now().naive_local(),
        }
    }

    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }
}

// ==========================================
// IssueWindowDraftRepository - 草案仓储
// ==========================================
pub struct IssueWindowDraftRepository<U: UnitOfWork = SqliteUnitOfWork> {
    uow: U,
}

impl<U: UnitOfWork> IssueWindowDraftRepository<U> {
    pub fn new(uow: U) -> Self {
        Self { uow }
    }
}

impl IssueWindowDraftRepository<SqliteUnitOfWork> {
    /// 基于共享连接创建（生产路径）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self::new(SqliteUnitOfWork::new(conn))
    }
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_opt_ts(idx: usize, value: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    value.map(|s| parse_ts(idx, &s)).transpose()
}

fn parse_draft_status(idx: usize, value: &str) -> rusqlite::Result<DraftStatus> {
    DraftStatus::parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown draft status: {}", value).into(),
        )
    })
}

fn map_header(row: &Row) -> rusqlite::Result<IssueWindowDraftHeader> {
    let status: String = row.get(2)?;
    let requisition_ids_json: String = row.get(3)?;
    let requisition_ids: Vec<i64> = serde_json::from_str(&requisition_ids_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: String = row.get(8)?;

    Ok(IssueWindowDraftHeader {
        draft_id: row.get(0)?,
        draft_number: row.get(1)?,
        status: parse_draft_status(2, &status)?,
        requisition_ids,
        notes: row.get(4)?,
        created_by: row.get(5)?,
        issued_by: row.get(6)?,
        received_by: row.get(7)?,
        created_at: parse_ts(8, &created_at)?,
        finalized_at: parse_opt_ts(9, row.get(9)?)?,
        issued_at: parse_opt_ts(10, row.get(10)?)?,
    })
}

fn map_bar(row: &Row) -> rusqlite::Result<BarAssignment> {
    let will_be_scrap: i64 = row.get(12)?;
    Ok(BarAssignment {
        bar_id: row.get(0)?,
        draft_id: row.get(1)?,
        material_id: row.get(2)?,
        material_code: row.get(3)?,
        material_name: row.get(4)?,
        grade: row.get(5)?,
        diameter: row.get(6)?,
        piece_id: row.get(7)?,
        piece_no: row.get(8)?,
        piece_current_length: row.get(9)?,
        total_cut_length: row.get(10)?,
        remaining_length: row.get(11)?,
        will_be_scrap: will_be_scrap != 0,
        min_usable_length: row.get(13)?,
        sort_order: row.get(14)?,
        cuts: Vec::new(),
    })
}

fn map_cut(row: &Row) -> rusqlite::Result<Cut> {
    Ok(Cut {
        cut_id: row.get(0)?,
        bar_id: row.get(1)?,
        requisition_item_id: row.get(2)?,
        requisition_id: row.get(3)?,
        cut_index: row.get(4)?,
        cut_length: row.get(5)?,
        part_name: row.get(6)?,
        job_card_no: row.get(7)?,
        requisition_no: row.get(8)?,
        sort_order: row.get(9)?,
    })
}

pub(crate) fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub(crate) fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}
