use super::*;
use crate::domain::issue_window::{DraftSummary, IssueWindowDraft};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

impl<U: UnitOfWork> IssueWindowDraftRepository<U> {
    /// 草案列表（不加载切割明细），按创建时间倒序
    ///
    /// status 为 None 时返回全部状态。
    pub fn get_draft_summaries(
        &self,
        status: Option<DraftStatus>,
        limit: i64,
    ) -> RepositoryResult<Vec<DraftSummary>> {
        self.uow.read(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT d.draft_id, d.draft_number, d.status,
                       d.created_at, d.finalized_at, d.issued_at,
                       json_array_length(d.requisition_ids_json),
                       (SELECT COUNT(*) FROM issue_window_bar_assignment b
                         WHERE b.draft_id = d.draft_id),
                       (SELECT COUNT(*) FROM issue_window_cut c
                         WHERE c.draft_id = d.draft_id)
                FROM issue_window_draft d
                WHERE (?1 IS NULL OR d.status = ?1)
                ORDER BY d.created_at DESC, d.draft_id DESC
                LIMIT ?2
                "#,
            )?;

            let summaries = stmt
                .query_map(params![status.map(|s| s.as_str()), limit], |row| {
                    let status: String = row.get(2)?;
                    let created_at: String = row.get(3)?;
                    Ok(DraftSummary {
                        draft_id: row.get(0)?,
                        draft_number: row.get(1)?,
                        status: parse_draft_status(2, &status)?,
                        created_at: parse_ts(3, &created_at)?,
                        finalized_at: parse_opt_ts(4, row.get(4)?)?,
                        issued_at: parse_opt_ts(5, row.get(5)?)?,
                        requisition_count: row.get(6)?,
                        bar_count: row.get(7)?,
                        cut_count: row.get(8)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            tracing::debug!(count = summaries.len(), "草案列表查询完成");
            Ok(summaries)
        })
    }

    /// 草案表头（不存在时 None）
    pub fn find_header(&self, draft_id: i64) -> RepositoryResult<Option<IssueWindowDraftHeader>> {
        self.uow.read(|conn| Self::find_header_on(conn, draft_id))
    }

    pub(crate) fn find_header_on(
        conn: &Connection,
        draft_id: i64,
    ) -> RepositoryResult<Option<IssueWindowDraftHeader>> {
        let sql = format!(
            "SELECT {} FROM issue_window_draft WHERE draft_id = ?1",
            HEADER_COLUMNS
        );
        let header = conn
            .query_row(&sql, params![draft_id], map_header)
            .optional()?;
        Ok(header)
    }

    /// 草案完整明细
    ///
    /// 表头 / 棒料分配 / 切割三个结果集分别查询，再按 sort_order 组装为嵌套结构。
    pub fn get_draft_detail(&self, draft_id: i64) -> RepositoryResult<Option<IssueWindowDraft>> {
        self.uow.read(|conn| {
            let header = match Self::find_header_on(conn, draft_id)? {
                Some(h) => h,
                None => return Ok(None),
            };

            let mut bar_stmt = conn.prepare(
                r#"
                SELECT bar_id, draft_id, material_id, material_code, material_name, grade, diameter,
                       piece_id, piece_no, piece_current_length,
                       total_cut_length, remaining_length, will_be_scrap, min_usable_length,
                       sort_order
                FROM issue_window_bar_assignment
                WHERE draft_id = ?1
                ORDER BY sort_order ASC, bar_id ASC
                "#,
            )?;
            let mut bar_assignments = bar_stmt
                .query_map(params![draft_id], map_bar)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut cut_stmt = conn.prepare(
                r#"
                SELECT cut_id, bar_id, requisition_item_id, requisition_id,
                       cut_index, cut_length, part_name, job_card_no, requisition_no,
                       sort_order
                FROM issue_window_cut
                WHERE draft_id = ?1
                ORDER BY bar_id ASC, sort_order ASC, cut_id ASC
                "#,
            )?;
            let cuts = cut_stmt
                .query_map(params![draft_id], map_cut)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut cuts_by_bar: HashMap<i64, Vec<Cut>> = HashMap::new();
            for cut in cuts {
                cuts_by_bar.entry(cut.bar_id).or_default().push(cut);
            }
            for bar in &mut bar_assignments {
                bar.cuts = cuts_by_bar.remove(&bar.bar_id).unwrap_or_default();
            }

            Ok(Some(IssueWindowDraft {
                header,
                bar_assignments,
            }))
        })
    }

    /// 草案引用的去重棒料件ID（按首次出现的分配顺序）
    pub fn list_pieces_of_draft(&self, draft_id: i64) -> RepositoryResult<Vec<i64>> {
        self.uow.read(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT piece_id
                FROM issue_window_bar_assignment
                WHERE draft_id = ?1
                GROUP BY piece_id
                ORDER BY MIN(sort_order) ASC
                "#,
            )?;
            let ids = stmt
                .query_map(params![draft_id], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }
}
