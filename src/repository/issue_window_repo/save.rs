use super::*;
use crate::domain::action_log::{ActionLog, ActionType, EntityType};
use crate::domain::issue_window::NewIssueWindowDraft;
use crate::domain::material::MaterialSnapshot;
use crate::engine::{bar_outcome, draft_numbering};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::material_master_repo::MaterialMasterRepository;
use crate::repository::material_piece_repo::MaterialPieceRepository;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

impl<U: UnitOfWork> IssueWindowDraftRepository<U> {
    // ==========================================
    // SaveDraft - 单事务写入草案
    // ==========================================

    /// 保存新草案，返回 draft_id
    ///
    /// 步骤（同一工作单元）:
    /// 0. 以库内实时长度核对长度快照与按件合计的切割总长
    /// 1. 生成月度编号并推进水位
    /// 2. 写表头（DRAFT）
    /// 3. 批量预取材料快照（最小可用长度）
    /// 4. 按调用方顺序写棒料分配与切割
    /// 5. 条件预留全部去重棒料（仅 AVAILABLE）
    /// 6. 写审计日志
    pub fn save_draft(
        &self,
        draft: &NewIssueWindowDraft,
        options: &SaveDraftOptions,
    ) -> RepositoryResult<i64> {
        // 构造期校验：切割总长不得超过棒料当前长度
        for bar in &draft.bar_assignments {
            bar_outcome::validate_fits(bar)
                .map_err(|e| RepositoryError::ValidationError(e.to_string()))?;
        }

        let result = self.uow.execute(|conn| {
            Self::check_live_lengths_on(conn, draft)?;
            let draft_number = Self::next_draft_number_on(conn, options)?;
            let draft_id = Self::insert_header_on(conn, &draft_number, draft, options)?;

            let mut material_ids: Vec<i64> =
                draft.bar_assignments.iter().map(|b| b.material_id).collect();
            material_ids.sort_unstable();
            material_ids.dedup();
            let snapshots = MaterialMasterRepository::find_snapshots_on(conn, &material_ids)?;

            let mut cut_total = 0usize;
            for (bar_order, bar) in draft.bar_assignments.iter().enumerate() {
                let snapshot = snapshots
                    .get(&bar.material_id)
                    .cloned()
                    .unwrap_or_else(|| MaterialSnapshot::unknown(bar.material_id));
                let threshold = snapshot.scrap_threshold(options.default_min_usable_length);
                let outcome = bar_outcome::compute(
                    bar.piece_current_length,
                    bar.cuts.iter().map(|c| c.cut_length),
                    threshold,
                );

                conn.execute(
                    r#"
                    INSERT INTO issue_window_bar_assignment (
                        draft_id, material_id, material_code, material_name, grade, diameter,
                        piece_id, piece_no, piece_current_length,
                        total_cut_length, remaining_length, will_be_scrap, min_usable_length,
                        sort_order
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                    "#,
                    params![
                        draft_id,
                        bar.material_id,
                        snapshot.material_code,
                        snapshot.material_name,
                        snapshot.grade,
                        snapshot.diameter,
                        bar.piece_id,
                        bar.piece_no,
                        bar.piece_current_length,
                        outcome.total_cut_length,
                        outcome.remaining_length,
                        outcome.will_be_scrap as i64,
                        threshold,
                        bar_order as i64,
                    ],
                )?;
                let bar_id = conn.last_insert_rowid();

                for (cut_order, cut) in bar.cuts.iter().enumerate() {
                    conn.execute(
                        r#"
                        INSERT INTO issue_window_cut (
                            bar_id, draft_id, requisition_item_id, requisition_id,
                            cut_index, cut_length, part_name, job_card_no, requisition_no,
                            sort_order
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                        "#,
                        params![
                            bar_id,
                            draft_id,
                            cut.requisition_item_id,
                            cut.requisition_id,
                            (cut_order + 1) as i64,
                            cut.cut_length,
                            cut.part_name,
                            cut.job_card_no,
                            cut.requisition_no,
                            cut_order as i64,
                        ],
                    )?;
                }
                cut_total += bar.cuts.len();
            }

            // 同一根棒料可出现在多条分配中，只预留一次
            let mut piece_ids: Vec<i64> = draft
                .bar_assignments
                .iter()
                .map(|b| b.piece_id)
                .filter(|id| *id > 0)
                .collect();
            piece_ids.sort_unstable();
            piece_ids.dedup();

            let reserved =
                MaterialPieceRepository::reserve_on(conn, &piece_ids, draft_id, options.now)?;
            if reserved < piece_ids.len() {
                tracing::warn!(
                    draft_number = %draft_number,
                    requested = piece_ids.len(),
                    reserved,
                    "棒料预留冲突，草案回滚"
                );
                return Err(RepositoryError::ReservationConflict {
                    requested: piece_ids.len(),
                    reserved,
                });
            }

            let log = ActionLog::new(
                EntityType::IssueWindowDraft,
                draft_id,
                ActionType::SaveDraft,
                &options.actor,
            )
            .with_payload(serde_json::json!({
                "draft_number": draft_number,
                "requisition_ids": draft.requisition_ids,
                "bar_count": draft.bar_assignments.len(),
                "cut_count": cut_total,
                "piece_ids": piece_ids,
            }));
            ActionLogRepository::insert_on(conn, &log)?;

            Ok((draft_id, draft_number))
        })?;

        tracing::info!(draft_id = result.0, draft_number = %result.1, "发料窗口草案已保存");
        Ok(result.0)
    }

    /// 长度快照必须等于库内当前长度，同一根棒料的切割合计不得超过当前长度
    ///
    /// 在写事务内读取，规划与保存之间发生的消耗会在这里被发现。
    fn check_live_lengths_on(conn: &Connection, draft: &NewIssueWindowDraft) -> RepositoryResult<()> {
        let mut cut_by_piece: HashMap<i64, i64> = HashMap::new();
        for bar in draft.bar_assignments.iter().filter(|b| b.piece_id > 0) {
            *cut_by_piece.entry(bar.piece_id).or_insert(0) += bar.total_cut_length();
        }
        let piece_ids: Vec<i64> = cut_by_piece.keys().copied().collect();
        let live = MaterialPieceRepository::current_lengths_on(conn, &piece_ids)?;

        for bar in draft.bar_assignments.iter().filter(|b| b.piece_id > 0) {
            let actual = live
                .get(&bar.piece_id)
                .copied()
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: "MaterialPiece".to_string(),
                    id: bar.piece_id.to_string(),
                })?;
            if actual != bar.piece_current_length {
                return Err(RepositoryError::PieceLengthConflict {
                    piece_id: bar.piece_id,
                    expected: bar.piece_current_length,
                    actual,
                });
            }
        }

        for (piece_id, total) in &cut_by_piece {
            let actual = live.get(piece_id).copied().unwrap_or(0);
            if *total > actual {
                return Err(RepositoryError::ValidationError(format!(
                    "棒料(id={})切割合计{}超过当前长度{}",
                    piece_id, total, actual
                )));
            }
        }
        Ok(())
    }

    /// 当月下一个编号，并把水位推进到该序号
    fn next_draft_number_on(
        conn: &Connection,
        options: &SaveDraftOptions,
    ) -> RepositoryResult<String> {
        let period = draft_numbering::period_key(&options.number_prefix, options.now.date());

        let high_water: Option<i64> = conn
            .query_row(
                "SELECT last_seq FROM issue_window_number_seq WHERE period = ?1",
                params![period],
                |row| row.get(0),
            )
            .optional()?;

        // 逐个解析序号取最大值：字符串 MAX 在 999 → 1000 时会出错
        let mut stmt = conn.prepare(
            "SELECT draft_number FROM issue_window_draft WHERE draft_number LIKE ?1 || '-%'",
        )?;
        let max_existing = stmt
            .query_map(params![period], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?
            .iter()
            .filter_map(|number| draft_numbering::parse_sequence(&period, number))
            .max();

        let sequence = draft_numbering::next_sequence(high_water, max_existing);
        conn.execute(
            r#"
            INSERT INTO issue_window_number_seq (period, last_seq) VALUES (?1, ?2)
            ON CONFLICT(period) DO UPDATE SET last_seq = MAX(last_seq, excluded.last_seq)
            "#,
            params![period, sequence],
        )?;

        Ok(draft_numbering::format_draft_number(&period, sequence))
    }

    fn insert_header_on(
        conn: &Connection,
        draft_number: &str,
        draft: &NewIssueWindowDraft,
        options: &SaveDraftOptions,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO issue_window_draft (
                draft_number, status, requisition_ids_json, notes, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                draft_number,
                DraftStatus::Draft.as_str(),
                serde_json::to_string(&draft.requisition_ids)?,
                draft.notes,
                options.actor,
                format_ts(options.now),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
