use super::*;

/// 重量比较容差（kg）
const WEIGHT_EPSILON: f64 = 1e-6;

impl MaterialPieceRepository {
    // ==========================================
    // 状态迁移（单条条件 UPDATE，返回是否生效）
    // ==========================================

    /// 分配给领料单：AVAILABLE → ALLOCATED
    ///
    /// 两个并发调用方争抢同一根棒料时，恰好一个返回 true。
    pub fn allocate(&self, piece_id: i64, requisition_id: i64) -> RepositoryResult<bool> {
        let transition = PieceTransition::Allocate;
        let conn = self.get_conn()?;
        let ts = now().format(TS_FORMAT).to_string();
        let rows = conn.execute(
            r#"
            UPDATE material_piece
            SET status = ?4,
                allocated_requisition_id = ?2,
                allocated_at = ?3,
                updated_at = ?3
            WHERE piece_id = ?1
              AND status IN (SELECT value FROM json_each(?5))
            "#,
            params![
                piece_id,
                requisition_id,
                ts,
                transition.target().as_str(),
                transition_sources(transition)?,
            ],
        )?;
        Ok(rows > 0)
    }

    /// 直接发放到工卡：AVAILABLE / ALLOCATED → ISSUED
    ///
    /// 被草案预留的棒料不走这里，见 `issue_reserved`。
    pub fn issue(
        &self,
        piece_id: i64,
        job_card_id: i64,
        issued_date: NaiveDate,
        issued_by: &str,
    ) -> RepositoryResult<bool> {
        let transition = PieceTransition::Issue;
        let conn = self.get_conn()?;
        let ts = now().format(TS_FORMAT).to_string();
        let rows = conn.execute(
            r#"
            UPDATE material_piece
            SET status = ?6,
                issued_job_card_id = ?2,
                issued_date = ?3,
                issued_by = ?4,
                updated_at = ?5
            WHERE piece_id = ?1
              AND status IN (SELECT value FROM json_each(?7))
            "#,
            params![
                piece_id,
                job_card_id,
                issued_date.format(DATE_FORMAT).to_string(),
                issued_by,
                ts,
                transition.target().as_str(),
                transition_sources(transition)?,
            ],
        )?;
        Ok(rows > 0)
    }

    /// 按草案发放其预留棒料：RESERVED(该草案) → ISSUED
    ///
    /// 守卫: 棒料由 draft_id 预留，且草案已定稿或已发料；DRAFT 状态的草案不能发放。
    /// 发放后清除预留标记。
    pub fn issue_reserved(
        &self,
        piece_id: i64,
        draft_id: i64,
        job_card_id: i64,
        issued_date: NaiveDate,
        issued_by: &str,
    ) -> RepositoryResult<bool> {
        let transition = PieceTransition::IssueReserved;
        let conn = self.get_conn()?;
        let ts = now().format(TS_FORMAT).to_string();
        let draft_states =
            serde_json::to_string(&DraftStatus::names_where(DraftStatus::allows_piece_issue))?;
        let rows = conn.execute(
            r#"
            UPDATE material_piece
            SET status = ?6,
                issued_job_card_id = ?3,
                issued_date = ?4,
                issued_by = ?5,
                reserved_by_draft_id = NULL,
                reserved_at = NULL,
                updated_at = ?9
            WHERE piece_id = ?1
              AND reserved_by_draft_id = ?2
              AND status IN (SELECT value FROM json_each(?7))
              AND EXISTS (
                  SELECT 1 FROM issue_window_draft d
                  WHERE d.draft_id = ?2
                    AND d.status IN (SELECT value FROM json_each(?8))
              )
            "#,
            params![
                piece_id,
                draft_id,
                job_card_id,
                issued_date.format(DATE_FORMAT).to_string(),
                issued_by,
                transition.target().as_str(),
                transition_sources(transition)?,
                draft_states,
                ts,
            ],
        )?;
        Ok(rows > 0)
    }

    /// 消耗长度/重量
    ///
    /// 守卫: 状态 ∈ {AVAILABLE, ALLOCATED, ISSUED} 且剩余长度、重量足够。
    /// 长度归零时状态转为 CONSUMED，重量同时清零。
    pub fn consume(&self, piece_id: i64, length: i64, weight: f64) -> RepositoryResult<bool> {
        if length < 0 || weight < 0.0 || !weight.is_finite() {
            tracing::warn!(piece_id, length, weight, "拒绝负数/非法消耗量");
            return Ok(false);
        }

        let transition = PieceTransition::Consume;
        let conn = self.get_conn()?;
        let ts = now().format(TS_FORMAT).to_string();
        // UPDATE 右侧表达式读取的都是更新前的值
        let rows = conn.execute(
            r#"
            UPDATE material_piece
            SET current_length = current_length - ?2,
                current_weight = CASE
                    WHEN current_length - ?2 = 0 THEN 0
                    ELSE MAX(current_weight - ?3, 0)
                END,
                status = CASE
                    WHEN current_length - ?2 = 0 THEN ?6
                    ELSE status
                END,
                consumed_at = CASE
                    WHEN current_length - ?2 = 0 THEN ?5
                    ELSE consumed_at
                END,
                updated_at = ?5
            WHERE piece_id = ?1
              AND status IN (SELECT value FROM json_each(?7))
              AND current_length >= ?2
              AND current_weight + ?4 >= ?3
            "#,
            params![
                piece_id,
                length,
                weight,
                WEIGHT_EPSILON,
                ts,
                transition.target().as_str(),
                transition_sources(transition)?,
            ],
        )?;
        Ok(rows > 0)
    }

    /// 退回：ALLOCATED / ISSUED → AVAILABLE，清除分配与发放引用
    pub fn return_piece(&self, piece_id: i64) -> RepositoryResult<bool> {
        let transition = PieceTransition::Return;
        let conn = self.get_conn()?;
        let ts = now().format(TS_FORMAT).to_string();
        let rows = conn.execute(
            r#"
            UPDATE material_piece
            SET status = ?3,
                allocated_requisition_id = NULL,
                allocated_at = NULL,
                issued_job_card_id = NULL,
                issued_date = NULL,
                issued_by = NULL,
                updated_at = ?2
            WHERE piece_id = ?1
              AND status IN (SELECT value FROM json_each(?4))
            "#,
            params![
                piece_id,
                ts,
                transition.target().as_str(),
                transition_sources(transition)?,
            ],
        )?;
        Ok(rows > 0)
    }

    // ==========================================
    // 草案预留（加入调用方事务）
    // ==========================================

    /// 预留棒料给草案：AVAILABLE → RESERVED
    ///
    /// 返回实际预留数；调用方比较请求数判断是否冲突。
    pub(crate) fn reserve_on(
        conn: &Connection,
        piece_ids: &[i64],
        draft_id: i64,
        ts: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        if piece_ids.is_empty() {
            return Ok(0);
        }
        let transition = PieceTransition::Reserve;
        let rows = conn.execute(
            r#"
            UPDATE material_piece
            SET status = ?4,
                reserved_by_draft_id = ?2,
                reserved_at = ?3,
                updated_at = ?3
            WHERE piece_id IN (SELECT value FROM json_each(?1))
              AND status IN (SELECT value FROM json_each(?5))
            "#,
            params![
                format_ids(piece_ids)?,
                draft_id,
                ts.format(TS_FORMAT).to_string(),
                transition.target().as_str(),
                transition_sources(transition)?,
            ],
        )?;
        Ok(rows)
    }

    /// 释放草案预留：RESERVED(该草案) → AVAILABLE
    ///
    /// 已被发放/消耗的棒料不受影响。
    pub(crate) fn release_for_draft_on(
        conn: &Connection,
        draft_id: i64,
        ts: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let transition = PieceTransition::Release;
        let rows = conn.execute(
            r#"
            UPDATE material_piece
            SET status = ?3,
                reserved_by_draft_id = NULL,
                reserved_at = NULL,
                updated_at = ?2
            WHERE reserved_by_draft_id = ?1
              AND status IN (SELECT value FROM json_each(?4))
            "#,
            params![
                draft_id,
                ts.format(TS_FORMAT).to_string(),
                transition.target().as_str(),
                transition_sources(transition)?,
            ],
        )?;
        Ok(rows)
    }
}
