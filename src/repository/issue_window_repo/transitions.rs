use super::*;
use crate::domain::action_log::{ActionLog, ActionType, EntityType};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::material_piece_repo::MaterialPieceRepository;
use rusqlite::params;

const DELETED: &str = "DELETED";

/// 迁移到 next 的前驱状态字符串；状态机中不可达时报错
fn required_source(next: DraftStatus) -> RepositoryResult<&'static str> {
    DraftStatus::source_of(next)
        .map(|s| s.as_str())
        .ok_or_else(|| RepositoryError::InvalidStateTransition {
            from: "NONE".to_string(),
            to: next.as_str().to_string(),
        })
}

impl<U: UnitOfWork> IssueWindowDraftRepository<U> {
    // ==========================================
    // 状态迁移
    // ==========================================

    /// DRAFT → FINALIZED；当前状态不是 DRAFT 时返回 false
    pub fn finalize_draft(&self, draft_id: i64, actor: &str) -> RepositoryResult<bool> {
        let target = DraftStatus::Finalized;
        let source = required_source(target)?;
        let applied = self.uow.execute(|conn| {
            let rows = conn.execute(
                r#"
                UPDATE issue_window_draft
                SET status = ?3, finalized_at = ?2
                WHERE draft_id = ?1 AND status = ?4
                "#,
                params![draft_id, format_ts(now()), target.as_str(), source],
            )?;
            if rows > 0 {
                let log = ActionLog::new(
                    EntityType::IssueWindowDraft,
                    draft_id,
                    ActionType::FinalizeDraft,
                    actor,
                );
                ActionLogRepository::insert_on(conn, &log)?;
            }
            Ok(rows > 0)
        })?;

        if applied {
            tracing::info!(draft_id, "草案已定稿");
        } else {
            tracing::warn!(draft_id, "定稿未生效：草案不存在或不处于 DRAFT");
        }
        Ok(applied)
    }

    /// FINALIZED → ISSUED，记录发料人与领料人；当前状态不是 FINALIZED 时返回 false
    ///
    /// 棒料的实际发放由件级登记簿单独执行，这里不改动预留。
    pub fn mark_issued(
        &self,
        draft_id: i64,
        issued_by: &str,
        received_by: &str,
    ) -> RepositoryResult<bool> {
        let target = DraftStatus::Issued;
        let source = required_source(target)?;
        let applied = self.uow.execute(|conn| {
            let rows = conn.execute(
                r#"
                UPDATE issue_window_draft
                SET status = ?5, issued_at = ?2, issued_by = ?3, received_by = ?4
                WHERE draft_id = ?1 AND status = ?6
                "#,
                params![
                    draft_id,
                    format_ts(now()),
                    issued_by,
                    received_by,
                    target.as_str(),
                    source,
                ],
            )?;
            if rows > 0 {
                let log = ActionLog::new(
                    EntityType::IssueWindowDraft,
                    draft_id,
                    ActionType::MarkIssued,
                    issued_by,
                )
                .with_payload(serde_json::json!({ "received_by": received_by }));
                ActionLogRepository::insert_on(conn, &log)?;
            }
            Ok(rows > 0)
        })?;

        if applied {
            tracing::info!(draft_id, issued_by, received_by, "草案已发料");
        } else {
            tracing::warn!(draft_id, "发料未生效：草案不存在或不处于 FINALIZED");
        }
        Ok(applied)
    }

    /// 删除草案（仅 DRAFT）
    ///
    /// 释放预留与删除在同一工作单元：删除条件未命中时，已执行的释放随事务一起回滚。
    pub fn delete_draft(&self, draft_id: i64, actor: &str) -> RepositoryResult<bool> {
        let deletable = serde_json::to_string(&DraftStatus::names_where(DraftStatus::is_deletable))?;
        let result = self.uow.execute(|conn| {
            let ts = now();
            let released = MaterialPieceRepository::release_for_draft_on(conn, draft_id, ts)?;

            let rows = conn.execute(
                r#"
                DELETE FROM issue_window_draft
                WHERE draft_id = ?1 AND status IN (SELECT value FROM json_each(?2))
                "#,
                params![draft_id, deletable],
            )?;
            if rows == 0 {
                // 返回错误以触发回滚；外层转换为 false
                let current = Self::find_header_on(conn, draft_id)?
                    .map(|h| h.status.as_str().to_string())
                    .unwrap_or_else(|| "MISSING".to_string());
                return Err(RepositoryError::InvalidStateTransition {
                    from: current,
                    to: DELETED.to_string(),
                });
            }

            let log = ActionLog::new(
                EntityType::IssueWindowDraft,
                draft_id,
                ActionType::DeleteDraft,
                actor,
            )
            .with_payload(serde_json::json!({ "released_pieces": released }));
            ActionLogRepository::insert_on(conn, &log)?;

            Ok(released)
        });

        match result {
            Ok(released) => {
                tracing::info!(draft_id, released, "草案已删除，预留已释放");
                Ok(true)
            }
            Err(RepositoryError::InvalidStateTransition { from, to }) if to == DELETED => {
                tracing::warn!(draft_id, from = %from, "删除未生效：草案不存在或不处于 DRAFT");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
