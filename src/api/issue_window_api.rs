// ==========================================
// 棒料发料窗口 - 发料窗口 API
// ==========================================
// 职责: 草案规划/保存/查询/定稿/发料/删除
// 校验: 领料单集合非空、棒料分配非空、切割不超长、棒料处于 AVAILABLE
// 约定: 状态迁移未命中返回 Ok(false)；预留冲突返回 ApiError::ReservationConflict
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::error::{config_error, ApiError, ApiResult};
use crate::api::piece_api::{validate_id, validate_operator};
use crate::config::config_manager::ConfigManager;
use crate::domain::issue_window::{
    DraftSummary, IssueWindowDraft, NewIssueWindowDraft, RequisitionItem,
};
use crate::domain::types::{DraftStatus, PieceStatus};
use crate::engine::bar_outcome;
use crate::engine::cut_planner::{CutPlan, CutPlanner};
use crate::repository::issue_window_repo::{IssueWindowDraftRepository, SaveDraftOptions};
use crate::repository::material_piece_repo::MaterialPieceRepository;

// ==========================================
// IssueWindowApi - 发料窗口 API
// ==========================================
pub struct IssueWindowApi {
    draft_repo: Arc<IssueWindowDraftRepository>,
    piece_repo: Arc<MaterialPieceRepository>,
    config_manager: Arc<ConfigManager>,
    planner: CutPlanner,
}

impl IssueWindowApi {
    pub fn new(
        draft_repo: Arc<IssueWindowDraftRepository>,
        piece_repo: Arc<MaterialPieceRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            draft_repo,
            piece_repo,
            config_manager,
            planner: CutPlanner::new(),
        }
    }

    // ==========================================
    // 规划（只读，不预留）
    // ==========================================

    /// 以当前 FIFO 可用棒料为候选，生成切割方案建议
    pub fn plan_draft(&self, items: &[RequisitionItem]) -> ApiResult<CutPlan> {
        if items.is_empty() {
            return Err(ApiError::InvalidInput("领料单行为空".to_string()));
        }
        for item in items {
            validate_id("material_id", item.material_id)?;
            if item.cut_length <= 0 {
                return Err(ApiError::InvalidInput(format!(
                    "领料单行{}切割长度必须大于0: {}",
                    item.requisition_item_id, item.cut_length
                )));
            }
        }

        let mut candidates = HashMap::new();
        for item in items {
            if !candidates.contains_key(&item.material_id) {
                let pieces = self.piece_repo.get_available_pieces(item.material_id)?;
                candidates.insert(item.material_id, pieces);
            }
        }

        let plan = self.planner.plan(items, &candidates);
        debug!(
            bars = plan.bar_assignments.len(),
            shortages = plan.shortages.len(),
            "切割方案已生成"
        );
        Ok(plan)
    }

    // ==========================================
    // 保存草案
    // ==========================================

    pub fn save_draft(&self, draft: &NewIssueWindowDraft, operator: &str) -> ApiResult<i64> {
        validate_operator(operator)?;
        self.validate_new_draft(draft)?;

        let mut options = SaveDraftOptions::new(operator);
        options.number_prefix = self
            .config_manager
            .draft_number_prefix()
            .map_err(config_error)?;
        options.default_min_usable_length = self
            .config_manager
            .default_min_usable_length()
            .map_err(config_error)?;

        let draft_id = self.draft_repo.save_draft(draft, &options)?;
        info!(draft_id, operator, "草案已创建");
        Ok(draft_id)
    }

    fn validate_new_draft(&self, draft: &NewIssueWindowDraft) -> ApiResult<()> {
        if draft.requisition_ids.is_empty() {
            return Err(ApiError::InvalidInput("草案未关联任何领料单".to_string()));
        }
        if draft.bar_assignments.is_empty() {
            return Err(ApiError::InvalidInput("草案没有任何棒料分配".to_string()));
        }

        // 同一根棒料可拆成多条分配，合计切割长度按件校验
        let mut cut_by_piece: HashMap<i64, i64> = HashMap::new();
        for bar in &draft.bar_assignments {
            validate_id("piece_id", bar.piece_id)?;
            bar_outcome::validate_fits(bar).map_err(|e| ApiError::InvalidInput(e.to_string()))?;
            *cut_by_piece.entry(bar.piece_id).or_insert(0) += bar.total_cut_length();
        }

        let piece_ids: Vec<i64> = cut_by_piece.keys().copied().collect();
        let pieces = self.piece_repo.find_by_ids(&piece_ids)?;
        if pieces.len() != piece_ids.len() {
            let found: Vec<i64> = pieces.iter().map(|p| p.piece_id).collect();
            let missing: Vec<i64> = piece_ids
                .iter()
                .copied()
                .filter(|id| !found.contains(id))
                .collect();
            return Err(ApiError::InvalidInput(format!("棒料不存在: {:?}", missing)));
        }

        for piece in &pieces {
            if piece.status != PieceStatus::Available {
                return Err(ApiError::InvalidInput(format!(
                    "棒料{}当前状态为{}，不可分配",
                    piece.piece_no, piece.status
                )));
            }
            let total = cut_by_piece.get(&piece.piece_id).copied().unwrap_or(0);
            if total > piece.current_length {
                return Err(ApiError::InvalidInput(format!(
                    "棒料{}切割总长{}超过当前长度{}",
                    piece.piece_no, total, piece.current_length
                )));
            }
        }

        for bar in &draft.bar_assignments {
            let piece = pieces.iter().find(|p| p.piece_id == bar.piece_id);
            if let Some(piece) = piece {
                if piece.material_id != bar.material_id {
                    return Err(ApiError::InvalidInput(format!(
                        "棒料{}的材料与分配不一致",
                        piece.piece_no
                    )));
                }
                if piece.current_length != bar.piece_current_length {
                    return Err(ApiError::InvalidInput(format!(
                        "棒料{}当前长度已变化（{} → {}），请重新规划",
                        piece.piece_no, bar.piece_current_length, piece.current_length
                    )));
                }
            }
        }

        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 草案列表（status 为 None 时返回全部）
    pub fn list_drafts(&self, status: Option<DraftStatus>) -> ApiResult<Vec<DraftSummary>> {
        let limit = self.config_manager.list_limit().map_err(config_error)?;
        Ok(self.draft_repo.get_draft_summaries(status, limit)?)
    }

    pub fn get_draft_detail(&self, draft_id: i64) -> ApiResult<IssueWindowDraft> {
        validate_id("draft_id", draft_id)?;
        self.draft_repo
            .get_draft_detail(draft_id)?
            .ok_or_else(|| ApiError::NotFound(format!("发料窗口草案(id={})不存在", draft_id)))
    }

    // ==========================================
    // 状态迁移
    // ==========================================

    pub fn finalize_draft(&self, draft_id: i64, operator: &str) -> ApiResult<bool> {
        validate_id("draft_id", draft_id)?;
        validate_operator(operator)?;
        Ok(self.draft_repo.finalize_draft(draft_id, operator)?)
    }

    pub fn mark_issued(&self, draft_id: i64, issued_by: &str, received_by: &str) -> ApiResult<bool> {
        validate_id("draft_id", draft_id)?;
        if issued_by.trim().is_empty() || received_by.trim().is_empty() {
            return Err(ApiError::InvalidInput("发料人与领料人不能为空".to_string()));
        }
        Ok(self
            .draft_repo
            .mark_issued(draft_id, issued_by.trim(), received_by.trim())?)
    }

    pub fn delete_draft(&self, draft_id: i64, operator: &str) -> ApiResult<bool> {
        validate_id("draft_id", draft_id)?;
        validate_operator(operator)?;
        Ok(self.draft_repo.delete_draft(draft_id, operator)?)
    }
}
