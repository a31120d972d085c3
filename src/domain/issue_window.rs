// ==========================================
// 棒料发料窗口 - 发料窗口草案领域模型
// ==========================================
// 草案 1-* 棒料分配 1-* 切割
// 棒料分配 *-1 棒料件（引用，不拥有；棒料件生命周期独立）
// ==========================================

use crate::domain::types::DraftStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// RequisitionItem - 领料单行（外部输入）
// ==========================================
// 发料窗口不校验领料业务规则，只持久化引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequisitionItem {
    pub requisition_item_id: i64,
    pub requisition_id: i64,
    pub material_id: i64,
    pub cut_length: i64,
    pub part_name: Option<String>,
    pub job_card_no: Option<String>,
    pub requisition_no: Option<String>,
}

// ==========================================
// 写入侧输入
// ==========================================

/// 一刀（按调用方顺序持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutInput {
    pub requisition_item_id: i64,
    pub requisition_id: i64,
    pub cut_length: i64,
    pub part_name: Option<String>,
    pub job_card_no: Option<String>,
    pub requisition_no: Option<String>,
}

impl From<&RequisitionItem> for CutInput {
    fn from(item: &RequisitionItem) -> Self {
        Self {
            requisition_item_id: item.requisition_item_id,
            requisition_id: item.requisition_id,
            cut_length: item.cut_length,
            part_name: item.part_name.clone(),
            job_card_no: item.job_card_no.clone(),
            requisition_no: item.requisition_no.clone(),
        }
    }
}

/// 一根棒料的切割方案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarAssignmentInput {
    pub material_id: i64,
    pub piece_id: i64,
    pub piece_no: String,
    pub piece_current_length: i64, // 分配时刻的棒料当前长度
    pub cuts: Vec<CutInput>,
}

impl BarAssignmentInput {
    pub fn total_cut_length(&self) -> i64 {
        self.cuts.iter().map(|c| c.cut_length).sum()
    }
}

/// 新草案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssueWindowDraft {
    pub requisition_ids: Vec<i64>,
    pub notes: Option<String>,
    pub bar_assignments: Vec<BarAssignmentInput>,
}

// ==========================================
// 读取侧模型
// ==========================================

/// 切割明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    pub cut_id: i64,
    pub bar_id: i64,
    pub requisition_item_id: i64,
    pub requisition_id: i64,
    pub cut_index: i32,
    pub cut_length: i64,
    pub part_name: Option<String>,
    pub job_card_no: Option<String>,
    pub requisition_no: Option<String>,
    pub sort_order: i32,
}

/// 棒料分配
///
/// 不变量:
/// - total_cut_length = Σ cuts.cut_length
/// - remaining_length = piece_current_length - total_cut_length
/// - will_be_scrap = remaining_length < min_usable_length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarAssignment {
    pub bar_id: i64,
    pub draft_id: i64,

    // ===== 材料快照 =====
    pub material_id: i64,
    pub material_code: String,
    pub material_name: String,
    pub grade: Option<String>,
    pub diameter: Option<f64>,

    // ===== 棒料件 =====
    pub piece_id: i64,
    pub piece_no: String,
    pub piece_current_length: i64,

    // ===== 计算结果 =====
    pub total_cut_length: i64,
    pub remaining_length: i64,
    pub will_be_scrap: bool,
    pub min_usable_length: i64,

    pub sort_order: i32,
    pub cuts: Vec<Cut>,
}

/// 草案表头
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueWindowDraftHeader {
    pub draft_id: i64,
    pub draft_number: String,
    pub status: DraftStatus,
    pub requisition_ids: Vec<i64>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub issued_by: Option<String>,
    pub received_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub finalized_at: Option<NaiveDateTime>,
    pub issued_at: Option<NaiveDateTime>,
}

/// 草案完整明细（表头 + 有序棒料分配 + 有序切割）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueWindowDraft {
    pub header: IssueWindowDraftHeader,
    pub bar_assignments: Vec<BarAssignment>,
}

impl IssueWindowDraft {
    /// 草案引用的去重棒料件ID（保持首次出现顺序）
    pub fn piece_ids(&self) -> Vec<i64> {
        let mut ids = Vec::with_capacity(self.bar_assignments.len());
        for bar in &self.bar_assignments {
            if !ids.contains(&bar.piece_id) {
                ids.push(bar.piece_id);
            }
        }
        ids
    }

    pub fn cut_count(&self) -> usize {
        self.bar_assignments.iter().map(|b| b.cuts.len()).sum()
    }

    pub fn scrap_bar_count(&self) -> usize {
        self.bar_assignments.iter().filter(|b| b.will_be_scrap).count()
    }
}

/// 草案列表摘要（不加载切割明细）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSummary {
    pub draft_id: i64,
    pub draft_number: String,
    pub status: DraftStatus,
    pub created_at: NaiveDateTime,
    pub finalized_at: Option<NaiveDateTime>,
    pub issued_at: Option<NaiveDateTime>,
    pub requisition_count: i64,
    pub bar_count: i64,
    pub cut_count: i64,
}
