// ==========================================
// 棒料发料窗口 - FIFO 切割方案建议
// ==========================================
// 启发式（非装箱最优解）:
// 1. 按领料单行的给定顺序逐刀处理
// 2. 优先复用本方案中已打开、剩余长度足够的棒料（按打开顺序 first-fit）
// 3. 否则打开候选池中第一根满足长度的棒料：入库日期升序，同日期取更短者（保留长料）
// 4. 没有任何棒料能满足的行记为缺料，不静默丢弃
// ==========================================
// 红线: 只做计算，不做预留；预留在 SaveDraft 的工作单元内完成
// ==========================================

use crate::domain::issue_window::{BarAssignmentInput, CutInput, RequisitionItem};
use crate::domain::piece::MaterialPiece;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// 方案建议结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CutPlan {
    pub bar_assignments: Vec<BarAssignmentInput>,
    pub shortages: Vec<RequisitionItem>,
}

impl CutPlan {
    pub fn is_complete(&self) -> bool {
        self.shortages.is_empty()
    }

    pub fn piece_ids(&self) -> Vec<i64> {
        self.bar_assignments.iter().map(|b| b.piece_id).collect()
    }
}

// 已打开棒料的剩余长度跟踪
struct OpenBar {
    assignment: BarAssignmentInput,
    remaining: i64,
}

#[derive(Debug, Default)]
pub struct CutPlanner;

impl CutPlanner {
    pub fn new() -> Self {
        Self
    }

    /// 生成切割方案
    ///
    /// # 参数
    /// - items: 领料单行（顺序即处理顺序）
    /// - candidates: material_id → 候选棒料（非 AVAILABLE / 长度为 0 的会被忽略）
    pub fn plan(
        &self,
        items: &[RequisitionItem],
        candidates: &HashMap<i64, Vec<MaterialPiece>>,
    ) -> CutPlan {
        let pools: HashMap<i64, Vec<&MaterialPiece>> = candidates
            .iter()
            .map(|(material_id, pieces)| (*material_id, Self::fifo_pool(pieces)))
            .collect();

        let mut open_bars: Vec<OpenBar> = Vec::new();
        let mut used_pieces: HashSet<i64> = HashSet::new();
        let mut shortages = Vec::new();

        for item in items {
            if item.cut_length <= 0 {
                shortages.push(item.clone());
                continue;
            }

            if let Some(bar) = open_bars.iter_mut().find(|b| {
                b.assignment.material_id == item.material_id && b.remaining >= item.cut_length
            }) {
                bar.assignment.cuts.push(CutInput::from(item));
                bar.remaining -= item.cut_length;
                continue;
            }

            let next_piece = pools.get(&item.material_id).and_then(|pool| {
                pool.iter()
                    .find(|p| !used_pieces.contains(&p.piece_id) && p.covers(item.cut_length))
            });

            match next_piece {
                Some(piece) => {
                    used_pieces.insert(piece.piece_id);
                    open_bars.push(OpenBar {
                        assignment: BarAssignmentInput {
                            material_id: piece.material_id,
                            piece_id: piece.piece_id,
                            piece_no: piece.piece_no.clone(),
                            piece_current_length: piece.current_length,
                            cuts: vec![CutInput::from(item)],
                        },
                        remaining: piece.current_length - item.cut_length,
                    });
                }
                None => shortages.push(item.clone()),
            }
        }

        if !shortages.is_empty() {
            tracing::debug!(shortage_count = shortages.len(), "cut plan has shortages");
        }

        CutPlan {
            bar_assignments: open_bars.into_iter().map(|b| b.assignment).collect(),
            shortages,
        }
    }

    // FIFO 顺序: receipt_date ASC, current_length ASC, piece_id ASC
    fn fifo_pool(pieces: &[MaterialPiece]) -> Vec<&MaterialPiece> {
        let mut pool: Vec<&MaterialPiece> = pieces
            .iter()
            .filter(|p| p.status.is_pickable() && p.current_length > 0)
            .collect();
        pool.sort_by(|a, b| {
            a.receipt_date
                .cmp(&b.receipt_date)
                .then(a.current_length.cmp(&b.current_length))
                .then(a.piece_id.cmp(&b.piece_id))
        });
        pool
    }
}
