// ==========================================
// 棒料发料窗口 - 单根棒料切割结果计算
// ==========================================
// 规则:
// - total_cut = Σ cut_length
// - remaining = piece_current_length - total_cut
// - will_be_scrap = remaining < 材料最小可用长度
// ==========================================
// 红线: 切割总长不得超过棒料当前长度（构造时拦截，remaining < 0 只可能是数据错误）
// ==========================================

use crate::domain::issue_window::BarAssignmentInput;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单根棒料的计划切割结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarOutcome {
    pub total_cut_length: i64,
    pub remaining_length: i64,
    pub will_be_scrap: bool,
}

/// 计算切割结果（不做合法性校验）
pub fn compute<I>(piece_current_length: i64, cut_lengths: I, scrap_threshold: i64) -> BarOutcome
where
    I: IntoIterator<Item = i64>,
{
    let total_cut_length: i64 = cut_lengths.into_iter().sum();
    let remaining_length = piece_current_length - total_cut_length;
    BarOutcome {
        total_cut_length,
        remaining_length,
        will_be_scrap: remaining_length < scrap_threshold,
    }
}

/// 棒料切割方案校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BarValidationError {
    #[error("棒料{piece_no}没有任何切割")]
    NoCuts { piece_no: String },

    #[error("棒料{piece_no}第{index}刀长度非法: {cut_length}")]
    NonPositiveCut {
        piece_no: String,
        index: usize,
        cut_length: i64,
    },

    #[error("棒料{piece_no}切割总长{total_cut_length}超过当前长度{piece_current_length}")]
    Overcut {
        piece_no: String,
        piece_current_length: i64,
        total_cut_length: i64,
    },
}

/// 校验一根棒料的切割方案
pub fn validate_fits(bar: &BarAssignmentInput) -> Result<(), BarValidationError> {
    if bar.cuts.is_empty() {
        return Err(BarValidationError::NoCuts {
            piece_no: bar.piece_no.clone(),
        });
    }

    if let Some((index, cut)) = bar
        .cuts
        .iter()
        .enumerate()
        .find(|(_, c)| c.cut_length <= 0)
    {
        return Err(BarValidationError::NonPositiveCut {
            piece_no: bar.piece_no.clone(),
            index,
            cut_length: cut.cut_length,
        });
    }

    let total_cut_length = bar.total_cut_length();
    if total_cut_length > bar.piece_current_length {
        return Err(BarValidationError::Overcut {
            piece_no: bar.piece_no.clone(),
            piece_current_length: bar.piece_current_length,
            total_cut_length,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::issue_window::CutInput;

    fn cut(item_id: i64, len: i64) -> CutInput {
        CutInput {
            requisition_item_id: item_id,
            requisition_id: 1,
            cut_length: len,
            part_name: None,
            job_card_no: None,
            requisition_no: None,
        }
    }

    #[test]
    fn test_remnant_above_threshold_is_not_scrap() {
        let outcome = compute(6000, [2000, 1500], 300);
        assert_eq!(outcome.total_cut_length, 3500);
        assert_eq!(outcome.remaining_length, 2500);
        assert!(!outcome.will_be_scrap);
    }

    #[test]
    fn test_remnant_below_threshold_is_scrap() {
        let outcome = compute(6000, [2000, 1500, 2300], 300);
        assert_eq!(outcome.total_cut_length, 5800);
        assert_eq!(outcome.remaining_length, 200);
        assert!(outcome.will_be_scrap);
    }

    #[test]
    fn test_remnant_equal_to_threshold_is_usable() {
        let outcome = compute(1000, [700], 300);
        assert_eq!(outcome.remaining_length, 300);
        assert!(!outcome.will_be_scrap);
    }

    #[test]
    fn test_validate_fits_rejects_overcut() {
        let bar = BarAssignmentInput {
            material_id: 1,
            piece_id: 10,
            piece_no: "P-10".to_string(),
            piece_current_length: 3000,
            cuts: vec![cut(1, 2000), cut(2, 1500)],
        };
        assert_eq!(
            validate_fits(&bar),
            Err(BarValidationError::Overcut {
                piece_no: "P-10".to_string(),
                piece_current_length: 3000,
                total_cut_length: 3500,
            })
        );
    }

    #[test]
    fn test_validate_fits_rejects_empty_and_zero_cuts() {
        let mut bar = BarAssignmentInput {
            material_id: 1,
            piece_id: 10,
            piece_no: "P-10".to_string(),
            piece_current_length: 3000,
            cuts: vec![],
        };
        assert!(matches!(
            validate_fits(&bar),
            Err(BarValidationError::NoCuts { .. })
        ));

        bar.cuts = vec![cut(1, 500), cut(2, 0)];
        assert!(matches!(
            validate_fits(&bar),
            Err(BarValidationError::NonPositiveCut { index: 1, .. })
        ));

        bar.cuts = vec![cut(1, 3000)];
        assert!(validate_fits(&bar).is_ok());
    }
}
