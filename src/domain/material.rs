// ==========================================
// 棒料发料窗口 - 材料主数据快照
// ==========================================
// 材料主数据的 CRUD 在外部；这里只定义发料窗口需要的只读快照
// ==========================================

use serde::{Deserialize, Serialize};

/// 最小可用长度缺省值（mm）：材料未配置时使用
pub const DEFAULT_MIN_USABLE_LENGTH: i64 = 300;

/// 材料快照（写入棒料分配时反范式化，保证审计稳定）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialSnapshot {
    pub material_id: i64,
    pub material_code: String,
    pub material_name: String,
    pub grade: Option<String>,
    pub diameter: Option<f64>,
    pub min_usable_length: Option<i64>, // NULL = 未配置
}

impl MaterialSnapshot {
    /// 材料主数据缺失时的占位快照
    pub fn unknown(material_id: i64) -> Self {
        Self {
            material_id,
            ..Default::default()
        }
    }

    /// 余料判废阈值（未配置时取缺省值）
    pub fn scrap_threshold(&self, default_min_usable_length: i64) -> i64 {
        self.min_usable_length.unwrap_or(default_min_usable_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrap_threshold_falls_back_to_default() {
        let unknown = MaterialSnapshot::unknown(7);
        assert_eq!(unknown.scrap_threshold(DEFAULT_MIN_USABLE_LENGTH), 300);

        let configured = MaterialSnapshot {
            material_id: 8,
            material_code: "EN8-40".to_string(),
            material_name: "EN8 Round 40".to_string(),
            grade: Some("EN8".to_string()),
            diameter: Some(40.0),
            min_usable_length: Some(450),
        };
        assert_eq!(configured.scrap_threshold(DEFAULT_MIN_USABLE_LENGTH), 450);
    }
}
