// ==========================================
// 棒料发料窗口 - 发料窗口配置读取 Trait
// ==========================================
// 职责: 定义发料窗口所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// 发料窗口配置快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueWindowSettings {
    pub draft_number_prefix: String,
    pub default_min_usable_length: i64,
    pub list_limit: i64,
}

// ==========================================
// IssueWindowConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait IssueWindowConfigReader: Send + Sync {
    /// 草案编号前缀
    ///
    /// # 默认值
    /// - MIS
    async fn get_draft_number_prefix(&self) -> Result<String, Box<dyn Error>>;

    /// 材料未配置时的最小可用长度（mm）
    ///
    /// # 默认值
    /// - 300
    async fn get_default_min_usable_length(&self) -> Result<i64, Box<dyn Error>>;

    /// 草案列表条数上限
    ///
    /// # 默认值
    /// - 200
    async fn get_list_limit(&self) -> Result<i64, Box<dyn Error>>;
}
