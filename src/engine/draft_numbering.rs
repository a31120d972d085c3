// ==========================================
// 棒料发料窗口 - 草案编号规则
// ==========================================
// 格式: {前缀}-YYYYMM-NNN，例如 MIS-202403-003
// 规则: NNN = max(本月水位, 本月现存最大序号) + 1，三位补零（超过 999 时自然加宽）
// 红线: 同月编号严格递增，删除后不复用
// ==========================================

use chrono::{Datelike, NaiveDate};

/// 默认编号前缀
pub const DEFAULT_DRAFT_NUMBER_PREFIX: &str = "MIS";

/// 月度编号段，例如 "MIS-202403"
pub fn period_key(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{:04}{:02}", prefix.trim(), date.year(), date.month())
}

/// 拼接完整编号
pub fn format_draft_number(period_key: &str, sequence: i64) -> String {
    format!("{}-{:03}", period_key, sequence)
}

/// 从完整编号中解析序号；不属于该编号段时返回 None
pub fn parse_sequence(period_key: &str, draft_number: &str) -> Option<i64> {
    let rest = draft_number.strip_prefix(period_key)?.strip_prefix('-')?;
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    rest.parse::<i64>().ok()
}

/// 下一个序号
///
/// - high_water: 编号水位表记录的本月已发出最大序号
/// - max_existing: 草案表中本月现存最大序号
pub fn next_sequence(high_water: Option<i64>, max_existing: Option<i64>) -> i64 {
    high_water.unwrap_or(0).max(max_existing.unwrap_or(0)) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_key_and_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let key = period_key(DEFAULT_DRAFT_NUMBER_PREFIX, date);
        assert_eq!(key, "MIS-202403");
        assert_eq!(format_draft_number(&key, 1), "MIS-202403-001");
        assert_eq!(format_draft_number(&key, 42), "MIS-202403-042");
        assert_eq!(format_draft_number(&key, 1000), "MIS-202403-1000");
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("MIS-202403", "MIS-202403-007"), Some(7));
        assert_eq!(parse_sequence("MIS-202403", "MIS-202403-1000"), Some(1000));
        assert_eq!(parse_sequence("MIS-202403", "MIS-202404-007"), None);
        assert_eq!(parse_sequence("MIS-202403", "MIS-202403-"), None);
        assert_eq!(parse_sequence("MIS-202403", "MIS-202403-0x1"), None);
    }

    #[test]
    fn test_next_sequence_never_reuses_deleted_number() {
        // 001、002 已发出，002 被删除：现存最大 1，水位 2 → 下一个 3
        assert_eq!(next_sequence(Some(2), Some(1)), 3);
        // 首次使用
        assert_eq!(next_sequence(None, None), 1);
        // 历史数据没有水位记录
        assert_eq!(next_sequence(None, Some(5)), 6);
    }
}
