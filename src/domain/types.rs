// ==========================================
// 生产实绩分析系统 - 领域类型定义
// ==========================================
// 职责: MRP 管理者分类、日期分桶、月内周次
// ==========================================

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// MRP 类型 (内製 / 外注 / その他)
// ==========================================
// 规则: PC1-PC3 内製, PC4-PC6 外注, 其余 その他
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MrpType {
    InHouse,    // 内製
    Outsourced, // 外注
    Other,      // その他
}

impl MrpType {
    /// 根据 MRP 管理者代码判定类型
    pub fn classify(mrp_controller: &str) -> Self {
        let Some(num) = mrp_controller.strip_prefix("PC") else {
            return MrpType::Other;
        };

        match num.parse::<u32>() {
            Ok(1..=3) => MrpType::InHouse,
            Ok(4..=6) => MrpType::Outsourced,
            _ => MrpType::Other,
        }
    }

    /// 报表显示标签
    pub fn label(&self) -> &'static str {
        match self {
            MrpType::InHouse => "内製",
            MrpType::Outsourced => "外注",
            MrpType::Other => "その他",
        }
    }
}

impl fmt::Display for MrpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ==========================================
// 日期分桶粒度 (进度分析用)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateBucket {
    Day,   // YYYY-MM-DD
    Week,  // YYYY-MM-W{n}（月内周次）
    Month, // YYYY-MM
}

impl DateBucket {
    /// 生成分桶键（可按字典序排序）
    pub fn key_for(&self, date: NaiveDate) -> String {
        match self {
            DateBucket::Day => date.format("%Y-%m-%d").to_string(),
            DateBucket::Week => format!("{}-W{}", date.format("%Y-%m"), week_of_month(date)),
            DateBucket::Month => date.format("%Y-%m").to_string(),
        }
    }
}

/// 计算日期属于当月第几周
///
/// # 规则
/// - 周从周日开始
/// - 第 1 周: 1 日 ~ 第一个周六
/// - 之后每周: 周日 ~ 周六
pub fn week_of_month(date: NaiveDate) -> u32 {
    let first_weekday = date
        .with_day(1)
        .map(|d| d.weekday().num_days_from_sunday())
        .unwrap_or(0);

    // 第一个周六的日号
    let end_of_first_week = 1 + (6 - first_weekday);

    let day = date.day();
    if day <= end_of_first_week {
        1
    } else {
        (day - end_of_first_week - 1) / 7 + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_week_of_month_month_starting_on_friday() {
        // 2025-08-01 是周五 → 第 1 周为 1~2 日
        assert_eq!(week_of_month(d(2025, 8, 1)), 1);
        assert_eq!(week_of_month(d(2025, 8, 2)), 1);
        assert_eq!(week_of_month(d(2025, 8, 3)), 2);
        assert_eq!(week_of_month(d(2025, 8, 9)), 2);
        assert_eq!(week_of_month(d(2025, 8, 10)), 3);
        assert_eq!(week_of_month(d(2025, 8, 31)), 6);
    }

    #[test]
    fn test_week_of_month_month_starting_on_sunday() {
        // 2025-06-01 是周日 → 第 1 周为 1~7 日
        assert_eq!(week_of_month(d(2025, 6, 1)), 1);
        assert_eq!(week_of_month(d(2025, 6, 7)), 1);
        assert_eq!(week_of_month(d(2025, 6, 8)), 2);
    }

    #[test]
    fn test_week_of_month_month_starting_on_saturday() {
        // 2025-11-01 是周六 → 第 1 周只有 1 日
        assert_eq!(week_of_month(d(2025, 11, 1)), 1);
        assert_eq!(week_of_month(d(2025, 11, 2)), 2);
    }

    #[test]
    fn test_mrp_type_classify() {
        assert_eq!(MrpType::classify("PC1"), MrpType::InHouse);
        assert_eq!(MrpType::classify("PC3"), MrpType::InHouse);
        assert_eq!(MrpType::classify("PC4"), MrpType::Outsourced);
        assert_eq!(MrpType::classify("PC6"), MrpType::Outsourced);
        assert_eq!(MrpType::classify("PC7"), MrpType::Other);
        assert_eq!(MrpType::classify("PC"), MrpType::Other);
        assert_eq!(MrpType::classify("PCX"), MrpType::Other);
        assert_eq!(MrpType::classify("QA1"), MrpType::Other);
    }

    #[test]
    fn test_date_bucket_keys() {
        let date = d(2025, 8, 10);
        assert_eq!(DateBucket::Day.key_for(date), "2025-08-10");
        assert_eq!(DateBucket::Week.key_for(date), "2025-08-W3");
        assert_eq!(DateBucket::Month.key_for(date), "2025-08");
    }
}
