// ==========================================
// 生产实绩分析系统 - 计划/实绩进度分析
// ==========================================
// 职责: 按 指図タイプ（可选 品目 / 日期分桶）汇总 指図数量 与 実績数量
// 输出: 达成率 = actual / order; order 合计为 0 时记为 0
// 排序: 按 (order_type, item_code, bucket) 升序,结果稳定
// 红线: 只读,不修改 Store
// ==========================================

use crate::domain::production::ProductionRecord;
use crate::domain::types::DateBucket;
use crate::repository::error::RepositoryResult;
use crate::repository::production_repo::{ProductionStore, RecordFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 分组参数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressParams {
    pub by_item_code: bool,
    pub date_bucket: Option<DateBucket>, // 按 入力日時 的日期分桶
}

/// 进度表的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRow {
    pub order_type: String,
    pub item_code: Option<String>,
    pub bucket: Option<String>,
    pub record_count: usize,
    pub order_quantity: i64,
    pub actual_quantity: i64,
    pub achievement_ratio: f64,
}

/// 分组键（字段顺序即排序顺序）
type GroupKey = (String, Option<String>, Option<String>);

#[derive(Default)]
struct Totals {
    count: usize,
    order: i64,
    actual: i64,
}

pub struct ProgressAnalyzer {
    params: ProgressParams,
}

impl ProgressAnalyzer {
    pub fn new(params: ProgressParams) -> Self {
        Self { params }
    }

    /// 从 Store 读取后分析
    pub fn run(
        &self,
        store: &dyn ProductionStore,
        filter: &RecordFilter,
    ) -> RepositoryResult<Vec<ProgressRow>> {
        let records = store.query(filter)?;
        Ok(self.analyze(&records))
    }

    /// 纯计算
    pub fn analyze(&self, records: &[ProductionRecord]) -> Vec<ProgressRow> {
        let mut groups: BTreeMap<GroupKey, Totals> = BTreeMap::new();

        for record in records {
            let key = (
                record.order_type.clone(),
                self.params.by_item_code.then(|| record.item_code.clone()),
                self.params
                    .date_bucket
                    .map(|b| b.key_for(record.completion_date())),
            );
            let totals = groups.entry(key).or_default();
            totals.count += 1;
            // 极端数量下饱和,不溢出
            totals.order = totals.order.saturating_add(record.order_quantity);
            totals.actual = totals.actual.saturating_add(record.actual_quantity);
        }

        groups
            .into_iter()
            .map(|((order_type, item_code, bucket), totals)| ProgressRow {
                order_type,
                item_code,
                bucket,
                record_count: totals.count,
                order_quantity: totals.order,
                actual_quantity: totals.actual,
                achievement_ratio: achievement_ratio(totals.actual, totals.order),
            })
            .collect()
    }
}

/// 达成率; 分母为 0 时返回 0
pub fn achievement_ratio(actual: i64, order: i64) -> f64 {
    if order == 0 {
        0.0
    } else {
        actual as f64 / order as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(order_type: &str, item: &str, day: u32, order: i64, actual: i64) -> ProductionRecord {
        ProductionRecord {
            plant: "P100".to_string(),
            storage_location: None,
            item_code: item.to_string(),
            item_text: String::new(),
            order_number: format!("ORD-{}-{}", item, day),
            order_type: order_type.to_string(),
            mrp_controller: "PC1".to_string(),
            order_quantity: order,
            actual_quantity: actual,
            cumulative_quantity: actual,
            remaining_quantity: order - actual,
            input_datetime: NaiveDate::from_ymd_opt(2025, 8, day)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            planned_completion_date: None,
            wbs_element: None,
            sales_order_number: None,
            sales_order_item_number: None,
            amount: None,
        }
    }

    #[test]
    fn test_zero_order_quantity_yields_zero_ratio() {
        let rows = ProgressAnalyzer::new(ProgressParams::default())
            .analyze(&[record("ZP11", "A", 1, 0, 5)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].actual_quantity, 5);
        assert_eq!(rows[0].achievement_ratio, 0.0);
    }

    #[test]
    fn test_group_by_order_type_sorted() {
        let rows = ProgressAnalyzer::new(ProgressParams::default()).analyze(&[
            record("ZP21", "A", 1, 100, 50),
            record("ZP11", "A", 1, 100, 25),
            record("ZP11", "B", 2, 300, 75),
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].order_type, "ZP11");
        assert_eq!(rows[0].order_quantity, 400);
        assert_eq!(rows[0].actual_quantity, 100);
        assert_eq!(rows[0].achievement_ratio, 0.25);
        assert_eq!(rows[1].order_type, "ZP21");
        assert_eq!(rows[1].achievement_ratio, 0.5);
    }

    #[test]
    fn test_group_by_item_and_day() {
        let params = ProgressParams {
            by_item_code: true,
            date_bucket: Some(DateBucket::Day),
        };
        let rows = ProgressAnalyzer::new(params).analyze(&[
            record("ZP11", "B", 2, 10, 1),
            record("ZP11", "A", 2, 10, 1),
            record("ZP11", "A", 1, 10, 1),
            record("ZP11", "A", 1, 10, 1),
        ]);

        let keys: Vec<(Option<&str>, Option<&str>)> = rows
            .iter()
            .map(|r| (r.item_code.as_deref(), r.bucket.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Some("A"), Some("2025-08-01")),
                (Some("A"), Some("2025-08-02")),
                (Some("B"), Some("2025-08-02")),
            ]
        );
        assert_eq!(rows[0].record_count, 2);
    }

    #[test]
    fn test_extreme_quantities_saturate() {
        let rows = ProgressAnalyzer::new(ProgressParams::default()).analyze(&[
            record("ZP11", "A", 1, i64::MAX, i64::MAX),
            record("ZP11", "B", 2, i64::MAX, 1),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_quantity, i64::MAX);
        assert_eq!(rows[0].actual_quantity, i64::MAX);
        assert_eq!(rows[0].achievement_ratio, 1.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(ProgressAnalyzer::new(ProgressParams::default())
            .analyze(&[])
            .is_empty());
    }
}
