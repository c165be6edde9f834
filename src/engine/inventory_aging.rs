// ==========================================
// 生产实绩分析系统 - 在库滞留（账龄）分析
// ==========================================
// 分桶: 按 入力日 到 基准日 的整月数
//   月数 N = 满足 入力日 + N 个月 <= 基准日 的最大 N
//   恰好 N 个月的记录落入 N 桶（边界归较老的桶）
//   晚于基准日的记录落入 0 桶
//   N >= max_bucket_months 折叠为开放区间桶
// 指标: 残数量 / 指図数量（分母为 0 时为 0）
// 红线: 只读,不修改 Store
// ==========================================

use crate::config::settings::AgingSettings;
use crate::domain::production::ProductionRecord;
use crate::repository::error::RepositoryResult;
use crate::repository::production_repo::{ProductionStore, RecordFilter};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 分析参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingParams {
    pub reference_date: NaiveDate,
    pub max_bucket_months: u32,
    pub latest_per_order: bool, // 每个指図只取最新快照
}

impl AgingParams {
    pub fn new(reference_date: NaiveDate, settings: &AgingSettings) -> Self {
        Self {
            reference_date,
            max_bucket_months: settings.max_bucket_months.max(1),
            latest_per_order: settings.latest_per_order,
        }
    }
}

/// 账龄桶
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingBucket {
    /// 分桶标签 (例如: "0", "1", "12+")
    pub age_bin: String,

    pub age_min_months: u32,

    /// None 表示无上限
    pub age_max_months: Option<u32>,

    pub record_count: usize,
    pub order_quantity: i64,
    pub actual_quantity: i64,
    pub remaining_quantity: i64,
    pub amount: f64,

    /// 残数量 / 指図数量
    pub remaining_ratio: f64,
}

impl AgingBucket {
    fn empty(months: u32, open_ended: bool) -> Self {
        Self {
            age_bin: if open_ended {
                format!("{}+", months)
            } else {
                months.to_string()
            },
            age_min_months: months,
            age_max_months: if open_ended { None } else { Some(months) },
            record_count: 0,
            order_quantity: 0,
            actual_quantity: 0,
            remaining_quantity: 0,
            amount: 0.0,
            remaining_ratio: 0.0,
        }
    }

    fn add(&mut self, record: &ProductionRecord) {
        self.record_count += 1;
        self.order_quantity = self.order_quantity.saturating_add(record.order_quantity);
        self.actual_quantity = self.actual_quantity.saturating_add(record.actual_quantity);
        self.remaining_quantity = self
            .remaining_quantity
            .saturating_add(record.remaining_quantity);
        self.amount += record.amount.unwrap_or(0.0);
    }
}

pub struct InventoryAgingAnalyzer {
    params: AgingParams,
}

impl InventoryAgingAnalyzer {
    pub fn new(params: AgingParams) -> Self {
        Self { params }
    }

    pub fn run(
        &self,
        store: &dyn ProductionStore,
        filter: &RecordFilter,
    ) -> RepositoryResult<Vec<AgingBucket>> {
        let records = store.query(filter)?;
        Ok(self.analyze(&records))
    }

    /// 输出 0..max_bucket_months-1 各桶 + 1 个开放区间桶,按月数升序
    pub fn analyze(&self, records: &[ProductionRecord]) -> Vec<AgingBucket> {
        let max = self.params.max_bucket_months.max(1);
        let mut buckets: Vec<AgingBucket> = (0..max)
            .map(|m| AgingBucket::empty(m, false))
            .chain(std::iter::once(AgingBucket::empty(max, true)))
            .collect();

        for record in self.select(records) {
            let months = elapsed_months(record.completion_date(), self.params.reference_date);
            let idx = months.min(max) as usize;
            buckets[idx].add(record);
        }

        for bucket in &mut buckets {
            bucket.remaining_ratio = if bucket.order_quantity == 0 {
                0.0
            } else {
                bucket.remaining_quantity as f64 / bucket.order_quantity as f64
            };
        }

        buckets
    }

    fn select<'r>(&self, records: &'r [ProductionRecord]) -> Vec<&'r ProductionRecord> {
        if !self.params.latest_per_order {
            return records.iter().collect();
        }

        let mut latest: HashMap<&str, &ProductionRecord> = HashMap::new();
        for record in records {
            latest
                .entry(record.order_number.as_str())
                .and_modify(|current| {
                    if record.input_datetime > current.input_datetime {
                        *current = record;
                    }
                })
                .or_insert(record);
        }
        latest.into_values().collect()
    }
}

/// 整月数: 满足 from + N 个月 <= to 的最大 N; from 晚于 to 时为 0
pub fn elapsed_months(from: NaiveDate, to: NaiveDate) -> u32 {
    if from >= to {
        return 0;
    }

    // 月份差是上界; 日号未到时回退一个月
    let diff = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    let mut n = diff.max(0) as u32;
    while n > 0 {
        match from.checked_add_months(Months::new(n)) {
            Some(d) if d <= to => break,
            _ => n -= 1,
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn record(order: &str, date: NaiveDate, order_qty: i64, remaining: i64) -> ProductionRecord {
        ProductionRecord {
            plant: "P100".to_string(),
            storage_location: None,
            item_code: "ITEM001".to_string(),
            item_text: String::new(),
            order_number: order.to_string(),
            order_type: "ZP11".to_string(),
            mrp_controller: "PC1".to_string(),
            order_quantity: order_qty,
            actual_quantity: order_qty - remaining,
            cumulative_quantity: order_qty - remaining,
            remaining_quantity: remaining,
            input_datetime: date.and_hms_opt(12, 0, 0).unwrap(),
            planned_completion_date: None,
            wbs_element: None,
            sales_order_number: None,
            sales_order_item_number: None,
            amount: Some(100.0),
        }
    }

    fn params(reference: NaiveDate, latest: bool) -> AgingParams {
        AgingParams {
            reference_date: reference,
            max_bucket_months: 6,
            latest_per_order: latest,
        }
    }

    #[test]
    fn test_elapsed_months_boundary() {
        assert_eq!(elapsed_months(d(2025, 5, 15), d(2025, 8, 15)), 3);
        assert_eq!(elapsed_months(d(2025, 5, 16), d(2025, 8, 15)), 2);
        assert_eq!(elapsed_months(d(2025, 5, 14), d(2025, 8, 15)), 3);
        assert_eq!(elapsed_months(d(2025, 8, 15), d(2025, 8, 15)), 0);
        assert_eq!(elapsed_months(d(2025, 9, 1), d(2025, 8, 15)), 0);
        assert_eq!(elapsed_months(d(2024, 8, 15), d(2025, 8, 15)), 12);
    }

    #[test]
    fn test_elapsed_months_end_of_month() {
        // 1/31 + 1 个月 = 2/28
        assert_eq!(elapsed_months(d(2025, 1, 31), d(2025, 2, 28)), 1);
        assert_eq!(elapsed_months(d(2025, 1, 31), d(2025, 2, 27)), 0);
    }

    #[test]
    fn test_exact_boundary_falls_into_n_bucket() {
        let analyzer = InventoryAgingAnalyzer::new(params(d(2025, 8, 15), false));
        let buckets = analyzer.analyze(&[record("ORD001", d(2025, 6, 15), 100, 40)]);

        assert_eq!(buckets[2].record_count, 1);
        assert_eq!(buckets[3].record_count, 0);
        assert_eq!(buckets[2].remaining_ratio, 0.4);
    }

    #[test]
    fn test_extreme_quantities_saturate() {
        let analyzer = InventoryAgingAnalyzer::new(params(d(2025, 8, 15), false));
        let buckets = analyzer.analyze(&[
            record("ORD001", d(2025, 8, 1), i64::MAX, i64::MAX),
            record("ORD002", d(2025, 8, 2), i64::MAX, i64::MAX),
        ]);
        assert_eq!(buckets[0].record_count, 2);
        assert_eq!(buckets[0].order_quantity, i64::MAX);
        assert_eq!(buckets[0].remaining_quantity, i64::MAX);
        assert_eq!(buckets[0].remaining_ratio, 1.0);
    }

    #[test]
    fn test_open_ended_bucket() {
        let analyzer = InventoryAgingAnalyzer::new(params(d(2025, 8, 15), false));
        let buckets = analyzer.analyze(&[
            record("ORD001", d(2024, 1, 1), 10, 10),
            record("ORD002", d(2025, 2, 15), 10, 0),
        ]);

        assert_eq!(buckets.len(), 7);
        let last = buckets.last().unwrap();
        assert_eq!(last.age_bin, "6+");
        assert_eq!(last.age_max_months, None);
        assert_eq!(last.record_count, 2);
        assert_eq!(last.remaining_ratio, 0.5);
        assert_eq!(last.amount, 200.0);
    }

    #[test]
    fn test_latest_snapshot_per_order() {
        let records = vec![
            record("ORD001", d(2025, 3, 1), 100, 90),
            record("ORD001", d(2025, 8, 1), 100, 10),
        ];

        let latest = InventoryAgingAnalyzer::new(params(d(2025, 8, 15), true)).analyze(&records);
        let total: usize = latest.iter().map(|b| b.record_count).sum();
        assert_eq!(total, 1);
        assert_eq!(latest[0].remaining_quantity, 10);

        let all = InventoryAgingAnalyzer::new(params(d(2025, 8, 15), false)).analyze(&records);
        let total: usize = all.iter().map(|b| b.record_count).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_zero_order_quantity_ratio() {
        let buckets = InventoryAgingAnalyzer::new(params(d(2025, 8, 15), false))
            .analyze(&[record("ORD001", d(2025, 8, 10), 0, 0)]);
        assert_eq!(buckets[0].record_count, 1);
        assert_eq!(buckets[0].remaining_ratio, 0.0);
    }
}
