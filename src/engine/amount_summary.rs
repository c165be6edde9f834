// ==========================================
// 生产实绩分析系统 - 金额汇总
// ==========================================
// 输出:
// - 总体汇总（件数/指図数量/実績数量/达成率%/总金额/品目数/指図数）
// - 金额 TOP 10 品目（按品目テキスト）
// - 日别表: (月内周次, 完成日) × MRP 管理者 金额 + 日计
// - 周别表: 周 × MRP 管理者 金额 + 周计 + 总计行
// - MRP 类型（内製/外注/その他）金额
// 红线: 只读,不修改 Store
// ==========================================

use crate::domain::production::ProductionRecord;
use crate::domain::types::{week_of_month, DateBucket, MrpType};
use crate::repository::error::RepositoryResult;
use crate::repository::production_repo::{ProductionStore, RecordFilter};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 总计行标签
pub const GRAND_TOTAL_LABEL: &str = "合計";

/// 金额排行保留的品目数
pub const TOP_ITEM_LIMIT: usize = 10;

/// 总体汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSummary {
    pub record_count: usize,
    pub total_order_quantity: i64,
    pub total_actual_quantity: i64,
    pub achievement_rate: f64, // 百分比,保留 2 位小数
    pub total_amount: f64,
    pub unique_item_count: usize,  // 不同品目コード数
    pub unique_order_count: usize, // 不同指図番号数
}

/// 品目金额
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAmount {
    pub item_text: String,
    pub amount: f64,
}

/// 日别行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAmountRow {
    pub week_of_month: u32,
    pub date: NaiveDate,
    pub amounts: Vec<f64>, // 与 AmountReport.controllers 列对齐
    pub total: f64,
}

/// 周别行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAmountRow {
    pub week: String, // YYYY-MM-W{n}; 总计行为 "合計"
    pub amounts: Vec<f64>,
    pub total: f64,
}

/// MRP 类型金额
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrpTypeAmount {
    pub mrp_type: MrpType,
    pub label: String,
    pub amount: f64,
}

/// 金额汇总结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountReport {
    pub summary: ProductionSummary,
    pub controllers: Vec<String>,
    pub daily: Vec<DailyAmountRow>,
    pub weekly: Vec<WeeklyAmountRow>,
    pub weekly_grand_total: WeeklyAmountRow,
    pub by_mrp_type: Vec<MrpTypeAmount>,
    pub top_items: Vec<ItemAmount>, // 金额降序,最多 TOP_ITEM_LIMIT 条
}

pub struct AmountSummaryAnalyzer {
    controllers: Vec<String>, // 固定列顺序; 数据中出现的其他管理者追加在后
}

impl AmountSummaryAnalyzer {
    pub fn new(controllers: Vec<String>) -> Self {
        Self { controllers }
    }

    pub fn run(
        &self,
        store: &dyn ProductionStore,
        filter: &RecordFilter,
    ) -> RepositoryResult<AmountReport> {
        let records = store.query(filter)?;
        Ok(self.analyze(&records))
    }

    pub fn analyze(&self, records: &[ProductionRecord]) -> AmountReport {
        let controllers = self.columns(records);
        let column_of: BTreeMap<&str, usize> = controllers
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut daily: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        let mut weekly: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut by_type: BTreeMap<MrpType, f64> = BTreeMap::new();

        for record in records {
            let amount = record.amount.unwrap_or(0.0);
            let date = record.completion_date();
            // columns() 已包含所有出现的管理者
            let Some(&col) = column_of.get(record.mrp_controller.as_str()) else {
                continue;
            };

            daily
                .entry(date)
                .or_insert_with(|| vec![0.0; controllers.len()])[col] += amount;
            weekly
                .entry(DateBucket::Week.key_for(date))
                .or_insert_with(|| vec![0.0; controllers.len()])[col] += amount;
            *by_type
                .entry(MrpType::classify(&record.mrp_controller))
                .or_insert(0.0) += amount;
        }

        let daily_rows: Vec<DailyAmountRow> = daily
            .into_iter()
            .map(|(date, amounts)| DailyAmountRow {
                week_of_month: week_of_month(date),
                date,
                total: amounts.iter().sum(),
                amounts,
            })
            .collect();

        let weekly_rows: Vec<WeeklyAmountRow> = weekly
            .into_iter()
            .map(|(week, amounts)| WeeklyAmountRow {
                week,
                total: amounts.iter().sum(),
                amounts,
            })
            .collect();

        let mut grand = vec![0.0; controllers.len()];
        for row in &weekly_rows {
            for (acc, v) in grand.iter_mut().zip(&row.amounts) {
                *acc += v;
            }
        }
        let weekly_grand_total = WeeklyAmountRow {
            week: GRAND_TOTAL_LABEL.to_string(),
            total: grand.iter().sum(),
            amounts: grand,
        };

        let by_mrp_type = by_type
            .into_iter()
            .map(|(mrp_type, amount)| MrpTypeAmount {
                mrp_type,
                label: mrp_type.label().to_string(),
                amount,
            })
            .collect();

        AmountReport {
            summary: summarize(records),
            controllers,
            daily: daily_rows,
            weekly: weekly_rows,
            weekly_grand_total,
            by_mrp_type,
            top_items: top_items(records, TOP_ITEM_LIMIT),
        }
    }

    fn columns(&self, records: &[ProductionRecord]) -> Vec<String> {
        let mut columns = self.controllers.clone();
        let known: BTreeSet<&str> = self.controllers.iter().map(String::as_str).collect();
        let extra: BTreeSet<&str> = records
            .iter()
            .map(|r| r.mrp_controller.as_str())
            .filter(|c| !known.contains(c))
            .collect();
        columns.extend(extra.into_iter().map(str::to_string));
        columns
    }
}

/// 总体汇总; 指図数量合计为 0 时达成率为 0
pub fn summarize(records: &[ProductionRecord]) -> ProductionSummary {
    let total_order_quantity = records
        .iter()
        .fold(0i64, |acc, r| acc.saturating_add(r.order_quantity));
    let total_actual_quantity = records
        .iter()
        .fold(0i64, |acc, r| acc.saturating_add(r.actual_quantity));

    let achievement_rate = if total_order_quantity == 0 {
        0.0
    } else {
        let pct = total_actual_quantity as f64 / total_order_quantity as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    };

    let unique_items: BTreeSet<&str> = records.iter().map(|r| r.item_code.as_str()).collect();
    let unique_orders: BTreeSet<&str> = records.iter().map(|r| r.order_number.as_str()).collect();

    ProductionSummary {
        record_count: records.len(),
        total_order_quantity,
        total_actual_quantity,
        achievement_rate,
        total_amount: records.iter().map(|r| r.amount.unwrap_or(0.0)).sum(),
        unique_item_count: unique_items.len(),
        unique_order_count: unique_orders.len(),
    }
}

/// 按品目テキスト合计金额,降序取前 limit 个（同额按名称升序）
pub fn top_items(records: &[ProductionRecord], limit: usize) -> Vec<ItemAmount> {
    let mut by_item: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        *by_item.entry(record.item_text.as_str()).or_insert(0.0) += record.amount.unwrap_or(0.0);
    }

    let mut items: Vec<ItemAmount> = by_item
        .into_iter()
        .map(|(item_text, amount)| ItemAmount {
            item_text: item_text.to_string(),
            amount,
        })
        .collect();
    // BTreeMap 已按名称升序,稳定排序保持同额顺序
    items.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    items.truncate(limit);
    items
}
