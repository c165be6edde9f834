// ==========================================
// 生产实绩分析系统 - 数据异常检测
// ==========================================
// 检测项:
// 1. 数量不变式: 残数量 != 指図数量 - 累計数量
// 2. 品目在主数据中不存在
// 3. MRP 管理者不在认可集合内
// ==========================================
// 红线: 只读,检测不修改 Store; 每条结果带自然键与原因代码
// ==========================================

use crate::domain::master::MasterDataLookup;
use crate::domain::production::{NaturalKey, ProductionRecord};
use crate::repository::error::RepositoryResult;
use crate::repository::production_repo::{ProductionStore, RecordFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// 异常原因代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingReason {
    QuantityMismatch,
    UnknownItem,
    UnrecognizedMrpController,
}

impl FindingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingReason::QuantityMismatch => "QUANTITY_MISMATCH",
            FindingReason::UnknownItem => "UNKNOWN_ITEM",
            FindingReason::UnrecognizedMrpController => "UNRECOGNIZED_MRP_CONTROLLER",
        }
    }
}

impl fmt::Display for FindingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条异常
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFinding {
    pub key: NaturalKey,
    pub reason: FindingReason,
    pub item_code: String,
    pub mrp_controller: String,
    pub detail: String,
}

pub struct ErrorDetector<'a> {
    master: &'a dyn MasterDataLookup,
    recognized_controllers: BTreeSet<String>,
}

impl<'a> ErrorDetector<'a> {
    /// # 参数
    /// - `master`: 只读主数据
    /// - `recognized_controllers`: 认可的 MRP 管理者代码
    pub fn new<I, S>(master: &'a dyn MasterDataLookup, recognized_controllers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            master,
            recognized_controllers: recognized_controllers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn run(
        &self,
        store: &dyn ProductionStore,
        filter: &RecordFilter,
    ) -> RepositoryResult<Vec<ErrorFinding>> {
        let records = store.query(filter)?;
        Ok(self.detect(&records))
    }

    /// 检测全部记录,结果按 (自然键, 原因) 排序
    pub fn detect(&self, records: &[ProductionRecord]) -> Vec<ErrorFinding> {
        // 主数据为空时品目检查无意义,跳过
        let check_items = !self.master.is_empty();
        if !check_items {
            warn!("主数据为空,跳过品目存在性检查");
        }

        let mut findings: Vec<ErrorFinding> = records
            .iter()
            .flat_map(|record| self.check_record(record, check_items))
            .collect();

        findings.sort_by(|a, b| (&a.key, a.reason).cmp(&(&b.key, b.reason)));
        debug!(records = records.len(), findings = findings.len(), "异常检测完成");
        findings
    }

    fn check_record(&self, record: &ProductionRecord, check_items: bool) -> Vec<ErrorFinding> {
        let mut out = Vec::new();
        let finding = |reason: FindingReason, detail: String| ErrorFinding {
            key: record.natural_key(),
            reason,
            item_code: record.item_code.clone(),
            mrp_controller: record.mrp_controller.clone(),
            detail,
        };

        if !record.is_quantity_consistent() {
            out.push(finding(
                FindingReason::QuantityMismatch,
                format!(
                    "残数量={} 期望={} (指図数量={} 累計数量={})",
                    record.remaining_quantity,
                    record.expected_remaining(),
                    record.order_quantity,
                    record.cumulative_quantity
                ),
            ));
        }

        if check_items && self.master.lookup(&record.item_code).is_none() {
            out.push(finding(
                FindingReason::UnknownItem,
                format!("品目 {} 不在主数据中", record.item_code),
            ));
        }

        if !self.recognized_controllers.contains(&record.mrp_controller) {
            out.push(finding(
                FindingReason::UnrecognizedMrpController,
                format!("MRP管理者 {} 不在认可集合内", record.mrp_controller),
            ));
        }

        out
    }
}
