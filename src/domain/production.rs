// ==========================================
// 生产实绩分析系统 - 生产实绩领域模型
// ==========================================
// 职责: 定义生产实绩记录、自然键、拒收记录、落库/运行汇总
// 红线: 记录落库后不可原地修改,修正以更晚的 input_datetime 追加
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 数据库内时间戳的统一文本格式
pub const DATETIME_STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 数据库内日期的统一文本格式
pub const DATE_STORAGE_FORMAT: &str = "%Y-%m-%d";

// ==========================================
// ProductionRecord - 生产实绩记录
// ==========================================
// 用途: 校验器生成,编排器落库,分析引擎只读
// 对齐: production_records 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    // ===== 组织信息 =====
    pub plant: String,                    // プラント
    pub storage_location: Option<String>, // 保管場所

    // ===== 品目 =====
    pub item_code: String, // 品目コード
    pub item_text: String, // 品目テキスト

    // ===== 指图 =====
    pub order_number: String,   // 指図番号（自然键组成部分）
    pub order_type: String,     // 指図タイプ
    pub mrp_controller: String, // MRP管理者

    // ===== 数量 =====
    pub order_quantity: i64,      // 指図数量
    pub actual_quantity: i64,     // 実績数量
    pub cumulative_quantity: i64, // 累計数量
    pub remaining_quantity: i64,  // 残数量

    // ===== 时间 =====
    pub input_datetime: NaiveDateTime,            // 入力日時（自然键组成部分）
    pub planned_completion_date: Option<NaiveDate>, // 計画完了日

    // ===== 关联单据 =====
    pub wbs_element: Option<String>,             // WBS要素
    pub sales_order_number: Option<String>,      // 受注伝票番号
    pub sales_order_item_number: Option<String>, // 受注明細番号

    // ===== 派生 =====
    pub amount: Option<f64>, // 金额 = 実績数量 × 标准原价（运行期派生）
}

impl ProductionRecord {
    /// 自然键 (order_number, input_datetime)
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            order_number: self.order_number.clone(),
            input_datetime: self.input_datetime,
        }
    }

    /// 按数量不变式推算的剩余数量
    pub fn expected_remaining(&self) -> i64 {
        self.order_quantity - self.cumulative_quantity
    }

    /// 是否满足 remaining = order - cumulative
    pub fn is_quantity_consistent(&self) -> bool {
        self.expected_remaining() == self.remaining_quantity
    }

    /// 完成日（入力日時的日期部分）
    pub fn completion_date(&self) -> NaiveDate {
        self.input_datetime.date()
    }
}

// ==========================================
// NaturalKey - 去重自然键
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub order_number: String,
    pub input_datetime: NaiveDateTime,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.order_number,
            self.input_datetime.format(DATETIME_STORAGE_FORMAT)
        )
    }
}

// ==========================================
// RejectReason - 拒收原因代码
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    MissingField,     // 必填字段缺失
    InvalidInteger,   // 无法解析为整数
    NegativeQuantity, // 数量为负
    InvalidDateTime,  // 时间戳格式错误
    InvalidDate,      // 日期格式错误
    RowParseError,    // 行切分失败（列数不一致等）
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingField => "MISSING_FIELD",
            RejectReason::InvalidInteger => "INVALID_INTEGER",
            RejectReason::NegativeQuantity => "NEGATIVE_QUANTITY",
            RejectReason::InvalidDateTime => "INVALID_DATETIME",
            RejectReason::InvalidDate => "INVALID_DATE",
            RejectReason::RowParseError => "ROW_PARSE_ERROR",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Violation - 单条约束违规
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub reason: RejectReason,
    pub field: Option<String>, // 违规字段（行级错误时为空）
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "[{}] {}: {}", self.reason, field, self.message),
            None => write!(f, "[{}] {}", self.reason, self.message),
        }
    }
}

// ==========================================
// RejectRecord - 拒收记录
// ==========================================
// 用途: 只出现在运行报告/日志中,不进入分析库
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectRecord {
    pub line_number: usize,                   // 原始文件行号
    pub raw: HashMap<String, String>,         // 原始行（列名 → 值）
    pub violations: Vec<Violation>,           // 按字段顺序排列的全部违规
}

impl RejectRecord {
    /// 是否包含指定字段的违规
    pub fn mentions_field(&self, field: &str) -> bool {
        self.violations
            .iter()
            .any(|v| v.field.as_deref() == Some(field))
    }

    /// 汇总为单行描述（日志用）
    pub fn describe(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ==========================================
// LoadSummary - 落库汇总
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub inserted: usize,
    pub skipped_duplicate: usize,
}

// ==========================================
// RunSummary - 单次运行汇总
// ==========================================
// 说明: parsed = valid + rejected + filtered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub file_path: String,
    pub parsed_count: usize,
    pub filtered_count: usize, // MRP 管理者前缀过滤掉的行
    pub valid_count: usize,
    pub rejected_count: usize,
    pub inserted_count: usize,
    pub duplicate_count: usize,
    pub rejects: Vec<RejectRecord>,
    pub elapsed_ms: u128,
}

impl RunSummary {
    /// 是否"干净"运行（无拒收）
    pub fn is_clean(&self) -> bool {
        self.rejected_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProductionRecord {
        ProductionRecord {
            plant: "P100".to_string(),
            storage_location: None,
            item_code: "ITEM001".to_string(),
            item_text: "Item".to_string(),
            order_number: "ORD001".to_string(),
            order_type: "ZP11".to_string(),
            mrp_controller: "PC1".to_string(),
            order_quantity: 100,
            actual_quantity: 80,
            cumulative_quantity: 80,
            remaining_quantity: 20,
            input_datetime: NaiveDate::from_ymd_opt(2025, 8, 21)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            planned_completion_date: None,
            wbs_element: None,
            sales_order_number: None,
            sales_order_item_number: None,
            amount: None,
        }
    }

    #[test]
    fn test_quantity_invariant() {
        let mut record = sample();
        assert!(record.is_quantity_consistent());

        record.remaining_quantity = 40;
        assert!(!record.is_quantity_consistent());
        assert_eq!(record.expected_remaining(), 20);
    }

    #[test]
    fn test_natural_key_display() {
        let key = sample().natural_key();
        assert_eq!(key.to_string(), "ORD001@2025-08-21 10:00:00");
    }
}
