// ==========================================
// 生产实绩分析系统 - 记录校验器
// ==========================================
// 职责: 原始行 → ProductionRecord 类型转换 + 约束校验
// 规则: 全量校验,一次收集该行的全部违规（不止第一条）
// 红线: 纯函数,第 N 行的校验不依赖第 N-1 行
// ==========================================

use crate::domain::production::{ProductionRecord, RejectReason, RejectRecord, Violation};
use crate::importer::file_parser::RawRow;
use chrono::{NaiveDate, NaiveDateTime};

/// 入力日時 接受的格式
const DATETIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// 計画完了日 接受的格式
const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d", "%Y/%m/%d"];

// ==========================================
// ProductionField - 导出列定义
// ==========================================
// 列名为导出文件的日文表头,英文字段名作为别名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductionField {
    Plant,
    StorageLocation,
    ItemCode,
    ItemText,
    OrderNumber,
    OrderType,
    MrpController,
    OrderQuantity,
    ActualQuantity,
    CumulativeQuantity,
    RemainingQuantity,
    InputDatetime,
    PlannedCompletionDate,
    WbsElement,
    SalesOrderNumber,
    SalesOrderItemNumber,
}

impl ProductionField {
    /// 导出文件表头
    pub fn label(&self) -> &'static str {
        match self {
            ProductionField::Plant => "プラント",
            ProductionField::StorageLocation => "保管場所",
            ProductionField::ItemCode => "品目コード",
            ProductionField::ItemText => "品目テキスト",
            ProductionField::OrderNumber => "指図番号",
            ProductionField::OrderType => "指図タイプ",
            ProductionField::MrpController => "MRP管理者",
            ProductionField::OrderQuantity => "指図数量",
            ProductionField::ActualQuantity => "実績数量",
            ProductionField::CumulativeQuantity => "累計数量",
            ProductionField::RemainingQuantity => "残数量",
            ProductionField::InputDatetime => "入力日時",
            ProductionField::PlannedCompletionDate => "計画完了日",
            ProductionField::WbsElement => "WBS要素",
            ProductionField::SalesOrderNumber => "受注伝票番号",
            ProductionField::SalesOrderItemNumber => "受注明細番号",
        }
    }

    /// 字段名（违规记录中使用）
    pub fn name(&self) -> &'static str {
        match self {
            ProductionField::Plant => "plant",
            ProductionField::StorageLocation => "storage_location",
            ProductionField::ItemCode => "item_code",
            ProductionField::ItemText => "item_text",
            ProductionField::OrderNumber => "order_number",
            ProductionField::OrderType => "order_type",
            ProductionField::MrpController => "mrp_controller",
            ProductionField::OrderQuantity => "order_quantity",
            ProductionField::ActualQuantity => "actual_quantity",
            ProductionField::CumulativeQuantity => "cumulative_quantity",
            ProductionField::RemainingQuantity => "remaining_quantity",
            ProductionField::InputDatetime => "input_datetime",
            ProductionField::PlannedCompletionDate => "planned_completion_date",
            ProductionField::WbsElement => "wbs_element",
            ProductionField::SalesOrderNumber => "sales_order_number",
            ProductionField::SalesOrderItemNumber => "sales_order_item_number",
        }
    }

    /// 从原始行取值（表头优先,其次英文别名）,TRIM 后空串视为缺失
    pub fn raw_value<'a>(&self, row: &'a RawRow) -> Option<&'a str> {
        [self.label(), self.name()]
            .iter()
            .filter_map(|key| row.fields.get(*key))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }
}

// ==========================================
// RecordValidator
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }

    /// 校验单行
    ///
    /// # 返回
    /// - Ok(ProductionRecord): 所有必填字段齐全且类型正确
    /// - Err(RejectRecord): 携带该行的全部违规
    pub fn validate(&self, row: &RawRow) -> Result<ProductionRecord, RejectRecord> {
        if let Some(message) = &row.parse_error {
            return Err(RejectRecord {
                line_number: row.line_number,
                raw: row.fields.clone(),
                violations: vec![Violation {
                    reason: RejectReason::RowParseError,
                    field: None,
                    message: message.clone(),
                }],
            });
        }

        let mut ctx = FieldReader::new(row);

        let plant = ctx.required_text(ProductionField::Plant);
        let storage_location = ctx.optional_text(ProductionField::StorageLocation);
        let item_code = ctx.required_text(ProductionField::ItemCode);
        let item_text = ctx.required_text(ProductionField::ItemText);
        let order_number = ctx.required_text(ProductionField::OrderNumber);
        let order_type = ctx.required_text(ProductionField::OrderType);
        let mrp_controller = ctx.required_text(ProductionField::MrpController);
        let order_quantity = ctx.required_quantity(ProductionField::OrderQuantity);
        let actual_quantity = ctx.required_quantity(ProductionField::ActualQuantity);
        let cumulative_quantity = ctx.required_quantity(ProductionField::CumulativeQuantity);
        let remaining_quantity = ctx.required_quantity(ProductionField::RemainingQuantity);
        let input_datetime = ctx.required_datetime(ProductionField::InputDatetime);
        let planned_completion_date = ctx.optional_date(ProductionField::PlannedCompletionDate);
        let wbs_element = ctx.optional_text(ProductionField::WbsElement);
        let sales_order_number = ctx
            .optional_text(ProductionField::SalesOrderNumber)
            .map(|v| strip_leading_zeros(&v));
        let sales_order_item_number = ctx
            .optional_text(ProductionField::SalesOrderItemNumber)
            .map(|v| strip_leading_zeros(&v));

        if !ctx.violations.is_empty() {
            return Err(RejectRecord {
                line_number: row.line_number,
                raw: row.fields.clone(),
                violations: ctx.violations,
            });
        }

        // 无违规时所有必填值均已取得
        match (
            plant,
            item_code,
            item_text,
            order_number,
            order_type,
            mrp_controller,
            order_quantity,
            actual_quantity,
            cumulative_quantity,
            remaining_quantity,
            input_datetime,
        ) {
            (
                Some(plant),
                Some(item_code),
                Some(item_text),
                Some(order_number),
                Some(order_type),
                Some(mrp_controller),
                Some(order_quantity),
                Some(actual_quantity),
                Some(cumulative_quantity),
                Some(remaining_quantity),
                Some(input_datetime),
            ) => Ok(ProductionRecord {
                plant,
                storage_location,
                item_code,
                item_text,
                order_number,
                order_type,
                mrp_controller,
                order_quantity,
                actual_quantity,
                cumulative_quantity,
                remaining_quantity,
                input_datetime,
                planned_completion_date,
                wbs_element,
                sales_order_number,
                sales_order_item_number,
                amount: None,
            }),
            _ => Err(RejectRecord {
                line_number: row.line_number,
                raw: row.fields.clone(),
                violations: vec![Violation {
                    reason: RejectReason::MissingField,
                    field: None,
                    message: "必填字段缺失".to_string(),
                }],
            }),
        }
    }
}

// ==========================================
// FieldReader - 单行取值 + 违规收集
// ==========================================
struct FieldReader<'a> {
    row: &'a RawRow,
    violations: Vec<Violation>,
}

impl<'a> FieldReader<'a> {
    fn new(row: &'a RawRow) -> Self {
        Self {
            row,
            violations: Vec::new(),
        }
    }

    fn violate(&mut self, field: ProductionField, reason: RejectReason, message: String) {
        self.violations.push(Violation {
            reason,
            field: Some(field.name().to_string()),
            message,
        });
    }

    fn required_raw(&mut self, field: ProductionField) -> Option<&'a str> {
        let value = field.raw_value(self.row);
        if value.is_none() {
            self.violate(
                field,
                RejectReason::MissingField,
                format!("必填字段缺失: {}", field.label()),
            );
        }
        value
    }

    fn required_text(&mut self, field: ProductionField) -> Option<String> {
        self.required_raw(field).map(str::to_string)
    }

    fn optional_text(&mut self, field: ProductionField) -> Option<String> {
        field.raw_value(self.row).map(str::to_string)
    }

    fn required_quantity(&mut self, field: ProductionField) -> Option<i64> {
        let raw = self.required_raw(field)?;
        match parse_quantity(raw) {
            Some(value) if value < 0 => {
                self.violate(
                    field,
                    RejectReason::NegativeQuantity,
                    format!("数量为负: {}", raw),
                );
                None
            }
            Some(value) => Some(value),
            None => {
                self.violate(
                    field,
                    RejectReason::InvalidInteger,
                    format!("无法解析为整数: {}", raw),
                );
                None
            }
        }
    }

    fn required_datetime(&mut self, field: ProductionField) -> Option<NaiveDateTime> {
        let raw = self.required_raw(field)?;
        let parsed = parse_datetime(raw);
        if parsed.is_none() {
            self.violate(
                field,
                RejectReason::InvalidDateTime,
                format!("时间格式错误: {}", raw),
            );
        }
        parsed
    }

    fn optional_date(&mut self, field: ProductionField) -> Option<NaiveDate> {
        let raw = field.raw_value(self.row)?;
        let parsed = parse_date(raw);
        if parsed.is_none() {
            self.violate(
                field,
                RejectReason::InvalidDate,
                format!("日期格式错误: {}", raw),
            );
        }
        parsed
    }
}

// ==========================================
// 值解析工具
// ==========================================

/// 解析数量
///
/// 接受千分位、整数值小数（"10.0"）、前导负号或 SAP 尾随负号（"5-"）
/// 前后同时带负号、指数写法、正号均视为无法解析
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let (body, trailing_minus) = match cleaned.strip_suffix('-') {
        Some(body) => (body.trim_end(), true),
        None => (cleaned.as_str(), false),
    };
    let (digits, leading_minus) = match body.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (body, false),
    };
    if leading_minus && trailing_minus {
        return None;
    }

    // 小数部只允许全 0
    let integer = match digits.split_once('.') {
        Some((int, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => int,
        Some(_) => return None,
        None => digits,
    };
    if integer.is_empty() || !integer.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let value = integer.parse::<i64>().ok()?;
    if leading_minus || trailing_minus {
        value.checked_neg()
    } else {
        Some(value)
    }
}

/// 解析入力日時
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// 解析計画完了日（浮点导出的 ".0" 尾巴可容忍）
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(".0").unwrap_or(raw);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// 纯数字单号去掉前导零（"000" → "0"）
fn strip_leading_zeros(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        let trimmed = value.trim_start_matches('0');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        value.to_string()
    }
}
