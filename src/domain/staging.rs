// ==========================================
// 生产实绩分析系统 - 仕掛/在库 暂存表模型
// ==========================================
// 职责: 声明各暂存表的来源文件类型、列映射、键列与装载方式
// 表: wip_details / zp58_records / zp02_records / storage_locations / zs65_records
// 说明: 表名与列名均为编译期常量,仓储层可安全拼接 SQL
// ==========================================

use crate::config::file_type::{STORAGE_LOCATIONS, WIP_DETAILS, ZP02, ZP58, ZS65};
use serde::{Deserialize, Serialize};
use std::fmt;

use self::ColumnKind::{Amount, Date, Integer, Real, Text};

// ==========================================
// ColumnKind - 列值类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer, // 按数量规则解析,失败为 NULL
    Real,    // 失败为 NULL
    Amount,  // 失败为 0
    Date,    // 规范为 YYYY-MM-DD,失败为 NULL
}

/// 来源列 → 表列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub source: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

const fn col(source: &'static str, column: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec {
        source,
        column,
        kind,
    }
}

// 仕掛明细无表头,来源列名即位置列名
const WIP_DETAIL_SPECS: &[ColumnSpec] = &[
    col("wip_type", "wip_type", Text),
    col("wip_key", "wip_key", Text),
    col("plant", "plant", Text),
    col("mrp_controller", "mrp_controller", Text),
    col("factory_name", "factory_name", Text),
    col("line_name", "line_name", Text),
    col("order_number", "order_number", Text),
    col("item_text", "item_text", Text),
    col("amount_jpy", "amount_jpy", Amount),
    col("item_code", "item_code", Text),
    col("initial_quantity", "initial_quantity", Integer),
    col("wip_quantity", "wip_quantity", Integer),
    col("completed_quantity", "completed_quantity", Integer),
    col("initial_date", "initial_date", Text),
    col("wip_age", "wip_age", Text),
    col("cmpl_flag", "cmpl_flag", Text),
    col("material_cost", "material_cost", Amount),
    col("expense_cost", "expense_cost", Amount),
];

const ZP58_SPECS: &[ColumnSpec] = &[col("指図／ネットワーク", "order_number", Text)];

const ZP02_SPECS: &[ColumnSpec] = &[
    col("指図番号", "order_number", Text),
    col("指図ステータス", "order_status", Text),
    col("MRP管理者", "mrp_controller", Text),
    col("MRP管理者名", "mrp_controller_name", Text),
    col("品目コード", "item_code", Text),
    col("品目テキスト", "item_text", Text),
    col("台数", "quantity", Integer),
    col("ＷＢＳ要素", "wbs_element", Text),
    col("DLV日付", "completion_date", Date),
    col("TECO日付", "teco_date", Date),
];

const STORAGE_LOCATION_SPECS: &[ColumnSpec] = &[
    col("ﾌﾟﾗﾝﾄ", "plant", Text),
    col("責任部署", "responsible_dept", Text),
    col("棚卸報告区分", "inventory_report_category", Text),
    col("保管場所", "storage_location", Text),
    col("保管場所名", "storage_location_name", Text),
    col("工場在庫区分", "factory_stock_category", Text),
    col("営業在庫区分", "sales_stock_category", Text),
    col("工場区分", "factory_category", Text),
    col("工場区分2", "factory_category_2", Text),
    col("使用不可区分", "unusable_category", Text),
    col("棚番チェック用", "shelf_check_flag", Text),
    col("所要check", "requirements_check", Text),
];

const ZS65_SPECS: &[ColumnSpec] = &[
    col("品目コード", "item_code", Text),
    col("プラント", "plant", Text),
    col("品目テキスト", "item_text", Text),
    col("保管場所", "storage_location", Text),
    col("特殊在庫区分", "stock_type", Text),
    col("特殊在庫の評価", "stock_valuation", Text),
    col("特殊在庫番号", "stock_number", Text),
    col("保管場所レベルでの品目削除フラグ", "delete_flag", Text),
    col("ロット番号", "lot_number", Text),
    col("基本数量単位", "base_unit", Text),
    col("利用可能評価在庫", "available_stock", Real),
    col("通貨コード", "currency", Text),
    col("利用可能値", "available_value", Real),
    col("転送中在庫（保管場所間）", "in_transfer_stock", Real),
    col("積送/輸送中の値", "in_transfer_value", Real),
    col("品質検査中在庫", "in_inspection_stock", Real),
    col("品質検査値", "in_inspection_value", Real),
    col("非利用可能ロットの全在庫合計", "unusable_stock", Real),
    col("制限値", "restricted_value", Real),
    col("保留在庫", "blocked_stock", Real),
    col("保留在庫値", "blocked_stock_value", Real),
    col("返品保留在庫", "returns_stock", Real),
    col("保留返品金額", "returns_stock_value", Real),
    col("販売伝票", "sales_order_number", Text),
    col("販売伝票明細", "sales_order_item", Text),
    col("棚番", "shelf_number", Text),
    col("勘定科目コード", "account_code", Text),
    col("勘定科目名", "account_name", Text),
    col("品目タイプ", "item_type", Text),
    col("滞留日数", "stagnant_days", Integer),
    col("評価クラス", "valuation_class", Text),
    col("評価クラステキスト", "valuation_class_text", Text),
    col("調達タイプ", "procurement_type", Text),
    col("調達タイプテキスト", "procurement_type_text", Text),
    col("評価減区分", "valuation_reduction_category", Text),
];

// ==========================================
// StagingTable - 暂存表
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingTable {
    WipDetails,
    Zp58,
    Zp02,
    StorageLocations,
    Zs65,
}

impl StagingTable {
    /// 全部暂存表（装载顺序）
    pub const ALL: [StagingTable; 5] = [
        StagingTable::WipDetails,
        StagingTable::Zp58,
        StagingTable::Zp02,
        StagingTable::StorageLocations,
        StagingTable::Zs65,
    ];

    /// 批量装载前一并清空的仕掛表
    pub const WIP_TABLES: [StagingTable; 3] = [
        StagingTable::WipDetails,
        StagingTable::Zp02,
        StagingTable::Zp58,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            StagingTable::WipDetails => "wip_details",
            StagingTable::Zp58 => "zp58_records",
            StagingTable::Zp02 => "zp02_records",
            StagingTable::StorageLocations => "storage_locations",
            StagingTable::Zs65 => "zs65_records",
        }
    }

    /// 默认文件类型名
    pub fn file_type(&self) -> &'static str {
        match self {
            StagingTable::WipDetails => WIP_DETAILS,
            StagingTable::Zp58 => ZP58,
            StagingTable::Zp02 => ZP02,
            StagingTable::StorageLocations => STORAGE_LOCATIONS,
            StagingTable::Zs65 => ZS65,
        }
    }

    pub fn columns(&self) -> &'static [ColumnSpec] {
        match self {
            StagingTable::WipDetails => WIP_DETAIL_SPECS,
            StagingTable::Zp58 => ZP58_SPECS,
            StagingTable::Zp02 => ZP02_SPECS,
            StagingTable::StorageLocations => STORAGE_LOCATION_SPECS,
            StagingTable::Zs65 => ZS65_SPECS,
        }
    }

    /// 唯一键列（同键先出现者保留）
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            StagingTable::WipDetails => &["wip_key", "order_number", "item_code"],
            StagingTable::Zp58 | StagingTable::Zp02 => &["order_number"],
            StagingTable::StorageLocations => &["storage_location"],
            StagingTable::Zs65 => &["item_code", "storage_location", "lot_number"],
        }
    }

    /// 必须非空的列（空值行跳过）
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            StagingTable::WipDetails => &[],
            StagingTable::Zp58 | StagingTable::Zp02 => &["order_number"],
            StagingTable::StorageLocations => &["storage_location"],
            StagingTable::Zs65 => &["item_code"],
        }
    }

    /// 装载时先清空本表（主数据/在库快照为全量）
    pub fn replaces_on_load(&self) -> bool {
        matches!(self, StagingTable::StorageLocations | StagingTable::Zs65)
    }
}

impl fmt::Display for StagingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

// ==========================================
// StagingValue - 单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum StagingValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
}

/// 单表装载汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagingLoadSummary {
    pub table: String,
    pub read: usize,       // 数据行
    pub inserted: usize,   // 写入行
    pub duplicates: usize, // 键重复被忽略
    pub skipped: usize,    // 切分失败或必需列为空
}
