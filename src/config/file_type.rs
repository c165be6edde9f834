// ==========================================
// 生产实绩分析系统 - 文件类型配置表
// ==========================================
// 职责: 按文件类型声明编码、版式（分隔/定长/工作簿）、前导跳过行数
// 说明: 解析器只查表,不再按文件名写条件分支
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// 生产实绩导出文件类型名
pub const KANSEI_JISSEKI: &str = "KANSEI_JISSEKI";

/// 品目主数据导出文件类型名
pub const MARA_DL: &str = "MARA_DL";

/// UTF-8 逗号分隔的生产实绩（人工整理/测试用）
pub const KANSEI_JISSEKI_CSV: &str = "KANSEI_JISSEKI_CSV";

/// 仕掛明细（无表头,按位置取列）
pub const WIP_DETAILS: &str = "WIP_DETAILS";

/// ZP58 材料未处理指图
pub const ZP58: &str = "ZP58";

/// ZP02 完成实绩
pub const ZP02: &str = "ZP02";

/// 保管场所一览
pub const STORAGE_LOCATIONS: &str = "STORAGE_LOCATIONS";

/// ZS65 PC 在库
pub const ZS65: &str = "ZS65";

/// 仕掛明细列（按位置）; 测试导出缺少末列 expense_cost
pub const WIP_DETAIL_COLUMNS: &[&str] = &[
    "wip_type",
    "wip_key",
    "plant",
    "mrp_controller",
    "factory_name",
    "line_name",
    "order_number",
    "item_text",
    "amount_jpy",
    "item_code",
    "initial_quantity",
    "wip_quantity",
    "completed_quantity",
    "initial_date",
    "wip_age",
    "cmpl_flag",
    "material_cost",
    "expense_cost",
];

// ==========================================
// FixedWidthColumn - 定长列定义
// ==========================================
// 说明: start/width 以字符计（解码后）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWidthColumn {
    pub name: String,
    pub start: usize,
    pub width: usize,
}

impl FixedWidthColumn {
    pub fn new(name: &str, start: usize, width: usize) -> Self {
        Self {
            name: name.to_string(),
            start,
            width,
        }
    }

    /// 列结束位置（不含）
    pub fn end(&self) -> usize {
        self.start + self.width
    }
}

// ==========================================
// FileLayout - 行版式
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileLayout {
    /// 分隔符文本（首个非跳过行为表头）
    Delimited { delimiter: u8, quoting: bool },

    /// 定长文本（无表头,列名取自列定义）
    FixedWidth { columns: Vec<FixedWidthColumn> },

    /// 无表头分隔符文本（列名按位置给出,末尾 columns.len() - min_columns 列可缺省）
    Headerless {
        delimiter: u8,
        columns: Vec<String>,
        min_columns: usize,
    },

    /// Excel 工作簿（第一个工作表,首行为表头）
    Workbook,
}

// ==========================================
// FileTypeConfig - 单个文件类型配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypeConfig {
    pub name: String,
    pub encoding: String, // WHATWG 编码标签,如 "shift_jis" / "utf-16" / "utf-8"
    pub layout: FileLayout,
    #[serde(default)]
    pub skip_lines: usize, // 表头之前跳过的行数
}

impl FileTypeConfig {
    pub fn delimited(name: &str, encoding: &str, delimiter: u8, quoting: bool) -> Self {
        Self {
            name: name.to_string(),
            encoding: encoding.to_string(),
            layout: FileLayout::Delimited { delimiter, quoting },
            skip_lines: 0,
        }
    }

    pub fn fixed_width(name: &str, encoding: &str, columns: Vec<FixedWidthColumn>) -> Self {
        Self {
            name: name.to_string(),
            encoding: encoding.to_string(),
            layout: FileLayout::FixedWidth { columns },
            skip_lines: 0,
        }
    }

    pub fn headerless(
        name: &str,
        encoding: &str,
        delimiter: u8,
        columns: &[&str],
        min_columns: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            encoding: encoding.to_string(),
            layout: FileLayout::Headerless {
                delimiter,
                columns: columns.iter().map(|c| c.to_string()).collect(),
                min_columns: min_columns.min(columns.len()),
            },
            skip_lines: 0,
        }
    }

    pub fn workbook(name: &str) -> Self {
        Self {
            name: name.to_string(),
            encoding: "utf-8".to_string(),
            layout: FileLayout::Workbook,
            skip_lines: 0,
        }
    }

    pub fn with_skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }
}

// ==========================================
// FileTypeTable - 文件类型配置表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct FileTypeTable {
    types: HashMap<String, FileTypeConfig>,
}

impl FileTypeTable {
    /// 空表
    pub fn empty() -> Self {
        Self::default()
    }

    /// 生产环境默认表
    ///
    /// - KANSEI_JISSEKI: Shift_JIS, TAB 分隔, 不处理引号
    /// - MARA_DL: UTF-16, TAB 分隔
    /// - KANSEI_JISSEKI_CSV: UTF-8, 逗号分隔, 处理引号
    /// - WIP_DETAILS: UTF-8, TAB 分隔, 跳过前 4 行, 17/18 列按位置
    /// - ZP58 / ZP02 / STORAGE_LOCATIONS / ZS65: UTF-8, TAB 分隔
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        table.register(FileTypeConfig::delimited(KANSEI_JISSEKI, "shift_jis", b'\t', false));
        table.register(FileTypeConfig::delimited(MARA_DL, "utf-16", b'\t', false));
        table.register(FileTypeConfig::delimited(KANSEI_JISSEKI_CSV, "utf-8", b',', true));
        table.register(
            FileTypeConfig::headerless(
                WIP_DETAILS,
                "utf-8",
                b'\t',
                WIP_DETAIL_COLUMNS,
                WIP_DETAIL_COLUMNS.len() - 1,
            )
            .with_skip_lines(4),
        );
        for name in [ZP58, ZP02, STORAGE_LOCATIONS, ZS65] {
            table.register(FileTypeConfig::delimited(name, "utf-8", b'\t', false));
        }
        table
    }

    /// 注册/覆盖文件类型（名称不区分大小写）
    pub fn register(&mut self, config: FileTypeConfig) {
        self.types.insert(config.name.to_uppercase(), config);
    }

    /// 按类型名查询
    pub fn get(&self, name: &str) -> Option<&FileTypeConfig> {
        self.types.get(&name.trim().to_uppercase())
    }

    /// 按文件名主干查询（KANSEI_JISSEKI.txt → KANSEI_JISSEKI）
    pub fn resolve_for_path(&self, path: &Path) -> Option<&FileTypeConfig> {
        path.file_stem()
            .and_then(|s| s.to_str())
            .and_then(|stem| self.get(stem))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_production_exports() {
        let table = FileTypeTable::with_defaults();

        let export = table.get(KANSEI_JISSEKI).unwrap();
        assert_eq!(export.encoding, "shift_jis");
        assert_eq!(
            export.layout,
            FileLayout::Delimited {
                delimiter: b'\t',
                quoting: false
            }
        );

        let master = table.get("mara_dl").unwrap();
        assert_eq!(master.encoding, "utf-16");
    }

    #[test]
    fn test_resolve_by_file_stem() {
        let table = FileTypeTable::with_defaults();
        let config = table
            .resolve_for_path(Path::new("/mnt/host/MES/KANSEI_JISSEKI.txt"))
            .unwrap();
        assert_eq!(config.name, KANSEI_JISSEKI);
        assert!(table.resolve_for_path(Path::new("unknown.txt")).is_none());
    }

    #[test]
    fn test_register_overrides_existing() {
        let mut table = FileTypeTable::with_defaults();
        table.register(FileTypeConfig::delimited(KANSEI_JISSEKI, "utf-8", b',', true));
        assert_eq!(table.get(KANSEI_JISSEKI).unwrap().encoding, "utf-8");
    }

    #[test]
    fn test_layout_deserializes_from_json() {
        let json = r#"{
            "name": "WIP_FIXED",
            "encoding": "shift_jis",
            "skip_lines": 2,
            "layout": {"kind": "fixed_width", "columns": [{"name": "a", "start": 0, "width": 4}]}
        }"#;
        let config: FileTypeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.skip_lines, 2);
        match config.layout {
            FileLayout::FixedWidth { columns } => assert_eq!(columns[0].end(), 4),
            other => panic!("unexpected layout: {:?}", other),
        }
    }

    #[test]
    fn test_wip_details_is_headerless() {
        let table = FileTypeTable::with_defaults();
        let wip = table.get(WIP_DETAILS).unwrap();
        assert_eq!(wip.skip_lines, 4);
        match &wip.layout {
            FileLayout::Headerless {
                columns,
                min_columns,
                ..
            } => {
                assert_eq!(columns.len(), 18);
                assert_eq!(*min_columns, 17);
                assert_eq!(columns[17], "expense_cost");
            }
            other => panic!("unexpected layout: {:?}", other),
        }
        assert!(table.get("zs65").is_some());
    }
}
