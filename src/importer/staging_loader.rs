// ==========================================
// 生产实绩分析系统 - 仕掛/在库 文件装载
// ==========================================
// 职责: 仕掛明细 / ZP58 / ZP02 / 保管场所一览 / ZS65 → 暂存表
// 流程: 解析（文件类型表）→ 列映射与值转换 → 必需列检查 → 写入
// 说明: 单个文件失败只记入汇总,其余文件照常装载
// ==========================================

use crate::config::file_type::FileTypeTable;
use crate::domain::production::DATE_STORAGE_FORMAT;
use crate::domain::staging::{ColumnKind, StagingLoadSummary, StagingTable, StagingValue};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{FileParser, RawRow, UniversalFileParser};
use crate::importer::validator::{parse_date, parse_quantity};
use crate::repository::staging_repo::SqliteStagingStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

/// 一次批量装载的输入文件
#[derive(Debug, Clone)]
pub struct StagingPaths {
    pub wip_details: PathBuf,
    pub zp58: PathBuf,
    pub zp02: PathBuf,
    pub storage_locations: PathBuf,
    pub zs65: PathBuf,
}

impl StagingPaths {
    fn path_for(&self, table: StagingTable) -> &Path {
        match table {
            StagingTable::WipDetails => &self.wip_details,
            StagingTable::Zp58 => &self.zp58,
            StagingTable::Zp02 => &self.zp02,
            StagingTable::StorageLocations => &self.storage_locations,
            StagingTable::Zs65 => &self.zs65,
        }
    }
}

/// 装载失败的文件
#[derive(Debug, Clone, Serialize)]
pub struct StagingFailure {
    pub table: String,
    pub path: String,
    pub error: String,
}

/// 批量装载汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct StagingRunSummary {
    pub loaded: Vec<StagingLoadSummary>,
    pub failures: Vec<StagingFailure>,
}

impl StagingRunSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct StagingLoader<'a> {
    store: &'a SqliteStagingStore,
    file_types: FileTypeTable,
}

impl<'a> StagingLoader<'a> {
    pub fn new(store: &'a SqliteStagingStore, file_types: FileTypeTable) -> Self {
        Self { store, file_types }
    }

    /// 清空仕掛表（wip_details / zp02_records / zp58_records）
    pub fn clear_wip_tables(&self) -> ImportResult<usize> {
        self.store
            .clear(&StagingTable::WIP_TABLES)
            .map_err(|e| ImportError::DatabaseError(e.to_string()))
    }

    /// 装载单个文件到对应暂存表
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn load_file(&self, table: StagingTable, path: &Path) -> ImportResult<StagingLoadSummary> {
        let file_type = self
            .file_types
            .get(table.file_type())
            .ok_or_else(|| ImportError::UnknownFileType(table.file_type().to_string()))?;

        let rows = UniversalFileParser.parse(path, file_type)?;
        let (values, mut summary) = convert_rows(table, rows)?;

        let counts = self
            .store
            .write(table, &values, table.replaces_on_load())
            .map_err(|e| ImportError::DatabaseError(e.to_string()))?;
        summary.inserted = counts.inserted;
        summary.duplicates = counts.duplicates;

        info!(
            table = %table,
            read = summary.read,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            "暂存表装载完成"
        );
        Ok(summary)
    }

    /// 批量装载: 先清空仕掛表,再按固定顺序装载全部文件
    ///
    /// # 返回
    /// - Err: 仅清空失败
    /// - Ok: 单个文件的失败记入 failures
    pub fn run_all(&self, paths: &StagingPaths) -> ImportResult<StagingRunSummary> {
        self.clear_wip_tables()?;

        let mut run = StagingRunSummary::default();
        for table in StagingTable::ALL {
            let path = paths.path_for(table);
            match self.load_file(table, path) {
                Ok(summary) => run.loaded.push(summary),
                Err(e) => {
                    error!(table = %table, path = %path.display(), error = %e, "暂存表装载失败");
                    run.failures.push(StagingFailure {
                        table: table.table_name().to_string(),
                        path: path.display().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            loaded = run.loaded.len(),
            failed = run.failures.len(),
            "仕掛/在库文件装载结束"
        );
        Ok(run)
    }
}

/// 原始行 → 表列值
fn convert_rows(
    table: StagingTable,
    rows: impl Iterator<Item = RawRow>,
) -> ImportResult<(Vec<Vec<StagingValue>>, StagingLoadSummary)> {
    let specs = table.columns();
    let keys = table.key_columns();
    let required = table.required_columns();

    let mut summary = StagingLoadSummary {
        table: table.table_name().to_string(),
        ..StagingLoadSummary::default()
    };
    let mut values = Vec::new();
    let mut header_checked = false;

    for row in rows {
        summary.read += 1;
        if let Some(error) = &row.parse_error {
            warn!(table = %table, line = row.line_number, error = %error, "行切分失败,跳过");
            summary.skipped += 1;
            continue;
        }

        // 必需列整列缺失视为文件格式错误
        if !header_checked {
            for spec in specs.iter().filter(|s| required.contains(&s.column)) {
                if !row.fields.contains_key(spec.source) {
                    return Err(ImportError::MissingColumn(spec.source.to_string()));
                }
            }
            header_checked = true;
        }

        let mut converted = Vec::with_capacity(specs.len());
        let mut missing_required = false;
        for spec in specs {
            let raw = row
                .fields
                .get(spec.source)
                .map(|v| v.trim())
                .unwrap_or("");
            if raw.is_empty() && required.contains(&spec.column) {
                missing_required = true;
                break;
            }
            // 键列空值存为 ''（NULL 不参与唯一约束）
            let value = if raw.is_empty() && keys.contains(&spec.column) {
                StagingValue::Text(String::new())
            } else {
                convert_value(spec.kind, raw)
            };
            converted.push(value);
        }

        if missing_required {
            summary.skipped += 1;
            continue;
        }
        values.push(converted);
    }

    Ok((values, summary))
}

/// 单元格值转换
pub fn convert_value(kind: ColumnKind, raw: &str) -> StagingValue {
    let raw = raw.trim();
    match kind {
        ColumnKind::Text if raw.is_empty() => StagingValue::Null,
        ColumnKind::Text => StagingValue::Text(raw.to_string()),
        ColumnKind::Integer => parse_quantity(raw)
            .map(StagingValue::Integer)
            .unwrap_or(StagingValue::Null),
        ColumnKind::Real => parse_real(raw)
            .map(StagingValue::Real)
            .unwrap_or(StagingValue::Null),
        ColumnKind::Amount => StagingValue::Real(parse_real(raw).unwrap_or(0.0)),
        ColumnKind::Date => parse_date(raw)
            .map(|d| StagingValue::Text(d.format(DATE_STORAGE_FORMAT).to_string()))
            .unwrap_or(StagingValue::Null),
    }
}

/// 千分位与 SAP 尾随负号; 非有限值视为无法解析
fn parse_real(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    let parsed = match cleaned.strip_suffix('-') {
        Some(body) if !body.starts_with('-') => body.trim_end().parse::<f64>().ok().map(|v| -v),
        Some(_) => None,
        None => cleaned.parse::<f64>().ok(),
    };
    parsed.filter(|v| v.is_finite())
}
