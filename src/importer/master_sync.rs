// ==========================================
// 生产实绩分析系统 - 品目主数据同步
// ==========================================
// 职责: 读取品目主数据导出（MARA_DL）→ 工厂过滤 → 去重 → 全量替换 item_master
// 列: 品目 / 標準原価 / プラント（可选）
// 去重: 同一品目保留最后一次出现
// ==========================================

use crate::config::file_type::FileTypeConfig;
use crate::domain::master::MasterEntry;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{FileParser, RawRow, UniversalFileParser};
use crate::repository::master_repo::SqliteItemMaster;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, instrument, warn};

const ITEM_COLUMNS: &[&str] = &["品目", "品目コード", "item_code"];
const COST_COLUMNS: &[&str] = &["標準原価", "standard_cost"];
const PLANT_COLUMNS: &[&str] = &["プラント", "plant"];

/// 同步汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MasterSyncSummary {
    pub read: usize,       // 读取到的数据行
    pub kept: usize,       // 过滤/去重后写入的品目数
    pub duplicates: usize, // 被后出现的同品目覆盖的行
}

pub struct MasterSync<'a> {
    master: &'a SqliteItemMaster,
    file_type: FileTypeConfig,
    plant_filter: Option<String>,
}

impl<'a> MasterSync<'a> {
    /// # 参数
    /// - `master`: 主数据仓储
    /// - `file_type`: 主数据导出的文件类型（编码/版式）
    /// - `plant_filter`: 只保留该工厂的品目（文件无工厂列时不生效）
    pub fn new(
        master: &'a SqliteItemMaster,
        file_type: FileTypeConfig,
        plant_filter: Option<String>,
    ) -> Self {
        Self {
            master,
            file_type,
            plant_filter,
        }
    }

    /// 从导出文件全量同步
    #[instrument(skip(self), fields(file_type = %self.file_type.name))]
    pub fn sync_from_file(&self, path: &Path) -> ImportResult<MasterSyncSummary> {
        let rows = UniversalFileParser.parse(path, &self.file_type)?;
        let (entries, summary) = self.collect_entries(rows)?;

        if entries.is_empty() {
            warn!(path = %path.display(), "主数据文件无有效品目,item_master 将被清空");
        }

        self.master
            .replace_all(&entries)
            .map_err(|e| ImportError::DatabaseError(e.to_string()))?;

        info!(
            read = summary.read,
            kept = summary.kept,
            duplicates = summary.duplicates,
            "品目主数据同步完成"
        );
        Ok(summary)
    }

    fn collect_entries(
        &self,
        rows: impl Iterator<Item = RawRow>,
    ) -> ImportResult<(Vec<MasterEntry>, MasterSyncSummary)> {
        let mut summary = MasterSyncSummary::default();
        // 品目 → 在 entries 中的位置; 覆盖时保留首次位置
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<MasterEntry> = Vec::new();
        let mut header_checked = false;

        for row in rows {
            if let Some(error) = &row.parse_error {
                warn!(line = row.line_number, error = %error, "主数据行切分失败,跳过");
                continue;
            }

            if !header_checked {
                if !ITEM_COLUMNS.iter().any(|c| row.fields.contains_key(*c)) {
                    return Err(ImportError::MissingColumn(ITEM_COLUMNS[0].to_string()));
                }
                header_checked = true;
            }
            summary.read += 1;

            // 有工厂列时,空值视为不匹配
            if let Some(plant) = &self.plant_filter {
                let has_plant_column = PLANT_COLUMNS.iter().any(|c| row.fields.contains_key(*c));
                if has_plant_column && first_value(&row, PLANT_COLUMNS) != Some(plant.as_str()) {
                    continue;
                }
            }

            let Some(item_code) = first_value(&row, ITEM_COLUMNS) else {
                continue;
            };
            let standard_cost = first_value(&row, COST_COLUMNS).and_then(|raw| {
                let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
                let parsed = cleaned.parse::<f64>().ok().filter(|c| c.is_finite());
                if parsed.is_none() {
                    warn!(line = row.line_number, item_code, value = raw, "標準原価无法解析");
                }
                parsed
            });

            let entry = MasterEntry {
                item_code: item_code.to_string(),
                standard_cost,
            };
            match index.get(item_code) {
                Some(&pos) => {
                    entries[pos] = entry;
                    summary.duplicates += 1;
                }
                None => {
                    index.insert(item_code.to_string(), entries.len());
                    entries.push(entry);
                }
            }
        }

        summary.kept = entries.len();
        Ok((entries, summary))
    }
}

fn first_value<'r>(row: &'r RawRow, columns: &[&str]) -> Option<&'r str> {
    columns
        .iter()
        .filter_map(|c| row.fields.get(*c))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}
