// ==========================================
// 生产实绩分析系统 - 导入编排器
// ==========================================
// 流程: 解析文件类型 → 打开文件（有界重试）→ 流式 解析→过滤→校验
//       → 金额派生 → Store.load 一次性写入 → RunSummary
// 红线: 行级问题不中止运行; 文件级错误只中止本次运行
// 红线: 拒收记录只返回给调用方,不写入分析库
// ==========================================

use crate::config::file_type::{FileTypeConfig, FileTypeTable};
use crate::domain::master::MasterDataLookup;
use crate::domain::production::{ProductionRecord, RejectRecord, RunSummary};
use crate::importer::error::ImportError;
use crate::importer::file_parser::{FileParser, RawRow, RawRowIter, UniversalFileParser};
use crate::importer::validator::{ProductionField, RecordValidator};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::repository::production_repo::ProductionStore;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// IngestionOrchestrator
// ==========================================
pub struct IngestionOrchestrator {
    store: Arc<dyn ProductionStore>,
    master: Arc<dyn MasterDataLookup>,
    file_types: FileTypeTable,
    parser: Box<dyn FileParser>,
    validator: RecordValidator,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    file_type_name: Option<String>,       // 显式文件类型; 为空时按文件名推断
    mrp_controller_prefix: Option<String>, // MRP 管理者前缀过滤
}

impl IngestionOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - `store`: 生产实绩存储
    /// - `master`: 只读主数据（金额派生用）
    /// - `file_types`: 文件类型声明表
    pub fn new(
        store: Arc<dyn ProductionStore>,
        master: Arc<dyn MasterDataLookup>,
        file_types: FileTypeTable,
    ) -> Self {
        Self {
            store,
            master,
            file_types,
            parser: Box::new(UniversalFileParser),
            validator: RecordValidator::new(),
            retry: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            file_type_name: None,
            mrp_controller_prefix: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_parser(mut self, parser: Box<dyn FileParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_file_type(mut self, name: &str) -> Self {
        self.file_type_name = Some(name.to_string());
        self
    }

    pub fn with_mrp_controller_prefix(mut self, prefix: Option<String>) -> Self {
        self.mrp_controller_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    /// 单次运行: 解析 → 校验 → 写入
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn run_once(&self, path: &Path) -> PipelineResult<RunSummary> {
        self.ingest(path, false)
    }

    /// 全量重建: 清空存储后执行单次运行
    ///
    /// 文件确认可读之后才清空,文件缺失时存储保持原样
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn full_rebuild(&self, path: &Path) -> PipelineResult<RunSummary> {
        self.ingest(path, true)
    }

    fn resolve_file_type(&self, path: &Path) -> PipelineResult<&FileTypeConfig> {
        let resolved = match &self.file_type_name {
            Some(name) => self.file_types.get(name),
            None => self.file_types.resolve_for_path(path),
        };
        resolved.ok_or_else(|| {
            let key = self
                .file_type_name
                .clone()
                .unwrap_or_else(|| path.display().to_string());
            PipelineError::Import(ImportError::UnknownFileType(key))
        })
    }

    /// 打开文件; 仅文件访问错误参与重试
    fn open_with_retry(&self, path: &Path, file_type: &FileTypeConfig) -> PipelineResult<RawRowIter> {
        let outcome = self.retry.run(self.sleeper.as_ref(), |attempt| {
            debug!(attempt, "打开导出文件");
            match self.parser.parse(path, file_type) {
                Err(e @ ImportError::FileAccess { .. }) => Err(e),
                other => Ok(other),
            }
        });

        match outcome {
            Ok(parsed) => Ok(parsed?),
            Err((source, attempts)) => {
                warn!(attempts, error = %source, "文件访问重试耗尽,本次运行失败");
                Err(PipelineError::FileAccessExhausted { attempts, source })
            }
        }
    }

    fn ingest(&self, path: &Path, reset_first: bool) -> PipelineResult<RunSummary> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let file_type = self.resolve_file_type(path)?;
        info!(run_id = %run_id, file_type = %file_type.name, reset_first, "导入运行开始");

        let rows = self.open_with_retry(path, file_type)?;

        if reset_first {
            let deleted = self.store.reset()?;
            info!(deleted, "全量重建: 存储已清空");
        }

        let mut parsed_count = 0;
        let mut filtered_count = 0;
        let mut valid: Vec<ProductionRecord> = Vec::new();
        let mut rejects: Vec<RejectRecord> = Vec::new();

        for row in rows {
            parsed_count += 1;

            if row.parse_error.is_none() && !self.passes_prefix_filter(&row) {
                filtered_count += 1;
                continue;
            }

            match self.validator.validate(&row) {
                Ok(record) => valid.push(record),
                Err(reject) => {
                    warn!(line = reject.line_number, reasons = %reject.describe(), "记录拒收");
                    rejects.push(reject);
                }
            }
        }

        self.enrich_amounts(&mut valid);

        let load = self.store.load(&valid)?;

        let summary = RunSummary {
            run_id,
            file_path: path.display().to_string(),
            parsed_count,
            filtered_count,
            valid_count: valid.len(),
            rejected_count: rejects.len(),
            inserted_count: load.inserted,
            duplicate_count: load.skipped_duplicate,
            rejects,
            elapsed_ms: started.elapsed().as_millis(),
        };

        info!(
            run_id = %summary.run_id,
            parsed = summary.parsed_count,
            filtered = summary.filtered_count,
            valid = summary.valid_count,
            rejected = summary.rejected_count,
            inserted = summary.inserted_count,
            duplicate = summary.duplicate_count,
            elapsed_ms = summary.elapsed_ms as u64,
            clean = summary.is_clean(),
            "导入运行完成"
        );
        Ok(summary)
    }

    /// MRP 管理者缺失的行不在此过滤,交给校验器拒收
    fn passes_prefix_filter(&self, row: &RawRow) -> bool {
        match (&self.mrp_controller_prefix, ProductionField::MrpController.raw_value(row)) {
            (Some(prefix), Some(controller)) => controller.starts_with(prefix.as_str()),
            _ => true,
        }
    }

    /// 金额 = 実績数量 × 標準原価; 主数据缺失时为 0
    fn enrich_amounts(&self, records: &mut [ProductionRecord]) {
        let mut missing: BTreeSet<String> = BTreeSet::new();

        for record in records.iter_mut() {
            let cost = self
                .master
                .lookup(&record.item_code)
                .and_then(|entry| entry.standard_cost);
            match cost {
                Some(cost) => record.amount = Some(record.actual_quantity as f64 * cost),
                None => {
                    record.amount = Some(0.0);
                    missing.insert(record.item_code.clone());
                }
            }
        }

        if !missing.is_empty() {
            let items: Vec<&str> = missing.iter().map(String::as_str).collect();
            warn!(
                count = missing.len(),
                items = %items.join(","),
                "主数据中缺少标准原价,金额按 0 计算"
            );
        }
    }
}
