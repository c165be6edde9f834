// ==========================================
// 生产实绩分析系统 - 命令行入口
// ==========================================
// 子命令: run / rebuild / sync-master / load-staging / analyze / report / health
// 失败的运行以非零退出码结束,不 panic
// ==========================================

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use production_tracking::app::AppState;
use production_tracking::config::AppSettings;
use production_tracking::domain::types::DateBucket;
use production_tracking::engine::{ProgressAnalyzer, ProgressParams};
use production_tracking::logging;
use production_tracking::report::ReportWriter;
use production_tracking::repository::{ProductionStore, RecordFilter};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "production-tracking")]
#[command(about = "生产实绩导入/校验/分析工具", version)]
struct Cli {
    /// JSON 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 数据库路径（覆盖配置）
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON 格式日志
    #[arg(long, global = true, default_value_t = false)]
    json_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 单次运行: 解析 → 校验 → 写入
    Run {
        /// 导出文件（默认取配置中的 export_path）
        file: Option<PathBuf>,
    },
    /// 全量重建: 清空后重新导入
    Rebuild { file: Option<PathBuf> },
    /// 同步品目主数据
    SyncMaster { file: Option<PathBuf> },
    /// 装载仕掛/在库文件（未指定的取配置路径）
    LoadStaging {
        #[arg(long)]
        wip_details: Option<PathBuf>,
        #[arg(long)]
        zp58: Option<PathBuf>,
        #[arg(long)]
        zp02: Option<PathBuf>,
        #[arg(long)]
        storage_locations: Option<PathBuf>,
        #[arg(long)]
        zs65: Option<PathBuf>,
    },
    /// 输出分析结果（JSON）
    Analyze {
        #[command(subcommand)]
        analysis: Analysis,
    },
    /// 写出 TSV 报表
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        /// 输出目录（默认取配置中的 report_dir）
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 最近写入时间与最近一次运行
    Health,
}

#[derive(Subcommand)]
enum Analysis {
    /// 计划/实绩进度
    Progress {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = false)]
        by_item: bool,
        #[arg(long, value_enum)]
        bucket: Option<BucketArg>,
    },
    /// 数据异常检测
    Errors {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// 在库滞留
    Aging {
        #[command(flatten)]
        filter: FilterArgs,
        /// 基准日（默认今天）
        #[arg(long, value_parser = parse_date)]
        reference: Option<NaiveDate>,
    },
    /// 金额汇总
    Amount {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
struct FilterArgs {
    #[arg(long)]
    plant: Option<String>,
    #[arg(long)]
    item: Option<String>,
    #[arg(long)]
    order_type: Option<String>,
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
}

impl FilterArgs {
    fn to_filter(&self) -> RecordFilter {
        RecordFilter {
            plant: self.plant.clone(),
            item_code: self.item.clone(),
            order_type: self.order_type.clone(),
            date_from: self.from,
            date_to: self.to,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum BucketArg {
    Day,
    Week,
    Month,
}

impl From<BucketArg> for DateBucket {
    fn from(arg: BucketArg) -> Self {
        match arg {
            BucketArg::Day => DateBucket::Day,
            BucketArg::Week => DateBucket::Week,
            BucketArg::Month => DateBucket::Month,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("日期格式应为 YYYY-MM-DD: {}", e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.json_log {
        logging::init_json();
    } else {
        logging::init();
    }

    match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "命令执行失败");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let mut settings = AppSettings::load(cli.config.as_deref()).context("加载配置失败")?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let state = AppState::new(settings).context("打开数据库失败")?;

    match cli.command {
        Commands::Run { file } => ingest(&state, file, false),
        Commands::Rebuild { file } => ingest(&state, file, true),
        Commands::SyncMaster { file } => {
            let path = file.unwrap_or_else(|| state.settings.master_path.clone());
            let summary = state.master_sync()?.sync_from_file(&path)?;
            print_json(&summary)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::LoadStaging {
            wip_details,
            zp58,
            zp02,
            storage_locations,
            zs65,
        } => {
            let mut paths = state.staging_paths();
            paths.wip_details = wip_details.unwrap_or(paths.wip_details);
            paths.zp58 = zp58.unwrap_or(paths.zp58);
            paths.zp02 = zp02.unwrap_or(paths.zp02);
            paths.storage_locations = storage_locations.unwrap_or(paths.storage_locations);
            paths.zs65 = zs65.unwrap_or(paths.zs65);

            let summary = state.staging_loader().run_all(&paths)?;
            print_json(&summary)?;
            Ok(if summary.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Analyze { analysis } => {
            analyze(&state, analysis)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Report { filter, out } => {
            let filter = filter.to_filter();
            let records = state.store.query(&filter)?;
            let report = state.amount_analyzer().analyze(&records);
            let dir = out.unwrap_or_else(|| state.settings.report_dir.clone());
            let paths = ReportWriter::new(dir).write_all(&records, &report)?;
            for path in paths {
                println!("{}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health => {
            #[derive(Serialize)]
            struct Health {
                last_update: Option<String>,
                record_count: usize,
                latest_run: Option<production_tracking::repository::ImportBatch>,
            }
            let health = Health {
                last_update: state
                    .store
                    .last_update_timestamp()?
                    .map(|ts| ts.to_string()),
                record_count: state.store.count()?,
                latest_run: state.import_batches.latest()?,
            };
            print_json(&health)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn ingest(state: &AppState, file: Option<PathBuf>, rebuild: bool) -> Result<ExitCode> {
    let path = file.unwrap_or_else(|| state.settings.export_path.clone());
    let orchestrator = state.orchestrator()?;

    let outcome = if rebuild {
        orchestrator.full_rebuild(&path)
    } else {
        orchestrator.run_once(&path)
    };

    match outcome {
        Ok(summary) => {
            state.import_batches.record(&summary)?;
            print_json(&summary)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            // 运行失败也留痕,下次调度照常进行
            let run_id = uuid::Uuid::new_v4().to_string();
            state
                .import_batches
                .record_failure(&run_id, &path.display().to_string(), &e.to_string())?;
            error!(recoverable = e.is_recoverable(), error = %e, "导入运行失败");
            eprintln!("error: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn analyze(state: &AppState, analysis: Analysis) -> Result<()> {
    match analysis {
        Analysis::Progress {
            filter,
            by_item,
            bucket,
        } => {
            let params = ProgressParams {
                by_item_code: by_item,
                date_bucket: bucket.map(DateBucket::from),
            };
            let rows = ProgressAnalyzer::new(params).run(state.store.as_ref(), &filter.to_filter())?;
            print_json(&rows)
        }
        Analysis::Errors { filter } => {
            let master = state.master_snapshot()?;
            let findings = state
                .error_detector(&master)
                .run(state.store.as_ref(), &filter.to_filter())?;
            info!(findings = findings.len(), "异常检测完成");
            print_json(&findings)
        }
        Analysis::Aging { filter, reference } => {
            let reference = reference.unwrap_or_else(|| Local::now().date_naive());
            let buckets = state
                .aging_analyzer(reference)
                .run(state.store.as_ref(), &filter.to_filter())?;
            print_json(&buckets)
        }
        Analysis::Amount { filter } => {
            let report = state
                .amount_analyzer()
                .run(state.store.as_ref(), &filter.to_filter())?;
            print_json(&report)
        }
    }
}
