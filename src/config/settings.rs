// ==========================================
// 生产实绩分析系统 - 运行配置
// ==========================================
// 职责: 数据库/导出文件/主数据/仕掛/报表路径、重试策略、分析参数
// 优先级: 默认值 < JSON 配置文件 < 环境变量
// ==========================================

use crate::config::file_type::{FileTypeConfig, FileTypeTable, KANSEI_JISSEKI, MARA_DL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 环境变量: 数据库路径
pub const ENV_DB_PATH: &str = "PRODUCTION_TRACKING_DB_PATH";
/// 环境变量: 生产实绩导出文件路径
pub const ENV_EXPORT_PATH: &str = "PRODUCTION_TRACKING_EXPORT_PATH";
/// 环境变量: 品目主数据文件路径
pub const ENV_MASTER_PATH: &str = "PRODUCTION_TRACKING_MASTER_PATH";
/// 环境变量: 报表输出目录
pub const ENV_REPORT_DIR: &str = "PRODUCTION_TRACKING_REPORT_DIR";

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败 ({path}): {message}")]
    ReadError { path: String, message: String },

    #[error("配置文件格式错误 ({path}): {message}")]
    ParseError { path: String, message: String },

    #[error("配置值无效 (key: {key}): {message}")]
    InvalidValue { key: String, message: String },
}

// ==========================================
// RetrySettings - 文件访问重试
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 30,
        }
    }
}

// ==========================================
// AgingSettings - 在库滞留分析
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingSettings {
    pub max_bucket_months: u32, // >= 该月数折叠为开放区间
    pub latest_per_order: bool, // 每个指图只取最新快照
}

impl Default for AgingSettings {
    fn default() -> Self {
        Self {
            max_bucket_months: 12,
            latest_per_order: true,
        }
    }
}

// ==========================================
// StagingSettings - 仕掛/在库 文件路径
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingSettings {
    pub wip_details_path: PathBuf,
    pub zp58_path: PathBuf,
    pub zp02_path: PathBuf,
    pub storage_locations_path: PathBuf,
    pub zs65_path: PathBuf,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            wip_details_path: PathBuf::from("data/wip/wip_details.csv"),
            zp58_path: PathBuf::from("data/wip/ZP58.txt"),
            zp02_path: PathBuf::from("data/wip/ZP02.TXT"),
            storage_locations_path: PathBuf::from("data/wip/storage_locations.txt"),
            zs65_path: PathBuf::from("data/wip/ZS65.TXT"),
        }
    }
}

// ==========================================
// AppSettings - 应用配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub db_path: PathBuf,
    pub export_path: PathBuf,
    pub export_file_type: String,
    pub master_path: PathBuf,
    pub master_file_type: String,
    pub report_dir: PathBuf,
    pub retry: RetrySettings,
    pub recognized_mrp_controllers: Vec<String>,
    pub mrp_controller_prefix: Option<String>,
    pub master_plant: Option<String>,
    pub aging: AgingSettings,
    pub staging: StagingSettings,
    pub file_types: Vec<FileTypeConfig>, // 覆盖/追加到默认文件类型表
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            export_path: PathBuf::from("data/sample/KANSEI_JISSEKI.txt"),
            export_file_type: KANSEI_JISSEKI.to_string(),
            master_path: PathBuf::from("data/sample/MARA_DL.csv"),
            master_file_type: MARA_DL.to_string(),
            report_dir: PathBuf::from("reports"),
            retry: RetrySettings::default(),
            recognized_mrp_controllers: (1..=6).map(|i| format!("PC{}", i)).collect(),
            mrp_controller_prefix: Some("PC".to_string()),
            master_plant: Some("P100".to_string()),
            aging: AgingSettings::default(),
            staging: StagingSettings::default(),
            file_types: Vec::new(),
        }
    }
}

impl AppSettings {
    /// 加载配置: 默认值 → JSON 文件（可选）→ 环境变量
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match config_path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// 从 JSON 文件读取（缺省字段取默认值）
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// 应用环境变量覆写（空值忽略）
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = non_empty_env(ENV_DB_PATH) {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty_env(ENV_EXPORT_PATH) {
            self.export_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty_env(ENV_MASTER_PATH) {
            self.master_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty_env(ENV_REPORT_DIR) {
            self.report_dir = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_attempts".to_string(),
                message: "至少为 1".to_string(),
            });
        }
        if self.aging.max_bucket_months == 0 {
            return Err(ConfigError::InvalidValue {
                key: "aging.max_bucket_months".to_string(),
                message: "至少为 1".to_string(),
            });
        }
        for file_type in &self.file_types {
            if encoding_rs::Encoding::for_label(file_type.encoding.as_bytes()).is_none() {
                return Err(ConfigError::InvalidValue {
                    key: format!("file_types.{}.encoding", file_type.name),
                    message: format!("未知编码: {}", file_type.encoding),
                });
            }
        }
        Ok(())
    }

    /// 默认表 + 配置中的覆写
    pub fn file_type_table(&self) -> FileTypeTable {
        let mut table = FileTypeTable::with_defaults();
        for file_type in &self.file_types {
            table.register(file_type.clone());
        }
        table
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 默认数据库路径
///
/// 优先使用用户数据目录,拿不到时回退到当前目录
pub fn default_db_path() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => data_dir.join("production-tracking").join("production.db"),
        None => PathBuf::from("./production.db"),
    }
}
