// ==========================================
// 生产实绩分析系统 - 配置层
// ==========================================
// 职责: 文件类型声明表 + 应用运行配置
// ==========================================

pub mod file_type;
pub mod settings;

// 重导出核心配置
pub use file_type::{
    FileLayout, FileTypeConfig, FileTypeTable, FixedWidthColumn, KANSEI_JISSEKI,
    KANSEI_JISSEKI_CSV, MARA_DL, STORAGE_LOCATIONS, WIP_DETAILS, WIP_DETAIL_COLUMNS, ZP02, ZP58,
    ZS65,
};
pub use settings::{AgingSettings, AppSettings, ConfigError, RetrySettings, StagingSettings};
