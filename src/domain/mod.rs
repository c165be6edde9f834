// ==========================================
// 生产实绩分析系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含分析逻辑
// ==========================================

pub mod master;
pub mod production;
pub mod staging;
pub mod types;

// 重导出核心类型
pub use master::{InMemoryMasterData, MasterDataLookup, MasterEntry};
pub use production::{
    LoadSummary, NaturalKey, ProductionRecord, RejectReason, RejectRecord, RunSummary, Violation,
    DATETIME_STORAGE_FORMAT, DATE_STORAGE_FORMAT,
};
pub use staging::{ColumnKind, ColumnSpec, StagingLoadSummary, StagingTable, StagingValue};
pub use types::{week_of_month, DateBucket, MrpType};
