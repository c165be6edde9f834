// ==========================================
// 生产实绩分析系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 定期导入生产实绩导出文件,校验后落库,供分析/报表使用
// 运行模型: 单节点、单写入者、按小时调度
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 文件类型表 / 运行配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/迁移）
pub mod db;

// 导入层 - 解析与校验
pub mod importer;

// 数据仓储层 - 数据访问
pub mod repository;

// 编排层 - 单次运行 / 全量重建
pub mod pipeline;

// 引擎层 - 分析器
pub mod engine;

// 报表层 - TSV 输出
pub mod report;

// 应用层 - 装配
pub mod app;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    InMemoryMasterData, LoadSummary, MasterDataLookup, MasterEntry, MrpType, NaturalKey,
    ProductionRecord, RejectReason, RejectRecord, RunSummary,
};

// 配置
pub use config::{AppSettings, FileTypeConfig, FileTypeTable};

// 编排
pub use pipeline::{IngestionOrchestrator, PipelineError, RetryPolicy};

// 存储
pub use repository::{ProductionStore, RecordFilter, SqliteProductionStore};

// 分析
pub use engine::{AmountSummaryAnalyzer, ErrorDetector, InventoryAgingAnalyzer, ProgressAnalyzer};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产实绩分析系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
