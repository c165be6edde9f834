// ==========================================
// 生产实绩分析系统 - 分析引擎层
// ==========================================
// 职责: 基于 Store 当前内容计算派生表（不落库,每次调用重算）
// 红线: Engine 不拼 SQL; 分析器只读,互不依赖,可对同一快照并行运行
// ==========================================

pub mod amount_summary;
pub mod error_detector;
pub mod inventory_aging;
pub mod progress;

// 重导出核心分析器
pub use amount_summary::{
    AmountReport, AmountSummaryAnalyzer, DailyAmountRow, ItemAmount, MrpTypeAmount,
    ProductionSummary, WeeklyAmountRow, TOP_ITEM_LIMIT,
};
pub use error_detector::{ErrorDetector, ErrorFinding, FindingReason};
pub use inventory_aging::{AgingBucket, AgingParams, InventoryAgingAnalyzer};
pub use progress::{ProgressAnalyzer, ProgressParams, ProgressRow};
