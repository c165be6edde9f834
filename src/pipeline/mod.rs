// ==========================================
// 生产实绩分析系统 - 编排层
// ==========================================
// 职责: 单次运行 / 全量重建两个入口; 文件访问有界重试
// 调度: 单线程运行至完成,由外部调度器保证同一时刻只有一次运行
// ==========================================

pub mod error;
pub mod orchestrator;
pub mod retry;

pub use error::{PipelineError, PipelineResult};
pub use orchestrator::IngestionOrchestrator;
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
