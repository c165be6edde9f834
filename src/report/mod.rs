// ==========================================
// 生产实绩分析系统 - 报表层
// ==========================================
// 职责: 把分析结果写成外部报表工具读取的 TSV 文件
// ==========================================

pub mod error;
pub mod writer;

pub use error::{ReportError, ReportResult};
pub use writer::{ReportWriter, DAILY_FILE_NAME, DETAIL_FILE_NAME, WEEKLY_FILE_NAME};
