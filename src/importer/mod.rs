// ==========================================
// 生产实绩分析系统 - 导入层
// ==========================================
// 职责: 导出文件 → 原始行 → 校验 → ProductionRecord / RejectRecord
//       仕掛/在库文件 → 暂存表
// 支持: 分隔符文本, 定长文本, Excel; Shift_JIS / UTF-16 / UTF-8
// ==========================================

// 模块声明
pub mod decoding;
pub mod error;
pub mod file_parser;
pub mod master_sync;
pub mod staging_loader;
pub mod validator;

// 重导出核心类型
pub use decoding::{resolve_encoding, DecodingReader};
pub use error::{ImportError, ImportResult};
pub use file_parser::{
    DelimitedParser, FileParser, FixedWidthParser, RawRow, RawRowIter, UniversalFileParser,
    WorkbookParser,
};
pub use master_sync::{MasterSync, MasterSyncSummary};
pub use staging_loader::{StagingFailure, StagingLoader, StagingPaths, StagingRunSummary};
pub use validator::{ProductionField, RecordValidator};
