// ==========================================
// 生产实绩分析系统 - 报表输出错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("报表文件写入失败 ({path}): {message}")]
    Io { path: String, message: String },

    #[error("TSV 写入失败: {0}")]
    Csv(String),
}

// 实现 From<csv::Error>
impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        ReportError::Csv(err.to_string())
    }
}

/// Result 类型别名
pub type ReportResult<T> = Result<T, ReportError>;
