// ==========================================
// 生产实绩分析系统 - 编排层错误类型
// ==========================================
// 说明: 只有文件级错误会中止本次运行; 行级问题进入 RunSummary.rejects
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// 重试耗尽仍无法访问文件; 下次调度可重新尝试
    #[error("文件访问失败,已尝试 {attempts} 次: {source}")]
    FileAccessExhausted {
        attempts: u32,
        #[source]
        source: ImportError,
    },

    #[error("导入失败: {0}")]
    Import(#[from] ImportError),

    #[error("存储失败: {0}")]
    Store(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// 是否可由下一次调度恢复
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::FileAccessExhausted { .. }
                | PipelineError::Import(ImportError::FileAccess { .. })
        )
    }
}

/// Result 类型别名
pub type PipelineResult<T> = Result<T, PipelineError>;
