// ==========================================
// 生产实绩分析系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级问题（切分失败/校验失败）以数据形式传递,不走错误通道
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件访问失败 ({path}): {message}")]
    FileAccess { path: String, message: String },

    #[error("未知文件类型: {0}")]
    UnknownFileType(String),

    #[error("不支持的编码: {0}")]
    UnsupportedEncoding(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    // ===== 列错误 =====
    #[error("缺少必需列: {0}")]
    MissingColumn(String),

    // ===== 数据库错误 =====
    #[error("数据库操作失败: {0}")]
    DatabaseError(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 从 io 错误构造文件访问错误（带路径）
    pub fn file_access(path: &std::path::Path, err: &std::io::Error) -> Self {
        ImportError::FileAccess {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_access_keeps_path() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let converted = ImportError::file_access(std::path::Path::new("/data/KANSEI.txt"), &err);
        assert!(matches!(&converted, ImportError::FileAccess { path, .. } if path == "/data/KANSEI.txt"));
        assert!(converted.to_string().contains("no such file"));
    }

    #[test]
    fn test_sqlite_error_maps_to_database_error() {
        let converted: ImportError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(converted, ImportError::DatabaseError(_)));
    }
}
