// ==========================================
// 生产实绩分析系统 - 运行记录仓储
// ==========================================
// 职责: import_batch 表（每次运行一行,只存计数,不存拒收明细）
// ==========================================

use crate::domain::production::{RunSummary, DATETIME_STORAGE_FORMAT};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    Clean,          // 无拒收
    WithRejects,    // 有拒收（数据质量问题）
    Failed,         // 文件访问失败等,本次运行未落库
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Clean => "CLEAN",
            BatchStatus::WithRejects => "WITH_REJECTS",
            BatchStatus::Failed => "FAILED",
        }
    }

    pub fn from_code(s: &str) -> Self {
        match s {
            "CLEAN" => BatchStatus::Clean,
            "WITH_REJECTS" => BatchStatus::WithRejects,
            _ => BatchStatus::Failed,
        }
    }
}

/// 运行记录行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportBatch {
    pub run_id: String,
    pub file_path: String,
    pub status: BatchStatus,
    pub parsed_count: i64,
    pub rejected_count: i64,
    pub inserted_count: i64,
    pub duplicate_count: i64,
    pub error_message: Option<String>,
    pub started_at: NaiveDateTime,
}

pub struct ImportBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportBatchRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 记录一次完成的运行
    pub fn record(&self, summary: &RunSummary) -> RepositoryResult<()> {
        let status = if summary.is_clean() {
            BatchStatus::Clean
        } else {
            BatchStatus::WithRejects
        };

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_batch (
                run_id, file_path, status,
                parsed_count, filtered_count, valid_count, rejected_count,
                inserted_count, duplicate_count, elapsed_ms, error_message, started_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11)
            "#,
            params![
                summary.run_id,
                summary.file_path,
                status.as_str(),
                summary.parsed_count as i64,
                summary.filtered_count as i64,
                summary.valid_count as i64,
                summary.rejected_count as i64,
                summary.inserted_count as i64,
                summary.duplicate_count as i64,
                summary.elapsed_ms as i64,
                now_text(),
            ],
        )?;
        Ok(())
    }

    /// 记录一次失败的运行
    pub fn record_failure(&self, run_id: &str, file_path: &str, error: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_batch (run_id, file_path, status, error_message, started_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![run_id, file_path, BatchStatus::Failed.as_str(), error, now_text()],
        )?;
        Ok(())
    }

    /// 最近一次运行
    pub fn latest(&self) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT run_id, file_path, status, parsed_count, rejected_count,
                       inserted_count, duplicate_count, error_message, started_at
                FROM import_batch
                ORDER BY started_at DESC, rowid DESC
                LIMIT 1
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((run_id, file_path, status, parsed, rejected, inserted, duplicate, error, started)) =
            row
        else {
            return Ok(None);
        };

        let started_at = NaiveDateTime::parse_from_str(&started, DATETIME_STORAGE_FORMAT)
            .map_err(|e| RepositoryError::FieldValueError {
                field: "started_at".to_string(),
                message: e.to_string(),
            })?;

        Ok(Some(ImportBatch {
            run_id,
            file_path,
            status: BatchStatus::from_code(&status),
            parsed_count: parsed,
            rejected_count: rejected,
            inserted_count: inserted,
            duplicate_count: duplicate,
            error_message: error,
            started_at,
        }))
    }
}

fn now_text() -> String {
    Local::now()
        .naive_local()
        .format(DATETIME_STORAGE_FORMAT)
        .to_string()
}
