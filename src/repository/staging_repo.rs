// ==========================================
// 生产实绩分析系统 - 仕掛/在库 暂存表仓储
// ==========================================
// 职责: 暂存表的清空、批量写入（INSERT OR IGNORE）与计数
// 说明: 表名/列名来自 StagingTable 常量,值一律参数化
// ==========================================

use crate::domain::staging::{StagingTable, StagingValue};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

impl ToSql for StagingValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            StagingValue::Null => ToSqlOutput::Owned(Value::Null),
            StagingValue::Text(v) => ToSqlOutput::from(v.as_str()),
            StagingValue::Integer(v) => ToSqlOutput::from(*v),
            StagingValue::Real(v) => ToSqlOutput::from(*v),
        })
    }
}

/// 单次写入的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagingWriteCounts {
    pub inserted: usize,
    pub duplicates: usize,
}

pub struct SqliteStagingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStagingStore {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 清空若干暂存表（单事务）
    pub fn clear(&self, tables: &[StagingTable]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut deleted = 0;
        for table in tables {
            deleted += tx.execute(&format!("DELETE FROM {}", table.table_name()), [])?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        info!(tables = tables.len(), deleted, "暂存表已清空");
        Ok(deleted)
    }

    /// 写入行（单事务）
    ///
    /// # 参数
    /// - `rows`: 每行按 `table.columns()` 顺序排列
    /// - `replace`: 先清空本表
    ///
    /// # 返回
    /// - 键重复被 INSERT OR IGNORE 忽略的行计入 duplicates
    pub fn write(
        &self,
        table: StagingTable,
        rows: &[Vec<StagingValue>],
        replace: bool,
    ) -> RepositoryResult<StagingWriteCounts> {
        let specs = table.columns();
        if let Some(bad) = rows.iter().find(|r| r.len() != specs.len()) {
            return Err(RepositoryError::FieldValueError {
                field: table.table_name().to_string(),
                message: format!("期望 {} 列, 实际 {}", specs.len(), bad.len()),
            });
        }

        let columns: Vec<&str> = specs.iter().map(|c| c.column).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            table.table_name(),
            columns.join(", "),
            placeholders.join(", ")
        );

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        if replace {
            let deleted = tx.execute(&format!("DELETE FROM {}", table.table_name()), [])?;
            debug!(table = %table, deleted, "全量替换: 旧数据已删除");
        }

        let mut counts = StagingWriteCounts::default();
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                if stmt.execute(params_from_iter(row.iter()))? == 1 {
                    counts.inserted += 1;
                } else {
                    counts.duplicates += 1;
                }
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(counts)
    }

    pub fn count(&self, table: StagingTable) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.table_name()),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// 读取单列全部值（按 rowid 顺序,NULL 跳过）
    pub fn column_values(
        &self,
        table: StagingTable,
        column: &str,
    ) -> RepositoryResult<Vec<String>> {
        // 列名只接受表定义内的列
        let Some(spec) = table.columns().iter().find(|c| c.column == column) else {
            return Err(RepositoryError::FieldValueError {
                field: column.to_string(),
                message: format!("{} 无此列", table),
            });
        };

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT CAST({col} AS TEXT) FROM {table} WHERE {col} IS NOT NULL ORDER BY rowid",
            col = spec.column,
            table = table.table_name()
        ))?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }
}
