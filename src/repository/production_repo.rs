// ==========================================
// 生产实绩分析系统 - 生产实绩仓储
// ==========================================
// 职责: production_records 表的追加写入、条件查询、全量清空
// 红线: 自然键已存在时跳过,绝不覆盖历史
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::production::{
    LoadSummary, ProductionRecord, DATETIME_STORAGE_FORMAT, DATE_STORAGE_FORMAT,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

// ==========================================
// RecordFilter - 查询条件
// ==========================================
// 所有条件为 AND 组合; 全部为空时返回全表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub plant: Option<String>,
    pub item_code: Option<String>,
    pub order_type: Option<String>,
    pub date_from: Option<NaiveDate>, // 入力日時 >= 当日 00:00:00
    pub date_to: Option<NaiveDate>,   // 入力日時 <= 当日 23:59:59
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_plant(mut self, plant: &str) -> Self {
        self.plant = Some(plant.to_string());
        self
    }

    pub fn with_item_code(mut self, item_code: &str) -> Self {
        self.item_code = Some(item_code.to_string());
        self
    }

    pub fn with_order_type(mut self, order_type: &str) -> Self {
        self.order_type = Some(order_type.to_string());
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// 生成 WHERE 子句与参数
    fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(plant) = &self.plant {
            clauses.push("plant = ?");
            values.push(Value::Text(plant.clone()));
        }
        if let Some(item_code) = &self.item_code {
            clauses.push("item_code = ?");
            values.push(Value::Text(item_code.clone()));
        }
        if let Some(order_type) = &self.order_type {
            clauses.push("order_type = ?");
            values.push(Value::Text(order_type.clone()));
        }
        if let Some(from) = self.date_from {
            clauses.push("input_datetime >= ?");
            values.push(Value::Text(format!("{} 00:00:00", from.format(DATE_STORAGE_FORMAT))));
        }
        if let Some(to) = self.date_to {
            clauses.push("input_datetime <= ?");
            values.push(Value::Text(format!("{} 23:59:59", to.format(DATE_STORAGE_FORMAT))));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

// ==========================================
// ProductionStore Trait
// ==========================================
// 用途: 编排器写入,分析引擎/健康检查只读
// 实现者: SqliteProductionStore
pub trait ProductionStore: Send + Sync {
    /// 追加一批记录（单事务）,自然键已存在的记录跳过
    fn load(&self, records: &[ProductionRecord]) -> RepositoryResult<LoadSummary>;

    /// 条件查询（结果按 input_datetime, order_number 升序）
    fn query(&self, filter: &RecordFilter) -> RepositoryResult<Vec<ProductionRecord>>;

    /// 全量清空（仅全量重建模式使用）
    fn reset(&self) -> RepositoryResult<usize>;

    /// 最近一次写入时间（空表为 None）
    fn last_update_timestamp(&self) -> RepositoryResult<Option<NaiveDateTime>>;

    /// 记录总数
    fn count(&self) -> RepositoryResult<usize>;
}

const SELECT_COLUMNS: &str = r#"
    plant, storage_location, item_code, item_text,
    order_number, order_type, mrp_controller,
    order_quantity, actual_quantity, cumulative_quantity, remaining_quantity,
    input_datetime, planned_completion_date,
    wbs_element, sales_order_number, sales_order_item_number, amount
"#;

// ==========================================
// SqliteProductionStore
// ==========================================
pub struct SqliteProductionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProductionStore {
    /// 从已有连接创建仓储实例（调用方负责迁移）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<ProductionRecord> {
        let input_datetime_raw: String = row.get(11)?;
        let input_datetime =
            NaiveDateTime::parse_from_str(&input_datetime_raw, DATETIME_STORAGE_FORMAT).map_err(
                |e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        11,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                },
            )?;

        Ok(ProductionRecord {
            plant: row.get(0)?,
            storage_location: row.get(1)?,
            item_code: row.get(2)?,
            item_text: row.get(3)?,
            order_number: row.get(4)?,
            order_type: row.get(5)?,
            mrp_controller: row.get(6)?,
            order_quantity: row.get(7)?,
            actual_quantity: row.get(8)?,
            cumulative_quantity: row.get(9)?,
            remaining_quantity: row.get(10)?,
            input_datetime,
            planned_completion_date: row
                .get::<_, Option<String>>(12)?
                .and_then(|s| NaiveDate::parse_from_str(&s, DATE_STORAGE_FORMAT).ok()),
            wbs_element: row.get(13)?,
            sales_order_number: row.get(14)?,
            sales_order_item_number: row.get(15)?,
            amount: row.get(16)?,
        })
    }
}

impl ProductionStore for SqliteProductionStore {
    fn load(&self, records: &[ProductionRecord]) -> RepositoryResult<LoadSummary> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut summary = LoadSummary::default();
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO production_records (
                    plant, storage_location, item_code, item_text,
                    order_number, order_type, mrp_controller,
                    order_quantity, actual_quantity, cumulative_quantity, remaining_quantity,
                    input_datetime, planned_completion_date,
                    wbs_element, sales_order_number, sales_order_item_number, amount
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                "#,
            )?;

            // 按解析顺序写入; OR IGNORE 时 changes = 0
            for record in records {
                let changed = stmt.execute(params![
                    record.plant,
                    record.storage_location,
                    record.item_code,
                    record.item_text,
                    record.order_number,
                    record.order_type,
                    record.mrp_controller,
                    record.order_quantity,
                    record.actual_quantity,
                    record.cumulative_quantity,
                    record.remaining_quantity,
                    record.input_datetime.format(DATETIME_STORAGE_FORMAT).to_string(),
                    record
                        .planned_completion_date
                        .map(|d| d.format(DATE_STORAGE_FORMAT).to_string()),
                    record.wbs_element,
                    record.sales_order_number,
                    record.sales_order_item_number,
                    record.amount,
                ])?;

                if changed == 0 {
                    debug!(key = %record.natural_key(), "自然键已存在,跳过");
                    summary.skipped_duplicate += 1;
                } else {
                    summary.inserted += 1;
                }
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            inserted = summary.inserted,
            skipped_duplicate = summary.skipped_duplicate,
            "生产实绩写入完成"
        );
        Ok(summary)
    }

    fn query(&self, filter: &RecordFilter) -> RepositoryResult<Vec<ProductionRecord>> {
        let conn = self.get_conn()?;
        let (where_clause, values) = filter.to_sql();
        let sql = format!(
            "SELECT {} FROM production_records {} ORDER BY input_datetime, order_number",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = records.len(), ?filter, "生产实绩查询完成");
        Ok(records)
    }

    fn reset(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM production_records", [])?;
        warn!(deleted, "生产实绩表已清空（全量重建）");
        Ok(deleted)
    }

    fn last_update_timestamp(&self) -> RepositoryResult<Option<NaiveDateTime>> {
        let conn = self.get_conn()?;
        let latest: Option<String> =
            conn.query_row("SELECT MAX(created_at) FROM production_records", [], |row| {
                row.get(0)
            })?;

        match latest {
            None => Ok(None),
            Some(s) => NaiveDateTime::parse_from_str(&s, DATETIME_STORAGE_FORMAT)
                .map(Some)
                .map_err(|e| RepositoryError::FieldValueError {
                    field: "created_at".to_string(),
                    message: e.to_string(),
                }),
        }
    }

    fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM production_records", [], |row| {
            row.get(0)
        })?;
        Ok(n as usize)
    }
}
