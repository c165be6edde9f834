// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、导出文件生成、测试编排器装配
// ==========================================

#![allow(dead_code)]

use production_tracking::config::{FileTypeConfig, FileTypeTable};
use production_tracking::db;
use production_tracking::domain::{InMemoryMasterData, MasterEntry};
use production_tracking::pipeline::{IngestionOrchestrator, RetryPolicy, Sleeper};
use production_tracking::repository::SqliteProductionStore;
use rusqlite::Connection;
use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

/// 测试用文件类型（UTF-8 TSV）
pub const TEST_FILE_TYPE: &str = "TEST_TSV";

/// 导出文件表头（日文列名）
pub const EXPORT_HEADER: &[&str] = &[
    "プラント",
    "保管場所",
    "品目コード",
    "品目テキスト",
    "指図番号",
    "指図タイプ",
    "MRP管理者",
    "指図数量",
    "実績数量",
    "累計数量",
    "残数量",
    "入力日時",
    "計画完了日",
    "WBS要素",
    "受注伝票番号",
    "受注明細番号",
];

/// 创建临时测试数据库并执行迁移
///
/// # 返回
/// - TempDir: 临时目录（需要保持存活）
/// - Connection: 已迁移的连接
pub fn create_test_db() -> Result<(TempDir, Connection), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let conn = db::open_and_migrate(&dir.path().join("production.db"))?;
    Ok((dir, conn))
}

/// 内存库上的 Store
pub fn memory_store() -> Arc<SqliteProductionStore> {
    let conn = db::open_in_memory().expect("open in-memory db");
    db::apply_migrations(&conn).expect("apply migrations");
    Arc::new(SqliteProductionStore::from_connection(Arc::new(Mutex::new(
        conn,
    ))))
}

/// 测试文件类型表
pub fn test_file_types() -> FileTypeTable {
    let mut table = FileTypeTable::with_defaults();
    table.register(FileTypeConfig::delimited(TEST_FILE_TYPE, "utf-8", b'\t', false));
    table
}

/// 测试主数据: ITEM001=10.0, ITEM002=2.5
pub fn test_master() -> InMemoryMasterData {
    InMemoryMasterData::from_entries(vec![
        MasterEntry {
            item_code: "ITEM001".to_string(),
            standard_cost: Some(10.0),
        },
        MasterEntry {
            item_code: "ITEM002".to_string(),
            standard_cost: Some(2.5),
        },
    ])
}

/// 不等待的 Sleeper,记录等待次数
#[derive(Default)]
pub struct CountingSleeper {
    pub calls: Mutex<Vec<Duration>>,
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

/// 装配测试编排器（UTF-8 TSV, 不等待的重试）
pub fn test_orchestrator(
    store: Arc<SqliteProductionStore>,
    sleeper: Arc<CountingSleeper>,
) -> IngestionOrchestrator {
    IngestionOrchestrator::new(store, Arc::new(test_master()), test_file_types())
        .with_file_type(TEST_FILE_TYPE)
        .with_retry_policy(RetryPolicy::new(3, Duration::from_secs(30)))
        .with_sleeper(sleeper)
        .with_mrp_controller_prefix(Some("PC".to_string()))
}

// ==========================================
// 导出行构造
// ==========================================

#[derive(Debug, Clone)]
pub struct ExportRow {
    pub plant: String,
    pub item_code: String,
    pub order_number: String,
    pub order_type: String,
    pub mrp_controller: String,
    pub order_quantity: String,
    pub actual_quantity: String,
    pub cumulative_quantity: String,
    pub remaining_quantity: String,
    pub input_datetime: String,
}

impl ExportRow {
    pub fn new(order_number: &str, input_datetime: &str) -> Self {
        Self {
            plant: "P100".to_string(),
            item_code: "ITEM001".to_string(),
            order_number: order_number.to_string(),
            order_type: "ZP11".to_string(),
            mrp_controller: "PC1".to_string(),
            order_quantity: "100".to_string(),
            actual_quantity: "10".to_string(),
            cumulative_quantity: "60".to_string(),
            remaining_quantity: "40".to_string(),
            input_datetime: input_datetime.to_string(),
        }
    }

    pub fn item(mut self, item_code: &str) -> Self {
        self.item_code = item_code.to_string();
        self
    }

    pub fn controller(mut self, controller: &str) -> Self {
        self.mrp_controller = controller.to_string();
        self
    }

    pub fn quantities(mut self, order: &str, actual: &str, cumulative: &str, remaining: &str) -> Self {
        self.order_quantity = order.to_string();
        self.actual_quantity = actual.to_string();
        self.cumulative_quantity = cumulative.to_string();
        self.remaining_quantity = remaining.to_string();
        self
    }

    pub fn order_type(mut self, order_type: &str) -> Self {
        self.order_type = order_type.to_string();
        self
    }

    fn to_line(&self) -> String {
        [
            self.plant.as_str(),
            "S001",
            self.item_code.as_str(),
            "テスト品目",
            self.order_number.as_str(),
            self.order_type.as_str(),
            self.mrp_controller.as_str(),
            self.order_quantity.as_str(),
            self.actual_quantity.as_str(),
            self.cumulative_quantity.as_str(),
            self.remaining_quantity.as_str(),
            self.input_datetime.as_str(),
            "20250830",
            "",
            "000123",
            "10",
        ]
        .join("\t")
    }
}

/// 写出 UTF-8 TSV 导出文件
pub fn write_export(rows: &[ExportRow]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp export");
    writeln!(file, "{}", EXPORT_HEADER.join("\t")).unwrap();
    for row in rows {
        writeln!(file, "{}", row.to_line()).unwrap();
    }
    file.flush().unwrap();
    file
}

/// 写出 Shift_JIS TSV 导出文件（生产环境格式）
pub fn write_shift_jis_export(path: &std::path::Path, rows: &[ExportRow]) {
    let mut text = EXPORT_HEADER.join("\t");
    text.push('\n');
    for row in rows {
        text.push_str(&row.to_line());
        text.push('\n');
    }
    let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(&text);
    std::fs::write(path, &encoded).expect("write shift_jis export");
}
