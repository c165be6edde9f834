// ==========================================
// 生产实绩分析系统 - SQLite 连接初始化与迁移
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout,减少外部工具同时读库时的偶发 busy 错误
// - 建库/升级走同一套按版本号递增的迁移
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 6;

/// 迁移脚本（版本号, 说明, SQL）
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "create production_records",
        r#"
        CREATE TABLE IF NOT EXISTS production_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plant TEXT NOT NULL,
            storage_location TEXT,
            item_code TEXT NOT NULL,
            item_text TEXT NOT NULL,
            order_number TEXT NOT NULL,
            order_type TEXT NOT NULL,
            mrp_controller TEXT NOT NULL,
            order_quantity INTEGER NOT NULL,
            actual_quantity INTEGER NOT NULL,
            cumulative_quantity INTEGER NOT NULL,
            remaining_quantity INTEGER NOT NULL,
            input_datetime TEXT NOT NULL,
            planned_completion_date TEXT,
            wbs_element TEXT,
            sales_order_number TEXT,
            sales_order_item_number TEXT,
            amount REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );
        CREATE INDEX IF NOT EXISTS idx_production_order_number ON production_records(order_number);
        CREATE INDEX IF NOT EXISTS idx_production_input_datetime ON production_records(input_datetime);
        CREATE INDEX IF NOT EXISTS idx_production_item_code ON production_records(item_code);
        "#,
    ),
    (
        2,
        "create item_master",
        r#"
        CREATE TABLE IF NOT EXISTS item_master (
            item_code TEXT PRIMARY KEY,
            standard_cost REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );
        "#,
    ),
    (
        3,
        "unique natural key on production_records",
        r#"
        DELETE FROM production_records
        WHERE id NOT IN (
            SELECT MIN(id) FROM production_records GROUP BY order_number, input_datetime
        );
        CREATE UNIQUE INDEX IF NOT EXISTS uq_production_natural_key
            ON production_records(order_number, input_datetime);
        "#,
    ),
    (
        4,
        "create import_batch",
        r#"
        CREATE TABLE IF NOT EXISTS import_batch (
            run_id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            status TEXT NOT NULL,
            parsed_count INTEGER NOT NULL DEFAULT 0,
            filtered_count INTEGER NOT NULL DEFAULT 0,
            valid_count INTEGER NOT NULL DEFAULT 0,
            rejected_count INTEGER NOT NULL DEFAULT 0,
            inserted_count INTEGER NOT NULL DEFAULT 0,
            duplicate_count INTEGER NOT NULL DEFAULT 0,
            elapsed_ms INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            started_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_import_batch_started_at ON import_batch(started_at);
        "#,
    ),
    (
        5,
        "create wip staging tables",
        r#"
        CREATE TABLE IF NOT EXISTS wip_details (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wip_type TEXT,
            wip_key TEXT,
            plant TEXT,
            mrp_controller TEXT,
            factory_name TEXT,
            line_name TEXT,
            order_number TEXT,
            item_text TEXT,
            amount_jpy REAL,
            item_code TEXT,
            initial_quantity INTEGER,
            wip_quantity INTEGER,
            completed_quantity INTEGER,
            initial_date TEXT,
            wip_age TEXT,
            cmpl_flag TEXT,
            material_cost REAL,
            expense_cost REAL,
            UNIQUE(wip_key, order_number, item_code)
        );
        CREATE TABLE IF NOT EXISTS zp02_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_number TEXT UNIQUE,
            order_status TEXT,
            mrp_controller TEXT,
            mrp_controller_name TEXT,
            item_code TEXT,
            item_text TEXT,
            quantity INTEGER,
            wbs_element TEXT,
            completion_date TEXT,
            teco_date TEXT
        );
        CREATE TABLE IF NOT EXISTS zp58_records (
            order_number TEXT PRIMARY KEY
        );
        "#,
    ),
    (
        6,
        "create pc stock staging tables",
        r#"
        CREATE TABLE IF NOT EXISTS storage_locations (
            plant TEXT,
            responsible_dept TEXT,
            inventory_report_category TEXT,
            storage_location TEXT PRIMARY KEY,
            storage_location_name TEXT,
            factory_stock_category TEXT,
            sales_stock_category TEXT,
            factory_category TEXT,
            factory_category_2 TEXT,
            unusable_category TEXT,
            shelf_check_flag TEXT,
            requirements_check TEXT
        );
        CREATE TABLE IF NOT EXISTS zs65_records (
            item_code TEXT NOT NULL,
            plant TEXT,
            item_text TEXT,
            storage_location TEXT NOT NULL DEFAULT '',
            stock_type TEXT,
            stock_valuation TEXT,
            stock_number TEXT,
            delete_flag TEXT,
            lot_number TEXT NOT NULL DEFAULT '',
            base_unit TEXT,
            available_stock REAL,
            currency TEXT,
            available_value REAL,
            in_transfer_stock REAL,
            in_transfer_value REAL,
            in_inspection_stock REAL,
            in_inspection_value REAL,
            unusable_stock REAL,
            restricted_value REAL,
            blocked_stock REAL,
            blocked_stock_value REAL,
            returns_stock REAL,
            returns_stock_value REAL,
            sales_order_number TEXT,
            sales_order_item TEXT,
            shelf_number TEXT,
            account_code TEXT,
            account_name TEXT,
            item_type TEXT,
            stagnant_days INTEGER,
            valuation_class TEXT,
            valuation_class_text TEXT,
            procurement_type TEXT,
            procurement_type_text TEXT,
            valuation_reduction_category TEXT,
            PRIMARY KEY (item_code, storage_location, lot_number)
        );
        CREATE INDEX IF NOT EXISTS idx_zs65_stagnant_days ON zs65_records(stagnant_days);
        "#,
    ),
];

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明: busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置（父目录不存在时创建）
pub fn open_sqlite_connection(db_path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("无法创建数据库目录 {}: {}", parent.display(), e)),
                )
            })?;
        }
    }
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库（测试/一次性分析用）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 应用尚未执行的迁移
///
/// # 返回
/// - Ok(n): 本次执行的迁移数量（已是最新时为 0）
pub fn apply_migrations(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );
        "#,
    )?;

    let current = read_schema_version(conn)?.unwrap_or(0);
    let mut applied = 0;

    for (version, description, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_version (version, description) VALUES (?1, ?2)",
            rusqlite::params![version, description],
        )?;
        tx.commit()?;

        info!(version = *version, description = *description, "数据库迁移已应用");
        applied += 1;
    }

    Ok(applied)
}

/// 打开连接并确保 schema 为最新
pub fn open_and_migrate(db_path: &Path) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    apply_migrations(&conn)?;
    Ok(conn)
}
