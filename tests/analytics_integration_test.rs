// ==========================================
// 分析引擎 集成测试
// ==========================================
// 测试目标: 导入后的 Store → 各分析器 → 报表
// 覆盖: 达成率分母为 0 / 账龄整月边界 / 主数据同步 → 金额 → TSV
// ==========================================

mod test_helpers;

use chrono::NaiveDate;
use production_tracking::app::AppState;
use production_tracking::config::AppSettings;
use production_tracking::domain::{DateBucket, MrpType};
use production_tracking::engine::{
    AgingParams, InventoryAgingAnalyzer, ProgressAnalyzer, ProgressParams,
};
use production_tracking::logging;
use production_tracking::report::ReportWriter;
use production_tracking::repository::{ProductionStore, RecordFilter};
use std::path::Path;
use std::sync::Arc;
use test_helpers::{
    memory_store, test_orchestrator, write_export, write_shift_jis_export, CountingSleeper,
    ExportRow,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// 写出 UTF-16LE（带 BOM）的品目主数据文件
fn write_master_file(path: &Path, lines: &[&str]) {
    let mut text = String::from("プラント\t品目\t品目テキスト\t標準原価\n");
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn test_progress_zero_order_quantity_ratio() {
    logging::init_test();

    let file = write_export(&[
        ExportRow::new("ORD001", "2025/08/21 10:00").quantities("0", "0", "0", "0"),
        ExportRow::new("ORD002", "2025/08/21 10:00")
            .order_type("ZP21")
            .quantities("200", "50", "50", "150"),
        ExportRow::new("ORD003", "2025/08/22 10:00")
            .order_type("ZP21")
            .quantities("200", "150", "200", "0"),
    ]);
    let store = memory_store();
    test_orchestrator(store.clone(), Arc::new(CountingSleeper::default()))
        .run_once(file.path())
        .unwrap();

    let rows = ProgressAnalyzer::new(ProgressParams::default())
        .run(store.as_ref(), &RecordFilter::all())
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].order_type, "ZP11");
    assert_eq!(rows[0].achievement_ratio, 0.0);
    assert_eq!(rows[1].order_type, "ZP21");
    assert_eq!(rows[1].order_quantity, 400);
    assert_eq!(rows[1].actual_quantity, 200);
    assert_eq!(rows[1].achievement_ratio, 0.5);

    let daily = ProgressAnalyzer::new(ProgressParams {
        by_item_code: true,
        date_bucket: Some(DateBucket::Day),
    })
    .run(store.as_ref(), &RecordFilter::all().with_order_type("ZP21"))
    .unwrap();
    let buckets: Vec<Option<String>> = daily.iter().map(|r| r.bucket.clone()).collect();
    assert_eq!(
        buckets,
        vec![Some("2025-08-21".to_string()), Some("2025-08-22".to_string())]
    );
    assert!(daily.iter().all(|r| r.item_code.as_deref() == Some("ITEM001")));
}

#[test]
fn test_aging_whole_month_boundaries() {
    logging::init_test();

    let file = write_export(&[
        // 恰好 1 个月 → 1 桶
        ExportRow::new("ORD001", "2025/07/21 08:00"),
        // 差 1 天满 1 个月 → 0 桶
        ExportRow::new("ORD002", "2025/07/22 08:00"),
        // 晚于基准日 → 0 桶
        ExportRow::new("ORD003", "2025/08/25 08:00"),
        // 满 12 个月 → 开放区间桶
        ExportRow::new("ORD004", "2024/08/21 08:00"),
    ]);
    let store = memory_store();
    test_orchestrator(store.clone(), Arc::new(CountingSleeper::default()))
        .run_once(file.path())
        .unwrap();

    let params = AgingParams {
        reference_date: d(2025, 8, 21),
        max_bucket_months: 12,
        latest_per_order: true,
    };
    let buckets = InventoryAgingAnalyzer::new(params)
        .run(store.as_ref(), &RecordFilter::all())
        .unwrap();

    assert_eq!(buckets.len(), 13);
    assert_eq!(buckets[0].age_bin, "0");
    assert_eq!(buckets[0].record_count, 2);
    assert_eq!(buckets[1].record_count, 1);
    assert_eq!(buckets[12].age_bin, "12+");
    assert_eq!(buckets[12].age_max_months, None);
    assert_eq!(buckets[12].record_count, 1);
    assert_eq!(buckets[12].remaining_ratio, 0.4);

    let total: usize = buckets.iter().map(|b| b.record_count).sum();
    assert_eq!(total, 4);
    // 空桶比率为 0
    assert_eq!(buckets[5].remaining_ratio, 0.0);
}

#[test]
fn test_aging_latest_snapshot_per_order() {
    logging::init_test();

    let file = write_export(&[
        ExportRow::new("ORD001", "2025/05/01 08:00").quantities("100", "10", "10", "90"),
        ExportRow::new("ORD001", "2025/08/01 08:00").quantities("100", "30", "40", "60"),
    ]);
    let store = memory_store();
    test_orchestrator(store.clone(), Arc::new(CountingSleeper::default()))
        .run_once(file.path())
        .unwrap();

    let params = AgingParams {
        reference_date: d(2025, 8, 21),
        max_bucket_months: 6,
        latest_per_order: true,
    };
    let buckets = InventoryAgingAnalyzer::new(params)
        .run(store.as_ref(), &RecordFilter::all())
        .unwrap();
    assert_eq!(buckets[0].record_count, 1);
    assert_eq!(buckets[0].remaining_quantity, 60);
    assert_eq!(buckets[3].record_count, 0);

    let all_snapshots = InventoryAgingAnalyzer::new(AgingParams {
        latest_per_order: false,
        ..params
    })
    .run(store.as_ref(), &RecordFilter::all())
    .unwrap();
    assert_eq!(all_snapshots[3].record_count, 1);
}

#[test]
fn test_master_sync_amount_and_report() {
    logging::init_test();

    let dir = tempfile::tempdir().unwrap();
    let master_path = dir.path().join("MARA_DL.csv");
    write_master_file(
        &master_path,
        &[
            "P100\tITEM001\t部品A\t1,200.5",
            "P200\tITEM002\t他工場\t999",
            "P100\tITEM002\t部品B\t3",
            "P100\tITEM001\t部品A\t100",
        ],
    );
    let export_path = dir.path().join("KANSEI_JISSEKI.txt");
    write_shift_jis_export(
        &export_path,
        &[
            ExportRow::new("ORD001", "2025/08/04 09:00"),
            ExportRow::new("ORD002", "2025/08/05 09:00")
                .item("ITEM002")
                .controller("PC4"),
            ExportRow::new("ORD003", "2025/08/05 10:00").item("ITEM404"),
        ],
    );

    let mut settings = AppSettings::default();
    settings.db_path = dir.path().join("production.db");
    settings.report_dir = dir.path().join("reports");
    let state = AppState::new(settings).unwrap();

    let sync = state.master_sync().unwrap().sync_from_file(&master_path).unwrap();
    assert_eq!(sync.read, 4);
    assert_eq!(sync.kept, 2);
    assert_eq!(sync.duplicates, 1);

    let run = state.orchestrator().unwrap().run_once(&export_path).unwrap();
    assert_eq!(run.inserted_count, 3);

    let records = state.store.query(&RecordFilter::all()).unwrap();
    let amounts: Vec<(String, Option<f64>)> = records
        .iter()
        .map(|r| (r.order_number.clone(), r.amount))
        .collect();
    assert_eq!(
        amounts,
        vec![
            ("ORD001".to_string(), Some(1000.0)),
            ("ORD002".to_string(), Some(30.0)),
            ("ORD003".to_string(), Some(0.0)),
        ]
    );

    let master = state.master_snapshot().unwrap();
    let findings = state.error_detector(&master).detect(&records);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].key.order_number, "ORD003");

    let report = state.amount_analyzer().analyze(&records);
    assert_eq!(report.summary.record_count, 3);
    assert_eq!(report.summary.achievement_rate, 10.0);
    assert_eq!(report.summary.unique_item_count, 3);
    assert_eq!(report.summary.unique_order_count, 3);
    // 品目テキスト相同,合并为一行
    assert_eq!(report.top_items.len(), 1);
    assert_eq!(report.top_items[0].amount, 1030.0);
    assert_eq!(report.weekly_grand_total.total, 1030.0);
    let in_house = report
        .by_mrp_type
        .iter()
        .find(|t| t.mrp_type == MrpType::InHouse)
        .unwrap();
    assert_eq!(in_house.amount, 1000.0);

    let paths = ReportWriter::new(&state.settings.report_dir)
        .write_all(&records, &report)
        .unwrap();
    assert_eq!(paths.len(), 3);
    let daily = std::fs::read_to_string(&paths[1]).unwrap();
    let lines: Vec<&str> = daily.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("週\t完成日\tPC1\tPC2"));
    assert!(lines[1].starts_with("2\t2025-08-04\t1000\t0"));
}
