// ==========================================
// 生产实绩分析系统 - TSV 报表输出
// ==========================================
// 输出文件（UTF-8 BOM, Tab 分隔）:
// - 明細_抜粋.txt     明细抽取
// - 日別サマリー.txt   日别 × MRP 管理者
// - 週別サマリー.txt   周别 × MRP 管理者 + 合計行
// 金额一律截断为整数
// ==========================================

use crate::domain::production::{ProductionRecord, DATE_STORAGE_FORMAT};
use crate::domain::types::week_of_month;
use crate::engine::amount_summary::{AmountReport, WeeklyAmountRow, GRAND_TOTAL_LABEL};
use crate::report::error::{ReportError, ReportResult};
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DETAIL_FILE_NAME: &str = "明細_抜粋.txt";
pub const DAILY_FILE_NAME: &str = "日別サマリー.txt";
pub const WEEKLY_FILE_NAME: &str = "週別サマリー.txt";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const DETAIL_HEADERS: &[&str] = &[
    "完成日",
    "週",
    "MRP管理者",
    "指図番号",
    "品目コード",
    "品目テキスト",
    "指図数量",
    "実績数量",
    "金額",
];

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// 写出三份报表
    ///
    /// # 返回
    /// - Ok(paths): 按 明细 / 日别 / 周别 顺序的文件路径
    pub fn write_all(
        &self,
        records: &[ProductionRecord],
        report: &AmountReport,
    ) -> ReportResult<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| ReportError::Io {
            path: self.output_dir.display().to_string(),
            message: e.to_string(),
        })?;

        let paths = vec![
            self.write_detail(records)?,
            self.write_daily(report)?,
            self.write_weekly(report)?,
        ];

        info!(dir = %self.output_dir.display(), files = paths.len(), "报表输出完成");
        Ok(paths)
    }

    fn open(&self, file_name: &str) -> ReportResult<(PathBuf, Writer<File>)> {
        let path = self.output_dir.join(file_name);
        let mut file = File::create(&path).map_err(|e| io_error(&path, e))?;
        file.write_all(UTF8_BOM).map_err(|e| io_error(&path, e))?;

        let writer = WriterBuilder::new().delimiter(b'\t').from_writer(file);
        Ok((path, writer))
    }

    fn write_detail(&self, records: &[ProductionRecord]) -> ReportResult<PathBuf> {
        let (path, mut writer) = self.open(DETAIL_FILE_NAME)?;
        writer.write_record(DETAIL_HEADERS)?;

        let mut sorted: Vec<&ProductionRecord> = records.iter().collect();
        sorted.sort_by(|a, b| {
            (a.input_datetime, &a.mrp_controller, &a.order_number)
                .cmp(&(b.input_datetime, &b.mrp_controller, &b.order_number))
        });

        for record in sorted {
            let date = record.completion_date();
            writer.write_record([
                date.format(DATE_STORAGE_FORMAT).to_string(),
                week_of_month(date).to_string(),
                record.mrp_controller.clone(),
                record.order_number.clone(),
                record.item_code.clone(),
                record.item_text.clone(),
                record.order_quantity.to_string(),
                record.actual_quantity.to_string(),
                truncate_amount(record.amount.unwrap_or(0.0)),
            ])?;
        }

        writer.flush().map_err(|e| io_error(&path, e))?;
        Ok(path)
    }

    fn write_daily(&self, report: &AmountReport) -> ReportResult<PathBuf> {
        let (path, mut writer) = self.open(DAILY_FILE_NAME)?;

        let mut header = vec!["週".to_string(), "完成日".to_string()];
        header.extend(report.controllers.iter().cloned());
        header.push(GRAND_TOTAL_LABEL.to_string());
        writer.write_record(&header)?;

        for row in &report.daily {
            let mut fields = vec![
                row.week_of_month.to_string(),
                row.date.format(DATE_STORAGE_FORMAT).to_string(),
            ];
            fields.extend(row.amounts.iter().map(|v| truncate_amount(*v)));
            fields.push(truncate_amount(row.total));
            writer.write_record(&fields)?;
        }

        writer.flush().map_err(|e| io_error(&path, e))?;
        Ok(path)
    }

    fn write_weekly(&self, report: &AmountReport) -> ReportResult<PathBuf> {
        let (path, mut writer) = self.open(WEEKLY_FILE_NAME)?;

        let mut header = vec!["週".to_string()];
        header.extend(report.controllers.iter().cloned());
        header.push(GRAND_TOTAL_LABEL.to_string());
        writer.write_record(&header)?;

        for row in report
            .weekly
            .iter()
            .chain(std::iter::once(&report.weekly_grand_total))
        {
            writer.write_record(weekly_fields(row))?;
        }

        writer.flush().map_err(|e| io_error(&path, e))?;
        Ok(path)
    }
}

fn weekly_fields(row: &WeeklyAmountRow) -> Vec<String> {
    let mut fields = vec![row.week.clone()];
    fields.extend(row.amounts.iter().map(|v| truncate_amount(*v)));
    fields.push(truncate_amount(row.total));
    fields
}

fn truncate_amount(amount: f64) -> String {
    (amount.trunc() as i64).to_string()
}

fn io_error(path: &Path, err: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::amount_summary::AmountSummaryAnalyzer;
    use chrono::NaiveDate;

    fn record(controller: &str, amount: f64) -> ProductionRecord {
        ProductionRecord {
            plant: "P100".to_string(),
            storage_location: None,
            item_code: "ITEM001".to_string(),
            item_text: "部品A".to_string(),
            order_number: format!("ORD-{}", controller),
            order_type: "ZP11".to_string(),
            mrp_controller: controller.to_string(),
            order_quantity: 10,
            actual_quantity: 3,
            cumulative_quantity: 3,
            remaining_quantity: 7,
            input_datetime: NaiveDate::from_ymd_opt(2025, 8, 4)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            planned_completion_date: None,
            wbs_element: None,
            sales_order_number: None,
            sales_order_item_number: None,
            amount: Some(amount),
        }
    }

    #[test]
    fn test_write_all_with_bom_and_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record("PC1", 1234.9), record("PC4", 10.5)];
        let report = AmountSummaryAnalyzer::new(vec!["PC1".to_string(), "PC4".to_string()])
            .analyze(&records);

        let paths = ReportWriter::new(dir.path().join("out"))
            .write_all(&records, &report)
            .unwrap();
        assert_eq!(paths.len(), 3);

        let bytes = std::fs::read(&paths[2]).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "週\tPC1\tPC4\t合計");
        assert_eq!(lines[1], "2025-08-W2\t1234\t10\t1245");
        assert_eq!(lines[2], "合計\t1234\t10\t1245");

        let detail = std::fs::read_to_string(&paths[0]).unwrap();
        assert!(detail.contains("2025-08-04\t2\tPC1\tORD-PC1\tITEM001\t部品A\t10\t3\t1234"));
    }
}
