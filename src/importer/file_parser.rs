// ==========================================
// 生产实绩分析系统 - 文件解析器实现
// ==========================================
// 职责: 读取单个导出文件,惰性产出原始行（列名 → 原始字符串）
// 支持: 分隔符文本 / 定长文本 / Excel 工作簿
// ==========================================
// 约定:
// - 空行/全空白行跳过
// - 列数不一致的行带 parse_error 标记产出,不抛错
// - 路径不存在/不可读 → ImportError::FileAccess
// - 空文件 → 空序列
// ==========================================

use crate::config::file_type::{FileLayout, FileTypeConfig, FixedWidthColumn};
use crate::importer::decoding::{resolve_encoding, DecodingReader};
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook, Reader, Xlsx};
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use tracing::{debug, warn};

// ==========================================
// RawRow - 原始行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line_number: usize, // 文件内物理行号（1 起）
    pub fields: HashMap<String, String>,
    pub parse_error: Option<String>, // 切分失败时的说明
}

impl RawRow {
    fn is_blank(&self) -> bool {
        self.fields.values().all(|v| v.trim().is_empty())
    }
}

/// 惰性行序列
pub type RawRowIter = Box<dyn Iterator<Item = RawRow>>;

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: DelimitedParser, FixedWidthParser, WorkbookParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 打开文件并返回惰性行序列
    ///
    /// # 返回
    /// - Ok(RawRowIter): 行序列（空文件为空序列）
    /// - Err(FileAccess): 路径不存在或不可读
    fn parse(&self, file_path: &Path, file_type: &FileTypeConfig) -> ImportResult<RawRowIter>;
}

/// 检查路径并打开文件
fn open_regular_file(path: &Path) -> ImportResult<File> {
    let metadata = std::fs::metadata(path).map_err(|e| ImportError::file_access(path, &e))?;
    if !metadata.is_file() {
        return Err(ImportError::FileAccess {
            path: path.display().to_string(),
            message: "不是普通文件".to_string(),
        });
    }
    File::open(path).map_err(|e| ImportError::file_access(path, &e))
}

fn open_decoded(
    path: &Path,
    file_type: &FileTypeConfig,
) -> ImportResult<DecodingReader<BufReader<File>>> {
    let encoding = resolve_encoding(&file_type.encoding)
        .ok_or_else(|| ImportError::UnsupportedEncoding(file_type.encoding.clone()))?;
    let file = open_regular_file(path)?;
    debug!(path = %path.display(), encoding = encoding.name(), "打开导出文件");
    Ok(DecodingReader::new(BufReader::new(file), encoding))
}

/// 规范化表头: TRIM,并去掉末尾空列名（导出工具常带尾随分隔符）
fn normalize_headers(record: &StringRecord) -> Vec<String> {
    let mut headers: Vec<String> = record.iter().map(|h| h.trim().to_string()).collect();
    while headers.last().map(|h| h.is_empty()).unwrap_or(false) {
        headers.pop();
    }
    headers
}

// ==========================================
// DelimitedParser - 分隔符文本
// ==========================================
pub struct DelimitedParser;

impl FileParser for DelimitedParser {
    fn parse(&self, file_path: &Path, file_type: &FileTypeConfig) -> ImportResult<RawRowIter> {
        // 无表头版式: 列名固定,不从文件读取
        let (delimiter, quoting, fixed_columns) = match &file_type.layout {
            FileLayout::Delimited { delimiter, quoting } => (*delimiter, *quoting, None),
            FileLayout::Headerless {
                delimiter,
                columns,
                min_columns,
            } => (*delimiter, false, Some((columns.clone(), *min_columns))),
            _ => {
                return Err(ImportError::UnknownFileType(format!(
                    "{} 不是分隔符版式",
                    file_type.name
                )))
            }
        };

        let reader = open_decoded(file_path, file_type)?;
        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致,由本层标记
            .delimiter(delimiter)
            .quoting(quoting)
            .from_reader(reader)
            .into_records();

        if let Some((headers, min_columns)) = fixed_columns {
            return Ok(Box::new(DelimitedRows {
                headers,
                min_columns,
                records,
                skip_lines: file_type.skip_lines,
                done: false,
            }));
        }

        // 跳过表头之前的行,取表头
        let mut headers: Option<Vec<String>> = None;
        let mut skipped = 0;
        for result in records.by_ref() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    // 表头都读不出来,视为文件不可读
                    return Err(ImportError::FileAccess {
                        path: file_path.display().to_string(),
                        message: e.to_string(),
                    });
                }
            };
            if skipped < file_type.skip_lines {
                skipped += 1;
                continue;
            }
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            headers = Some(normalize_headers(&record));
            break;
        }

        match headers {
            Some(headers) => Ok(Box::new(DelimitedRows {
                min_columns: headers.len(),
                headers,
                records,
                skip_lines: 0,
                done: false,
            })),
            None => {
                debug!(path = %file_path.display(), "文件为空或仅含表头前导行");
                Ok(Box::new(std::iter::empty()))
            }
        }
    }
}

struct DelimitedRows<R: std::io::Read> {
    headers: Vec<String>,
    min_columns: usize, // 少于该列数视为切分失败
    records: StringRecordsIntoIter<R>,
    skip_lines: usize, // 尚未跳过的前导行（仅无表头版式）
    done: bool,
}

impl<R: std::io::Read> DelimitedRows<R> {
    fn to_row(&self, record: &StringRecord) -> RawRow {
        let line_number = record.position().map(|p| p.line() as usize).unwrap_or(0);

        let mut fields = HashMap::with_capacity(self.headers.len());
        for (idx, header) in self.headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            if let Some(value) = record.get(idx) {
                fields.insert(header.clone(), value.trim().to_string());
            }
        }

        // 多出的列只要为空就容忍（尾随分隔符）
        let extra_non_empty = record
            .iter()
            .skip(self.headers.len())
            .any(|v| !v.trim().is_empty());
        let parse_error = if record.len() < self.min_columns || extra_non_empty {
            Some(format!(
                "列数不一致: 期望 {}, 实际 {}",
                self.headers.len(),
                record.len()
            ))
        } else {
            None
        };

        RawRow {
            line_number,
            fields,
            parse_error,
        }
    }
}

impl<R: std::io::Read> Iterator for DelimitedRows<R> {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        if self.done {
            return None;
        }

        loop {
            match self.records.next()? {
                Ok(record) => {
                    if self.skip_lines > 0 {
                        self.skip_lines -= 1;
                        continue;
                    }
                    let row = self.to_row(&record);
                    if row.parse_error.is_none() && row.is_blank() {
                        continue;
                    }
                    if row.parse_error.is_some() && record.iter().all(|v| v.trim().is_empty()) {
                        continue;
                    }
                    return Some(row);
                }
                Err(e) => {
                    let line_number = e.position().map(|p| p.line() as usize).unwrap_or(0);
                    if e.is_io_error() {
                        // io 错误后读取器状态不可信,结束序列
                        warn!(line = line_number, error = %e, "读取中断");
                        self.done = true;
                    }
                    return Some(RawRow {
                        line_number,
                        fields: HashMap::new(),
                        parse_error: Some(e.to_string()),
                    });
                }
            }
        }
    }
}

// ==========================================
// FixedWidthParser - 定长文本
// ==========================================
pub struct FixedWidthParser;

impl FileParser for FixedWidthParser {
    fn parse(&self, file_path: &Path, file_type: &FileTypeConfig) -> ImportResult<RawRowIter> {
        let FileLayout::FixedWidth { columns } = &file_type.layout else {
            return Err(ImportError::UnknownFileType(format!(
                "{} 不是定长版式",
                file_type.name
            )));
        };

        let reader = open_decoded(file_path, file_type)?;
        Ok(Box::new(FixedWidthRows {
            columns: columns.clone(),
            lines: BufReader::new(reader).lines(),
            line_number: 0,
            skip_lines: file_type.skip_lines,
            done: false,
        }))
    }
}

struct FixedWidthRows<B: BufRead> {
    columns: Vec<FixedWidthColumn>,
    lines: Lines<B>,
    line_number: usize,
    skip_lines: usize,
    done: bool,
}

impl<B: BufRead> FixedWidthRows<B> {
    fn to_row(&self, line: &str) -> RawRow {
        let chars: Vec<char> = line.trim_end_matches('\r').chars().collect();

        let mut fields = HashMap::with_capacity(self.columns.len());
        for column in &self.columns {
            let start = column.start.min(chars.len());
            let end = column.end().min(chars.len());
            let value: String = chars[start..end].iter().collect();
            fields.insert(column.name.clone(), value.trim().to_string());
        }

        // 末列起点之前就结束的行视为列数不足
        let required = self.columns.iter().map(|c| c.start).max().unwrap_or(0);
        let parse_error = if !self.columns.is_empty() && chars.len() <= required {
            Some(format!("行长度不足: 需要超过 {} 字符, 实际 {}", required, chars.len()))
        } else {
            None
        };

        RawRow {
            line_number: self.line_number,
            fields,
            parse_error,
        }
    }
}

impl<B: BufRead> Iterator for FixedWidthRows<B> {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    warn!(line = self.line_number + 1, error = %e, "读取中断");
                    self.done = true;
                    return Some(RawRow {
                        line_number: self.line_number + 1,
                        fields: HashMap::new(),
                        parse_error: Some(e.to_string()),
                    });
                }
            };
            self.line_number += 1;

            if self.line_number <= self.skip_lines || line.trim().is_empty() {
                continue;
            }
            return Some(self.to_row(&line));
        }
    }
}

// ==========================================
// WorkbookParser - Excel 工作簿
// ==========================================
// 说明: calamine 需整表加载,此版式非流式
pub struct WorkbookParser;

impl FileParser for WorkbookParser {
    fn parse(&self, file_path: &Path, file_type: &FileTypeConfig) -> ImportResult<RawRowIter> {
        // 先做访问检查,与文本版式的错误语义保持一致
        drop(open_regular_file(file_path)?);

        let mut workbook: Xlsx<_> = open_workbook(file_path)
            .map_err(|e: calamine::XlsxError| ImportError::ExcelParseError(e.to_string()))?;

        let sheet_names = workbook.sheet_names();
        let Some(sheet_name) = sheet_names.first().cloned() else {
            return Ok(Box::new(std::iter::empty()));
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        // Range 从第一个非空单元格开始; 行号换算为工作表绝对行号（1 起）
        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let mut rows = range.rows().enumerate().skip(file_type.skip_lines);
        let headers: Vec<String> = match rows.next() {
            Some((_, header_row)) => header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            None => return Ok(Box::new(std::iter::empty())),
        };

        let mut out = Vec::new();
        for (idx, data_row) in rows {
            let mut fields = HashMap::new();
            for (col_idx, cell) in data_row.iter().enumerate() {
                if let Some(header) = headers.get(col_idx).filter(|h| !h.is_empty()) {
                    fields.insert(header.clone(), cell.to_string().trim().to_string());
                }
            }

            let row = RawRow {
                line_number: first_row + idx + 1,
                fields,
                parse_error: None,
            };
            if row.is_blank() {
                continue;
            }
            out.push(row);
        }

        Ok(Box::new(out.into_iter()))
    }
}

// ==========================================
// 通用文件解析器（按声明版式分派）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse(&self, file_path: &Path, file_type: &FileTypeConfig) -> ImportResult<RawRowIter> {
        match file_type.layout {
            FileLayout::Delimited { .. } | FileLayout::Headerless { .. } => {
                DelimitedParser.parse(file_path, file_type)
            }
            FileLayout::FixedWidth { .. } => FixedWidthParser.parse(file_path, file_type),
            FileLayout::Workbook => WorkbookParser.parse(file_path, file_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn tsv_utf8() -> FileTypeConfig {
        FileTypeConfig::delimited("TEST_TSV", "utf-8", b'\t', false)
    }

    fn write_temp(bytes: &[u8]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(bytes).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_delimited_valid_file() {
        let temp_file = write_temp("指図番号\t品目コード\nORD001\tITEM001\nORD002\tITEM002\n".as_bytes());

        let rows: Vec<RawRow> = UniversalFileParser
            .parse(temp_file.path(), &tsv_utf8())
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields.get("指図番号"), Some(&"ORD001".to_string()));
        assert_eq!(rows[0].line_number, 2);
        assert_eq!(rows[1].fields.get("品目コード"), Some(&"ITEM002".to_string()));
        assert!(rows.iter().all(|r| r.parse_error.is_none()));
    }

    #[test]
    fn test_delimited_shift_jis() {
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode("指図番号\t品目テキスト\nORD001\t部品Ａ\n");
        let temp_file = write_temp(&encoded);
        let config = FileTypeConfig::delimited("SJIS", "shift_jis", b'\t', false);

        let rows: Vec<RawRow> = DelimitedParser
            .parse(temp_file.path(), &config)
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields.get("品目テキスト"), Some(&"部品Ａ".to_string()));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let temp_file = write_temp(b"a\tb\n1\t2\n\n\t\n3\t4\n\n\n");

        let rows: Vec<RawRow> = UniversalFileParser
            .parse(temp_file.path(), &tsv_utf8())
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_inconsistent_columns_marked_not_raised() {
        let temp_file = write_temp(b"a\tb\tc\n1\t2\t3\n4\t5\n6\t7\t8\t9\n");

        let rows: Vec<RawRow> = UniversalFileParser
            .parse(temp_file.path(), &tsv_utf8())
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].parse_error.is_none());
        assert!(rows[1].parse_error.is_some());
        assert!(rows[2].parse_error.is_some());
    }

    #[test]
    fn test_trailing_delimiter_tolerated() {
        let temp_file = write_temp(b"a\tb\t\n1\t2\t\n");

        let rows: Vec<RawRow> = UniversalFileParser
            .parse(temp_file.path(), &tsv_utf8())
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].parse_error.is_none());
    }

    #[test]
    fn test_quotes_are_literal_when_quoting_disabled() {
        let temp_file = write_temp(b"a\tb\n\"1/2\" pipe\t2\n");

        let rows: Vec<RawRow> = UniversalFileParser
            .parse(temp_file.path(), &tsv_utf8())
            .unwrap()
            .collect();

        assert_eq!(rows[0].fields.get("a"), Some(&"\"1/2\" pipe".to_string()));
    }

    #[test]
    fn test_skip_lines_before_header() {
        let temp_file = write_temp(b"report title\nprinted 2025-09-01\na\tb\n1\t2\n");
        let config = tsv_utf8().with_skip_lines(2);

        let rows: Vec<RawRow> = UniversalFileParser
            .parse(temp_file.path(), &config)
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields.get("a"), Some(&"1".to_string()));
    }

    #[test]
    fn test_empty_file_yields_empty_sequence() {
        let temp_file = write_temp(b"");
        let rows: Vec<RawRow> = UniversalFileParser
            .parse(temp_file.path(), &tsv_utf8())
            .unwrap()
            .collect();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_file_not_found_is_file_access_error() {
        let result = UniversalFileParser.parse(Path::new("non_existent.txt"), &tsv_utf8());
        assert!(matches!(result, Err(ImportError::FileAccess { .. })));
    }

    #[test]
    fn test_directory_is_file_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = UniversalFileParser.parse(dir.path(), &tsv_utf8());
        assert!(matches!(result, Err(ImportError::FileAccess { .. })));
    }

    #[test]
    fn test_unknown_encoding() {
        let temp_file = write_temp(b"a\n1\n");
        let config = FileTypeConfig::delimited("X", "klingon", b'\t', false);
        let result = UniversalFileParser.parse(temp_file.path(), &config);
        assert!(matches!(result, Err(ImportError::UnsupportedEncoding(_))));
    }

    #[test]
    fn test_fixed_width_layout() {
        let temp_file = write_temp("HEADER LINE\nORD001  ITEM01  10\nORD002  ITEM02    \n\nORD003\n".as_bytes());
        let config = FileTypeConfig::fixed_width(
            "FIXED",
            "utf-8",
            vec![
                FixedWidthColumn::new("order", 0, 8),
                FixedWidthColumn::new("item", 8, 8),
                FixedWidthColumn::new("qty", 16, 4),
            ],
        )
        .with_skip_lines(1);

        let rows: Vec<RawRow> = UniversalFileParser
            .parse(temp_file.path(), &config)
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].fields.get("order"), Some(&"ORD001".to_string()));
        assert_eq!(rows[0].fields.get("qty"), Some(&"10".to_string()));
        assert_eq!(rows[0].line_number, 2);
        assert!(rows[1].parse_error.is_none());
        assert_eq!(rows[1].fields.get("qty"), Some(&"".to_string()));
        assert!(rows[2].parse_error.is_some());
        assert_eq!(rows[2].line_number, 5);
    }

    fn workbook_fixture() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/kansei_jisseki_export.xlsx")
    }

    #[test]
    fn test_headerless_layout_positional_columns() {
        let temp_file = write_temp(
            "title\nskip\nskip\nA\tB\tC\n\
             x1\ty1\tz1\n\
             x2\ty2\n\
             x3\n"
                .as_bytes(),
        );
        let config =
            FileTypeConfig::headerless("POS", "utf-8", b'\t', &["a", "b", "c"], 2).with_skip_lines(4);

        let rows: Vec<RawRow> = UniversalFileParser
            .parse(temp_file.path(), &config)
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].fields.get("c"), Some(&"z1".to_string()));
        assert_eq!(rows[0].line_number, 5);
        // 末列可缺省
        assert!(rows[1].parse_error.is_none());
        assert!(!rows[1].fields.contains_key("c"));
        // 少于最少列数
        assert!(rows[2].parse_error.is_some());
    }

    #[test]
    fn test_workbook_layout_with_skip_lines() {
        let config = FileTypeConfig::workbook("KANSEI_JISSEKI_XLSX").with_skip_lines(2);
        let rows: Vec<RawRow> = UniversalFileParser
            .parse(&workbook_fixture(), &config)
            .unwrap()
            .collect();

        // 第 5 行为空行,跳过
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line_number, 4);
        assert_eq!(rows[1].line_number, 6);
        assert!(rows.iter().all(|r| r.parse_error.is_none()));

        assert_eq!(rows[0].fields.get("品目コード"), Some(&"ITEM001".to_string()));
        assert_eq!(rows[0].fields.get("品目テキスト"), Some(&"部品A".to_string()));
        assert_eq!(rows[0].fields.get("指図数量"), Some(&"100".to_string()));
        assert_eq!(rows[1].fields.get("実績数量"), Some(&"-5".to_string()));
        assert_eq!(rows[1].fields.get("入力日時"), Some(&"2025/08/22 09:30".to_string()));
    }

    #[test]
    fn test_workbook_without_skip_uses_title_as_header() {
        let config = FileTypeConfig::workbook("RAW_XLSX");
        let rows: Vec<RawRow> = UniversalFileParser
            .parse(&workbook_fixture(), &config)
            .unwrap()
            .collect();

        assert!(rows[0].fields.contains_key("生産実績エクスポート"));
        assert!(!rows.iter().any(|r| r.fields.contains_key("品目コード")));
    }

    #[test]
    fn test_workbook_missing_file_is_file_access_error() {
        let config = FileTypeConfig::workbook("X");
        let result = UniversalFileParser.parse(Path::new("missing.xlsx"), &config);
        assert!(matches!(result, Err(ImportError::FileAccess { .. })));
    }
}
