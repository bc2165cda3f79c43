// ==========================================
// 账单导入管道 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 约定: 首个工作表，首行为表头；完全空白的数据行跳过
// ==========================================

use crate::domain::ledger::{CellValue, RawRow};
use crate::domain::types::ImportType;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::header_normalizer::{canonical_header, clean_header};
use crate::importer::ledger_importer_trait::FileParser;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

// ==========================================
// ParsedSheet - 解析结果
// ==========================================
// 行以列序存放，转换前再按表头组装为 RawRow
// lines[i] 为 rows[i] 在源文件中的行号（表头为第 1 行，跳过的空行仍占行号）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub lines: Vec<usize>,
}

impl ParsedSheet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 逐行组装 RawRow；与模板一致的表头统一为模板原文
    pub fn into_raw_rows(
        self,
        import_type: ImportType,
    ) -> impl ExactSizeIterator<Item = RawRow> + Send {
        let keys: Vec<String> = self
            .headers
            .iter()
            .map(|h| canonical_header(import_type, h))
            .collect();

        self.rows.into_iter().map(move |cells| {
            keys.iter()
                .zip(cells)
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, cell)| (key.clone(), cell))
                .collect::<RawRow>()
        })
    }

    fn push_row(&mut self, line: usize, cells: Vec<CellValue>) {
        if cells.iter().all(|c| c.is_blank()) {
            return;
        }
        self.rows.push(cells);
        self.lines.push(line);
    }
}

fn check_file(path: &Path, allowed: &[&str]) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !allowed.contains(&ext.as_str()) {
        return Err(ImportError::UnsupportedFormat(ext));
    }
    Ok(())
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedSheet> {
        check_file(file_path, &["csv"])?;

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut sheet = ParsedSheet {
            headers: reader.headers()?.iter().map(clean_header).collect(),
            ..ParsedSheet::default()
        };

        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);
            sheet.push_row(line, record.iter().map(CellValue::from).collect());
        }

        Ok(sheet)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

/// calamine 单元格 → CellValue（日期保留为序列号）
fn excel_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from(s.as_str()),
        Data::Error(_) => CellValue::Empty,
    }
}

impl FileParser for ExcelParser {
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedSheet> {
        check_file(file_path, &["xlsx", "xls"])?;

        let mut workbook = open_workbook_auto(file_path)?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        // 区域从首个非空单元格所在行开始
        let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
        let mut rows = range.rows();
        let header_row = match rows.next() {
            Some(row) => row,
            None => return Ok(ParsedSheet::default()),
        };

        let mut sheet = ParsedSheet {
            headers: header_row
                .iter()
                .map(|cell| clean_header(&cell.to_string()))
                .collect(),
            ..ParsedSheet::default()
        };

        for (offset, data_row) in rows.enumerate() {
            sheet.push_row(first_line + 1 + offset, data_row.iter().map(excel_cell).collect());
        }

        Ok(sheet)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedSheet> {
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser.parse(file_path),
            "xlsx" | "xls" => ExcelParser.parse(file_path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_csv_parser_valid_file() {
        let file = csv_file(&[
            "\u{FEFF}Дата,Артикул,Начисленная стоимость размещения",
            "01.03.2025,ART-1,\"12,5\"",
            "02.03.2025,ART-2,3",
        ]);

        let sheet = CsvParser.parse(file.path()).unwrap();
        assert_eq!(sheet.headers[0], "Дата");
        assert_eq!(sheet.row_count(), 2);

        let rows: Vec<RawRow> = sheet.into_raw_rows(ImportType::StorageCost).collect();
        assert_eq!(rows[0].get("Артикул"), Some(&CellValue::from("ART-1")));
        assert_eq!(
            rows[0].get("Начисленная стоимость размещения"),
            Some(&CellValue::from("12,5"))
        );
    }

    #[test]
    fn test_csv_headers_mapped_to_template() {
        let file = csv_file(&["дата,  артикул  ", "01.03.2025,ART-1"]);
        let rows: Vec<RawRow> = CsvParser
            .parse(file.path())
            .unwrap()
            .into_raw_rows(ImportType::StorageCost)
            .collect();
        assert!(rows[0].contains_key("Дата"));
        assert!(rows[0].contains_key("Артикул"));
    }

    #[test]
    fn test_csv_parser_skip_empty_rows() {
        let file = csv_file(&["Дата,Артикул", "01.03.2025,ART-1", ",", "02.03.2025,ART-2"]);
        let sheet = CsvParser.parse(file.path()).unwrap();
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.lines, vec![2, 4]);
    }

    #[test]
    fn test_file_not_found() {
        let err = CsvParser.parse(Path::new("non_existent.csv")).unwrap_err();
        assert!(matches!(err, ImportError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = UniversalFileParser
            .parse(Path::new("report.pdf"))
            .unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_excel_cell_mapping() {
        assert_eq!(excel_cell(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(excel_cell(&Data::String(String::new())), CellValue::Empty);
        assert_eq!(excel_cell(&Data::Float(45677.0)), CellValue::Number(45677.0));
    }
}
