// ==========================================
// Excel 导入测试
// ==========================================
// 覆盖: xlsx 解析（表头清洗 / 日期序列号 / 空行）→ 导入管道
// 说明: 工作簿在测试内按 OOXML 最小结构生成
// ==========================================


use marketplace_ledger_import::domain::{CellValue, ImportType, RunStatus};
use marketplace_ledger_import::importer::value_coercion::parse_date;
use marketplace_ledger_import::importer::{ExcelParser, FileParser, NoopProgress};
use marketplace_ledger_import::{ImportApi, ImportRequest};
use chrono::NaiveDate;
use std::io::Write;
use tempfile::NamedTempFile;
use test_helpers::create_test_db;
use zip::write::FileOptions;
use zip::CompressionMethod;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Размещение" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

/// 表头带 BOM / 零宽字符；日期为数值序列号；第 3 行为空
const SHEET: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>\
<row r=\"1\">\
<c r=\"A1\" t=\"inlineStr\"><is><t>\u{FEFF}Дата</t></is></c>\
<c r=\"B1\" t=\"inlineStr\"><is><t>Артикул\u{200B}</t></is></c>\
<c r=\"C1\" t=\"inlineStr\"><is><t>Начисленная стоимость размещения</t></is></c>\
</row>\
<row r=\"2\">\
<c r=\"A2\"><v>45717</v></c>\
<c r=\"B2\" t=\"inlineStr\"><is><t>ART-1</t></is></c>\
<c r=\"C2\"><v>12.4</v></c>\
</row>\
<row r=\"4\">\
<c r=\"A4\"><v>45718</v></c>\
<c r=\"B4\" t=\"inlineStr\"><is><t>ART-2</t></is></c>\
<c r=\"C4\"><v>3</v></c>\
</row>\
</sheetData></worksheet>";

fn storage_workbook() -> NamedTempFile {
    let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    let mut zip = zip::ZipWriter::new(file.reopen().unwrap());
    let options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", SHEET),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    file
}

#[test]
fn test_excel_parser_reads_workbook() {
    let file = storage_workbook();

    let sheet = ExcelParser.parse(file.path()).unwrap();

    assert_eq!(
        sheet.headers,
        vec!["Дата", "Артикул", "Начисленная стоимость размещения"]
    );
    assert_eq!(sheet.row_count(), 2);
    assert_eq!(sheet.lines, vec![2, 4]);
    assert_eq!(sheet.rows[0][0], CellValue::Number(45717.0));
    assert_eq!(sheet.rows[1][1], CellValue::Text("ART-2".to_string()));
}

#[test]
fn test_excel_serial_date_reaches_transformer_as_number() {
    let file = storage_workbook();
    let sheet = ExcelParser.parse(file.path()).unwrap();

    let rows: Vec<_> = sheet.into_raw_rows(ImportType::StorageCost).collect();
    let cell = rows[0].get("Дата").unwrap();

    assert!(matches!(cell, CellValue::Number(_)));
    assert_eq!(parse_date(Some(cell), None), NaiveDate::from_ymd_opt(2025, 3, 1));
}

#[tokio::test]
async fn test_xlsx_import_end_to_end() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let api = ImportApi::open(&db_path).unwrap();
    let file = storage_workbook();
    let request = ImportRequest {
        import_type: ImportType::StorageCost,
        marketplace_id: "mp-1".to_string(),
        period_start: None,
        period_end: None,
        strict_headers: false,
    };

    let response = api
        .import_file(file.path(), request, &NoopProgress)
        .await
        .unwrap();

    assert_eq!(response.summary.status, RunStatus::Completed);
    assert_eq!(response.summary.total_rows, 2);
    assert_eq!(response.summary.success_count, 2);
    assert_eq!(response.summary.failed_count, 0);
}
