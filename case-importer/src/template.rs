//! Blank intake workbook generation

use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::config::SheetLayout;

const SHEET_NAME: &str = "Intake";
const TIMESTAMP_FORMAT: &str = "yyyy-mm-dd hh:mm";
const DATE_FORMAT: &str = "yyyy-mm-dd";

fn field_label(field: &str) -> &'static str {
    match field {
        "third_party_reference_1" => "Reference 1",
        "third_party_reference_2" => "Reference 2",
        "last_name" => "Last Name",
        "first_name" => "First Name",
        "date_of_birth" => "Date of Birth",
        "post_code" => "Post Code",
        _ => "",
    }
}

fn column(col: u32) -> Result<u16> {
    u16::try_from(col).with_context(|| format!("Column {} is out of range for xlsx", col))
}

/// Write a blank intake workbook laid out for `layout`
pub fn write_template(path: &Path, layout: &SheetLayout) -> Result<()> {
    let mut workbook = build_template(layout)?;
    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
    log::info!("Template written to: {}", path.display());
    Ok(())
}

/// Template workbook with a single sheet of labels
pub fn build_template(layout: &SheetLayout) -> Result<Workbook> {
    layout.validate()?;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    write_labels(sheet, layout)?;
    Ok(workbook)
}

fn write_labels(sheet: &mut Worksheet, layout: &SheetLayout) -> Result<()> {
    let title_format = Format::new().set_bold().set_font_size(14);
    let label_format = Format::new().set_bold();
    let timestamp_format = Format::new().set_num_format(TIMESTAMP_FORMAT);
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    sheet.write_string_with_format(0, 0, "Case Intake", &title_format)?;

    let header = layout.header_timestamp;
    let header_col = column(header.col)?;
    if header_col > 0 {
        sheet.write_string_with_format(header.row, header_col - 1, "Submitted", &label_format)?;
    }
    sheet.write_blank(header.row, header_col, &timestamp_format)?;

    if let Some(label_row) = layout.data_start_row.checked_sub(1) {
        if label_row != header.row {
            for (field, col) in layout.columns.entries() {
                sheet.write_string_with_format(
                    label_row,
                    column(col)?,
                    field_label(field),
                    &label_format,
                )?;
            }
        }
    }

    for (field, col) in layout.columns.entries() {
        sheet.set_column_width(column(col)?, 18)?;
        if field == "date_of_birth" {
            sheet.set_column_format(column(col)?, &date_format)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordDefaults;
    use crate::config::repository::{SqliteCaseRepository, list_cases, memory_pool};
    use crate::intake::workbook::styles::with_1904_date_system;
    use crate::intake::{CalamineWorkbook, WorkbookSource, Worksheet as _};
    use crate::services::{BatchReport, IngestionService, stage_workbook};
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_xlsxwriter::Formula;
    use std::path::PathBuf;

    fn temp_xlsx() -> PathBuf {
        std::env::temp_dir().join(format!("case-importer-{}.xlsx", uuid::Uuid::new_v4()))
    }

    fn submitted() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    /// Save `bytes` as an xlsx file and stage it with the default layout
    fn stage_bytes(bytes: Vec<u8>) -> BatchReport {
        let path = temp_xlsx();
        std::fs::write(&path, bytes).unwrap();
        let workbook = CalamineWorkbook::open(&path).unwrap();
        let report =
            stage_workbook(workbook, &SheetLayout::default(), &RecordDefaults::default()).unwrap();
        std::fs::remove_file(&path).ok();
        report
    }

    /// Filled template rendered to bytes by `fill`
    fn template_bytes(fill: impl FnOnce(&mut Worksheet) -> Result<()>) -> Vec<u8> {
        let mut workbook = build_template(&SheetLayout::default()).unwrap();
        fill(workbook.worksheet_from_index(0).unwrap()).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    /// Template filled with two records, a blank row and a stray row
    fn write_filled(path: &Path) -> Result<()> {
        let layout = SheetLayout::default();
        let mut workbook = build_template(&layout)?;
        let sheet = workbook.worksheet_from_index(0)?;

        let timestamp_format = Format::new().set_num_format(TIMESTAMP_FORMAT);
        let dob_format = Format::new().set_num_format("dd/mm/yyyy");

        // 2024-03-01 09:00
        sheet.write_number_with_format(5, 3, 45352.375, &timestamp_format)?;

        sheet.write_string(9, 1, "  REF-001 ")?;
        sheet.write_number(9, 2, 778812.0)?;
        sheet.write_string(9, 3, "Smith")?;
        sheet.write_string(9, 4, "Jane")?;
        sheet.write_number_with_format(9, 5, 33007.0, &dob_format)?;
        sheet.write_string(9, 6, "SW1A 1AA")?;

        sheet.write_string(10, 1, "REF-002")?;
        sheet.write_string(10, 3, "Jones")?;
        // Date of birth stored without a date format
        sheet.write_number(10, 5, 33007.0)?;

        sheet.write_string(12, 1, "REF-STRAY")?;
        sheet.write_string(12, 3, "Stray")?;

        workbook.save(path)?;
        Ok(())
    }

    #[test]
    fn test_template_labels() {
        let path = temp_xlsx();
        write_template(&path, &SheetLayout::default()).unwrap();

        let mut workbook = CalamineWorkbook::open(&path).unwrap();
        let sheet = workbook.first_sheet().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(sheet.name(), SHEET_NAME);
        let label = |row: u32, col: u32| match sheet.cell(row, col).map(|c| c.content) {
            Some(crate::intake::CellContent::Text(s)) => s,
            other => panic!("expected text at ({}, {}), got {:?}", row, col, other),
        };
        assert_eq!(label(5, 2), "Submitted");
        assert_eq!(label(8, 1), "Reference 1");
        assert_eq!(label(8, 6), "Post Code");
        assert!(!sheet.has_row(9) || sheet.cell(9, 1).is_none());
    }

    #[test]
    fn test_blank_template_stages_nothing() {
        let path = temp_xlsx();
        write_template(&path, &SheetLayout::default()).unwrap();

        let workbook = CalamineWorkbook::open(&path).unwrap();
        let report = crate::services::stage_workbook(
            workbook,
            &SheetLayout::default(),
            &RecordDefaults::default(),
        )
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert!(report.batch.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_out_of_range_column_is_rejected() {
        let mut layout = SheetLayout::default();
        layout.header_timestamp.col = 70_000;
        assert!(build_template(&layout).is_err());
    }

    #[tokio::test]
    async fn test_ingest_written_workbook() {
        let path = temp_xlsx();
        write_filled(&path).unwrap();

        let repo = SqliteCaseRepository::new(memory_pool().await);
        let service =
            IngestionService::new(repo, SheetLayout::default(), RecordDefaults::default());
        let workbook = CalamineWorkbook::open(&path).unwrap();
        let outcome = service.ingest(workbook).await.unwrap();
        std::fs::remove_file(&path).ok();

        let submitted = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(outcome.committed, 2);
        assert_eq!(outcome.submitted_at, submitted);
        assert!(outcome.warnings.is_empty());

        let mut cases = list_cases(service.repository().pool(), 10).await.unwrap();
        cases.reverse();
        assert_eq!(cases.len(), 2);

        let first = &cases[0];
        assert_eq!(first.third_party_reference_1.as_deref(), Some("REF-001"));
        assert_eq!(first.third_party_reference_2.as_deref(), Some("778812"));
        assert_eq!(first.last_name.as_deref(), Some("Smith"));
        assert_eq!(first.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 14));
        assert_eq!(first.submitted_at, submitted);

        let second = &cases[1];
        assert_eq!(second.last_name.as_deref(), Some("Jones"));
        assert_eq!(second.first_name, None);
        assert_eq!(second.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 14));
    }

    #[test]
    fn test_number_formats_survive_staging() {
        let bytes = template_bytes(|sheet| {
            sheet.write_number_with_format(
                5,
                3,
                45352.375,
                &Format::new().set_num_format(TIMESTAMP_FORMAT),
            )?;
            sheet.write_number_with_format(9, 1, 42, &Format::new().set_num_format("00000"))?;
            sheet.write_number_with_format(
                9,
                2,
                1234567,
                &Format::new().set_num_format("#,##0"),
            )?;
            sheet.write_string(9, 3, "Smith")?;
            Ok(())
        });

        let report = stage_bytes(bytes);
        assert_eq!(report.batch.len(), 1);
        let record = &report.batch.records[0].record;
        assert_eq!(record.third_party_reference_1.as_deref(), Some("00042"));
        assert_eq!(record.third_party_reference_2.as_deref(), Some("1,234,567"));
    }

    #[test]
    fn test_formula_header_and_date_formula() {
        let bytes = template_bytes(|sheet| {
            sheet.write_formula_with_format(
                5,
                3,
                Formula::new("=DATE(2024,3,1)+TIME(9,0,0)").set_result("45352.375"),
                &Format::new().set_num_format(TIMESTAMP_FORMAT),
            )?;
            sheet.write_string(9, 3, "Smith")?;
            sheet.write_formula_with_format(
                9,
                5,
                Formula::new("=DATE(1990,5,14)").set_result("33007"),
                &Format::new().set_num_format(DATE_FORMAT),
            )?;
            Ok(())
        });

        let report = stage_bytes(bytes);
        assert!(report.warnings.is_empty());
        assert_eq!(report.batch.submitted_at, submitted());
        assert_eq!(
            report.batch.records[0].record.date_of_birth,
            NaiveDate::from_ymd_opt(1990, 5, 14)
        );
    }

    #[test]
    fn test_1904_workbook_dates() {
        let bytes = template_bytes(|sheet| {
            sheet.write_number_with_format(
                5,
                3,
                45352.375 - 1462.0,
                &Format::new().set_num_format(TIMESTAMP_FORMAT),
            )?;
            sheet.write_string(9, 3, "Smith")?;
            sheet.write_number_with_format(
                9,
                5,
                31545,
                &Format::new().set_num_format(DATE_FORMAT),
            )?;
            sheet.write_string(10, 3, "Jones")?;
            // Unformatted serial in the same workbook
            sheet.write_number(10, 5, 31545)?;
            Ok(())
        });

        let report = stage_bytes(with_1904_date_system(&bytes));
        assert_eq!(report.batch.submitted_at, submitted());
        let dobs: Vec<_> = report
            .batch
            .records
            .iter()
            .map(|r| r.record.date_of_birth)
            .collect();
        let dob = NaiveDate::from_ymd_opt(1990, 5, 14);
        assert_eq!(dobs, vec![dob, dob]);
    }

    #[test]
    fn test_missing_file_is_invalid_format() {
        let err = CalamineWorkbook::open(temp_xlsx()).err().unwrap();
        assert!(matches!(err, crate::intake::IngestError::InvalidFormat { .. }));
    }
}
