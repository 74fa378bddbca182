//! calamine-backed workbook decoder
//!
//! calamine reads xlsx/xlsm/xlsb/xls/ods containers. Values and formulas are
//! exposed as two parallel ranges; a cell with formula text is presented as a
//! formula cell whose evaluated result is the value cached in the file.
//! calamine flags date/time formatted numbers as `Data::DateTime`. Other
//! number format codes and the 1904 flag of xlsx packages come from
//! [`styles`](super::styles); other containers fall back to General display
//! and infer the date system from their date cells.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use calamine::{
    Data, ExcelDateTime, ExcelDateTimeType, Range, Reader, Sheets, open_workbook_auto,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::styles::{SheetStyles, is_xlsx_package, read_sheet_styles};
use super::{Cell, CellContent, CellValue, EvaluationError, Numeric, Worksheet, WorkbookSource};
use crate::intake::error::IngestError;
use crate::intake::resolve::DateSystem;

/// An opened workbook file
pub struct CalamineWorkbook {
    path: PathBuf,
    workbook: Sheets<BufReader<File>>,
}

impl CalamineWorkbook {
    /// Open a workbook, detecting the container format from the extension
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let workbook = open_workbook_auto(path).map_err(|e| IngestError::InvalidFormat {
            reason: format!("failed to open workbook {}: {}", path.display(), e),
        })?;

        log::debug!("Opened workbook {}", path.display());
        Ok(CalamineWorkbook {
            path: path.to_path_buf(),
            workbook,
        })
    }

    fn package_styles(&self) -> Option<SheetStyles> {
        if !is_xlsx_package(&self.path) {
            return None;
        }
        match read_sheet_styles(&self.path) {
            Ok(styles) => {
                log::debug!(
                    "{}: {} formatted cells, {:?} date system",
                    self.path.display(),
                    styles.formatted_cells(),
                    styles.date_system
                );
                Some(styles)
            }
            Err(e) => {
                log::debug!(
                    "Number formats unavailable for {}, using General: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

impl WorkbookSource for CalamineWorkbook {
    type Sheet = CalamineSheet;

    fn first_sheet(&mut self) -> Result<CalamineSheet, IngestError> {
        let sheet_name = self
            .workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| IngestError::InvalidFormat {
                reason: "workbook does not contain any sheets".to_string(),
            })?;

        let values = self
            .workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| IngestError::InvalidFormat {
                reason: format!("failed to read sheet '{}': {}", sheet_name, e),
            })?;

        // Not every container exposes formulas; treat those as formula-free
        let formulas = match self.workbook.worksheet_formula(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                log::debug!("No formulas available for sheet '{}': {}", sheet_name, e);
                Range::empty()
            }
        };

        let styles = self
            .package_styles()
            .unwrap_or_else(|| SheetStyles::with_date_system(detect_date_system(&values)));

        Ok(CalamineSheet::new(sheet_name, values, formulas).with_styles(styles))
    }
}

/// First worksheet of a calamine workbook
pub struct CalamineSheet {
    name: String,
    values: Range<Data>,
    formulas: Range<String>,
    styles: SheetStyles,
}

impl CalamineSheet {
    pub fn new(name: impl Into<String>, values: Range<Data>, formulas: Range<String>) -> Self {
        CalamineSheet {
            name: name.into(),
            values,
            formulas,
            styles: SheetStyles::default(),
        }
    }

    pub fn with_styles(mut self, styles: SheetStyles) -> Self {
        self.styles = styles;
        self
    }

    fn formula_at(&self, row: u32, col: u32) -> Option<&str> {
        self.formulas
            .get_value((row, col))
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
    }

    fn value_at(&self, row: u32, col: u32) -> Option<CellValue> {
        let data = self.values.get_value((row, col))?;
        Some(data_to_value(data, self.styles.format_code(row, col)))
    }
}

fn row_in(start: Option<(u32, u32)>, end: Option<(u32, u32)>, row: u32) -> bool {
    match (start, end) {
        (Some((first, _)), Some((last, _))) => row >= first && row <= last,
        _ => false,
    }
}

/// Map a calamine value onto the primitive cell kinds
fn data_to_value(data: &Data, format: Option<&Arc<str>>) -> CellValue {
    let number = |value: f64| match format {
        Some(code) => Numeric::formatted(value, Arc::clone(code)),
        None => Numeric::plain(value),
    };

    match data {
        Data::Empty => CellValue::Blank,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Numeric(number(*f)),
        Data::Int(i) => CellValue::Numeric(number(*i as f64)),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => CellValue::Numeric(Numeric::date(dt.as_f64())),
        Data::DateTimeIso(s) => match parse_iso_datetime(s) {
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::Text(s.clone()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

/// ISO 8601 date or date-time as written by ods; a bare date is midnight
fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    s.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| s.parse::<NaiveDate>().ok().map(|d| d.and_time(NaiveTime::MIN)))
}

/// Date system of a workbook whose container does not state it directly
///
/// calamine converts its own date cells with the workbook's epoch, so the
/// first one shows which system is in use. Sheets without date cells count
/// as 1900.
fn detect_date_system(values: &Range<Data>) -> DateSystem {
    values
        .used_cells()
        .find_map(|(_, _, data)| match data {
            Data::DateTime(dt) if dt.is_datetime() => {
                let as_1900 =
                    ExcelDateTime::new(dt.as_f64(), ExcelDateTimeType::DateTime, false).as_datetime();
                Some(if dt.as_datetime() == as_1900 {
                    DateSystem::V1900
                } else {
                    DateSystem::V1904
                })
            }
            _ => None,
        })
        .unwrap_or_default()
}

impl Worksheet for CalamineSheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_row(&self, row: u32) -> bool {
        row_in(self.values.start(), self.values.end(), row)
            || row_in(self.formulas.start(), self.formulas.end(), row)
    }

    fn cell(&self, row: u32, col: u32) -> Option<Cell> {
        if let Some(formula) = self.formula_at(row, col) {
            return Some(Cell::new(row, col, CellContent::Formula(formula.to_string())));
        }

        let content = match self.value_at(row, col)? {
            CellValue::Blank => CellContent::Blank,
            CellValue::Text(s) => CellContent::Text(s),
            CellValue::Numeric(n) => CellContent::Numeric(n),
            CellValue::DateTime(dt) => CellContent::DateTime(dt),
            CellValue::Boolean(b) => CellContent::Boolean(b),
            CellValue::Error(e) => CellContent::Error(e),
        };
        Some(Cell::new(row, col, content))
    }

    fn evaluate(&self, cell: &Cell) -> Result<CellValue, EvaluationError> {
        if !matches!(cell.content, CellContent::Formula(_)) {
            return Err(EvaluationError {
                message: format!("{} is not a formula cell", cell.reference()),
            });
        }

        Ok(self.value_at(cell.row, cell.col).unwrap_or(CellValue::Blank))
    }

    fn date_system(&self) -> DateSystem {
        self.styles.date_system
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::workbook::NumberFormat;
    use crate::intake::workbook::styles::with_1904_date_system;
    use rust_xlsxwriter::{Format, Formula, Workbook};

    fn sheet() -> CalamineSheet {
        // Used range deliberately starts away from A1
        let mut values = Range::new((2, 1), (12, 8));
        values.set_value((5, 3), Data::Float(45352.375));
        values.set_value((9, 1), Data::String("  REF1 ".to_string()));
        values.set_value((9, 2), Data::Int(42));
        values.set_value((9, 3), Data::Bool(true));
        values.set_value((9, 4), Data::String("SMITHX".to_string()));

        let mut formulas = Range::new((9, 4), (9, 4));
        formulas.set_value((9, 4), "UPPER(D10)&\"X\"".to_string());

        CalamineSheet::new("Intake", values, formulas)
    }

    fn saved(bytes: Vec<u8>) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("case-importer-{}.xlsx", uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn first_sheet_of(bytes: Vec<u8>) -> CalamineSheet {
        let path = saved(bytes);
        let sheet = CalamineWorkbook::open(&path)
            .and_then(|mut workbook| workbook.first_sheet())
            .unwrap();
        std::fs::remove_file(&path).ok();
        sheet
    }

    fn content(sheet: &CalamineSheet, row: u32, col: u32) -> Option<CellContent> {
        sheet.cell(row, col).map(|c| c.content)
    }

    #[test]
    fn test_cells_use_absolute_positions() {
        let sheet = sheet();
        assert_eq!(
            content(&sheet, 9, 1),
            Some(CellContent::Text("  REF1 ".to_string()))
        );
        assert_eq!(
            content(&sheet, 9, 2),
            Some(CellContent::Numeric(Numeric::plain(42.0)))
        );
        assert_eq!(content(&sheet, 9, 3), Some(CellContent::Boolean(true)));
        assert_eq!(content(&sheet, 9, 5), Some(CellContent::Blank));
        assert_eq!(sheet.cell(0, 0), None);
        assert_eq!(sheet.cell(40, 1), None);
    }

    #[test]
    fn test_row_presence_follows_used_range() {
        let sheet = sheet();
        assert!(!sheet.has_row(1));
        assert!(sheet.has_row(2));
        assert!(sheet.has_row(12));
        assert!(!sheet.has_row(13));
    }

    #[test]
    fn test_formula_cell_evaluates_to_cached_value() {
        let sheet = sheet();
        let cell = sheet.cell(9, 4).expect("formula cell");
        assert!(matches!(cell.content, CellContent::Formula(ref f) if f.starts_with("UPPER")));
        assert_eq!(
            sheet.evaluate(&cell),
            Ok(CellValue::Text("SMITHX".to_string()))
        );
    }

    #[test]
    fn test_evaluate_rejects_plain_cells() {
        let sheet = sheet();
        let cell = sheet.cell(9, 1).expect("text cell");
        assert!(sheet.evaluate(&cell).is_err());
    }

    #[test]
    fn test_iso_cells_become_dates() {
        let mut values = Range::new((0, 0), (0, 3));
        values.set_value((0, 0), Data::DateTimeIso("2024-03-01T09:00:00".to_string()));
        values.set_value((0, 1), Data::DateTimeIso("1990-05-14".to_string()));
        values.set_value((0, 2), Data::DateTimeIso("not a date".to_string()));
        values.set_value((0, 3), Data::DurationIso("PT1H".to_string()));
        let sheet = CalamineSheet::new("Sheet1", values, Range::empty());

        let day = NaiveDate::from_ymd_opt(1990, 5, 14).unwrap();
        assert_eq!(
            content(&sheet, 0, 0),
            Some(CellContent::DateTime(
                NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap()
            ))
        );
        assert_eq!(
            content(&sheet, 0, 1),
            Some(CellContent::DateTime(day.and_time(NaiveTime::MIN)))
        );
        assert_eq!(
            content(&sheet, 0, 2),
            Some(CellContent::Text("not a date".to_string()))
        );
        assert_eq!(
            content(&sheet, 0, 3),
            Some(CellContent::Text("PT1H".to_string()))
        );
    }

    #[test]
    fn test_date_system_inferred_from_date_cells() {
        let mut values = Range::new((0, 0), (0, 1));
        values.set_value((0, 0), Data::Float(12.0));
        values.set_value(
            (0, 1),
            Data::DateTime(ExcelDateTime::new(31545.0, ExcelDateTimeType::DateTime, true)),
        );
        assert_eq!(detect_date_system(&values), DateSystem::V1904);

        values.set_value(
            (0, 1),
            Data::DateTime(ExcelDateTime::new(33007.0, ExcelDateTimeType::DateTime, false)),
        );
        assert_eq!(detect_date_system(&values), DateSystem::V1900);
        assert_eq!(detect_date_system(&Range::empty()), DateSystem::V1900);
    }

    #[test]
    fn test_xlsx_number_formats_reach_cells() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet
            .write_number_with_format(9, 1, 42, &Format::new().set_num_format("00000"))
            .unwrap();
        sheet
            .write_number_with_format(9, 2, 1234567, &Format::new().set_num_format("#,##0"))
            .unwrap();
        sheet.write_number(9, 3, 3.5).unwrap();
        let sheet = first_sheet_of(workbook.save_to_buffer().unwrap());

        assert_eq!(
            content(&sheet, 9, 1),
            Some(CellContent::Numeric(Numeric::formatted(42.0, "00000")))
        );
        assert_eq!(
            content(&sheet, 9, 2),
            Some(CellContent::Numeric(Numeric::formatted(1234567.0, "#,##0")))
        );
        assert_eq!(
            content(&sheet, 9, 3),
            Some(CellContent::Numeric(Numeric::plain(3.5)))
        );
        assert_eq!(sheet.date_system(), DateSystem::V1900);
    }

    #[test]
    fn test_xlsx_date_formula_keeps_its_format() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet
            .write_formula_with_format(
                9,
                5,
                Formula::new("=DATE(1990,5,14)").set_result("33007"),
                &Format::new().set_num_format("yyyy-mm-dd"),
            )
            .unwrap();
        let sheet = first_sheet_of(workbook.save_to_buffer().unwrap());

        let cell = sheet.cell(9, 5).expect("formula cell");
        assert!(matches!(cell.content, CellContent::Formula(ref f) if f.contains("DATE")));
        match sheet.evaluate(&cell) {
            Ok(CellValue::Numeric(n)) => {
                assert_eq!(n.value, 33007.0);
                assert_eq!(n.format, NumberFormat::Date);
            }
            other => panic!("expected a date-formatted number, got {:?}", other),
        }
    }

    #[test]
    fn test_xlsx_1904_workbook() {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet()
            .write_number_with_format(0, 0, 31545, &Format::new().set_num_format("yyyy-mm-dd"))
            .unwrap();
        let bytes = with_1904_date_system(&workbook.save_to_buffer().unwrap());
        let sheet = first_sheet_of(bytes);

        assert_eq!(sheet.date_system(), DateSystem::V1904);
        assert_eq!(
            content(&sheet, 0, 0),
            Some(CellContent::Numeric(Numeric::date(31545.0)))
        );
    }
}
