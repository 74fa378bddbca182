//! Cell value resolution
//!
//! Every cell goes through one dispatch table, [`CellResolver::coerce`], keyed
//! on a primitive value. Plain cells feed their raw content into it; formula
//! cells are evaluated first and their result is fed in the same way.
//!
//! Resolution never fails. A cell that cannot be interpreted resolves to
//! [`ResolvedValue::Absent`] and, where the caller passes a warning sink, an
//! [`IngestWarning::CellCoercionFailure`] is recorded.

pub mod display;
pub mod numfmt;
pub mod serial;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

pub use display::format_general;
pub use numfmt::format_number;
pub use serial::{DateSystem, SerialDateError, serial_to_datetime};

use super::types::{IngestWarning, ResolvedValue};
use super::workbook::{Cell, CellContent, CellValue, NumberFormat, Worksheet};

/// A single cell that could not be interpreted
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionFailure {
    pub row: u32,
    pub col: u32,
    pub detail: String,
}

impl CoercionFailure {
    fn new(cell: &Cell, detail: impl Into<String>) -> Self {
        CoercionFailure {
            row: cell.row,
            col: cell.col,
            detail: detail.into(),
        }
    }

    pub fn into_warning(self) -> IngestWarning {
        IngestWarning::CellCoercionFailure {
            row: self.row,
            col: self.col,
            detail: self.detail,
        }
    }
}

/// Resolves cells of one worksheet
pub struct CellResolver<'a, W: Worksheet + ?Sized> {
    sheet: &'a W,
    date_system: DateSystem,
}

impl<W: Worksheet + ?Sized> Clone for CellResolver<'_, W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W: Worksheet + ?Sized> Copy for CellResolver<'_, W> {}

impl<'a, W: Worksheet + ?Sized> CellResolver<'a, W> {
    /// Resolver using the date system the workbook declares
    pub fn new(sheet: &'a W) -> Self {
        CellResolver {
            sheet,
            date_system: sheet.date_system(),
        }
    }

    /// Replace the workbook's date system
    pub fn with_date_system(mut self, date_system: DateSystem) -> Self {
        self.date_system = date_system;
        self
    }

    pub fn date_system(&self) -> DateSystem {
        self.date_system
    }

    pub fn sheet(&self) -> &'a W {
        self.sheet
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<Cell> {
        self.sheet.cell(row, col)
    }

    /// Resolve a cell, swallowing coercion failures
    pub fn resolve(&self, cell: Option<&Cell>) -> ResolvedValue {
        let Some(cell) = cell else {
            return ResolvedValue::Absent;
        };
        match self.primitive(cell).and_then(|value| self.coerce(cell, value)) {
            Ok(value) => value,
            Err(failure) => {
                log::debug!("{} resolved as absent: {}", cell.reference(), failure.detail);
                ResolvedValue::Absent
            }
        }
    }

    /// Resolve the cell at a position
    pub fn resolve_at(&self, row: u32, col: u32) -> ResolvedValue {
        self.resolve(self.cell(row, col).as_ref())
    }

    /// Text interpretation of a cell; `None` when absent
    pub fn resolve_text(
        &self,
        cell: Option<&Cell>,
        warnings: &mut Vec<IngestWarning>,
    ) -> Option<String> {
        let cell = cell?;
        match self.primitive(cell).and_then(|value| self.coerce(cell, value)) {
            Ok(value) => value.into_text(),
            Err(failure) => {
                record(failure, warnings);
                None
            }
        }
    }

    /// Calendar date of a cell
    ///
    /// Date cells and date-formatted numbers convert directly. Plain numbers
    /// are still tried
    /// as serials since dates are often stored unformatted; a number that is
    /// not a valid serial becomes absent with a warning. Other kinds are
    /// absent.
    pub fn resolve_as_date(
        &self,
        cell: Option<&Cell>,
        warnings: &mut Vec<IngestWarning>,
    ) -> Option<NaiveDate> {
        self.resolve_as_date_time(cell, warnings).map(|dt| dt.date())
    }

    /// Wall-clock date-time of a cell, with the same policy as
    /// [`resolve_as_date`](Self::resolve_as_date)
    pub fn resolve_as_date_time(
        &self,
        cell: Option<&Cell>,
        warnings: &mut Vec<IngestWarning>,
    ) -> Option<NaiveDateTime> {
        let cell = cell?;
        let value = match self.primitive(cell) {
            Ok(value) => value,
            Err(failure) => {
                record(failure, warnings);
                return None;
            }
        };

        match value {
            CellValue::DateTime(dt) => Some(dt),
            CellValue::Numeric(n) => {
                if !n.is_date() {
                    log::debug!(
                        "{} holds unformatted number {}, trying it as a date serial",
                        cell.reference(),
                        n.value
                    );
                }
                match self.serial(cell, n.value) {
                    Ok(dt) => Some(dt),
                    Err(failure) => {
                        record(failure, warnings);
                        None
                    }
                }
            }
            _ => None,
        }
    }

    /// Raw primitive of a cell, evaluating formulas
    fn primitive(&self, cell: &Cell) -> Result<CellValue, CoercionFailure> {
        Ok(match &cell.content {
            CellContent::Blank => CellValue::Blank,
            CellContent::Text(s) => CellValue::Text(s.clone()),
            CellContent::Numeric(n) => CellValue::Numeric(n.clone()),
            CellContent::DateTime(dt) => CellValue::DateTime(*dt),
            CellContent::Boolean(b) => CellValue::Boolean(*b),
            CellContent::Error(e) => CellValue::Error(e.clone()),
            CellContent::Formula(_) => self
                .sheet
                .evaluate(cell)
                .map_err(|e| CoercionFailure::new(cell, e.to_string()))?,
        })
    }

    /// The shared dispatch table for raw and evaluated values
    fn coerce(&self, cell: &Cell, value: CellValue) -> Result<ResolvedValue, CoercionFailure> {
        match value {
            CellValue::Blank => Ok(ResolvedValue::Absent),
            CellValue::Error(e) => {
                log::debug!("{} holds error value {}", cell.reference(), e);
                Ok(ResolvedValue::Absent)
            }
            CellValue::Text(s) => Ok(ResolvedValue::Text(s.trim().to_string())),
            CellValue::Boolean(b) => Ok(ResolvedValue::Text(b.to_string())),
            CellValue::DateTime(dt) if dt.time() == NaiveTime::MIN => {
                Ok(ResolvedValue::Date(dt.date()))
            }
            CellValue::DateTime(dt) => Ok(ResolvedValue::DateTime(dt)),
            CellValue::Numeric(n) => match &n.format {
                NumberFormat::Date => {
                    let dt = self.serial(cell, n.value)?;
                    if serial::has_time(n.value) {
                        Ok(ResolvedValue::DateTime(dt))
                    } else {
                        Ok(ResolvedValue::Date(dt.date()))
                    }
                }
                NumberFormat::Code(code) => Ok(ResolvedValue::Text(format_number(n.value, code))),
                NumberFormat::General => Ok(ResolvedValue::Text(format_general(n.value))),
            },
        }
    }

    fn serial(&self, cell: &Cell, value: f64) -> Result<NaiveDateTime, CoercionFailure> {
        serial_to_datetime(value, self.date_system)
            .map_err(|e| CoercionFailure::new(cell, e.to_string()))
    }
}

fn record(failure: CoercionFailure, warnings: &mut Vec<IngestWarning>) {
    let warning = failure.into_warning();
    log::warn!("{}", warning);
    warnings.push(warning);
}
