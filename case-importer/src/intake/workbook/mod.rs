//! Read-only view of a decoded workbook
//!
//! The intake engine never touches a spreadsheet container directly. A decoder
//! (see [`decoder`]) exposes the first worksheet through the [`Worksheet`]
//! trait: cells addressed by absolute 0-indexed (row, column) positions, a
//! content kind per cell, the workbook's date system, and a formula
//! evaluation hook.

pub mod decoder;
pub mod styles;

#[cfg(test)]
pub(crate) mod memory;

pub use decoder::CalamineWorkbook;

use std::sync::Arc;

use chrono::NaiveDateTime;

use super::error::IngestError;
use super::resolve::DateSystem;

/// How a cell's number format presents a numeric value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NumberFormat {
    #[default]
    General,
    /// Any date and/or time format; the value is a serial
    Date,
    /// Explicit format code such as `00000` or `#,##0.00`
    Code(Arc<str>),
}

/// A numeric cell value together with its number format
#[derive(Debug, Clone, PartialEq)]
pub struct Numeric {
    pub value: f64,
    pub format: NumberFormat,
}

impl Numeric {
    pub fn plain(value: f64) -> Self {
        Numeric {
            value,
            format: NumberFormat::General,
        }
    }

    pub fn date(value: f64) -> Self {
        Numeric {
            value,
            format: NumberFormat::Date,
        }
    }

    pub fn formatted(value: f64, code: impl Into<Arc<str>>) -> Self {
        Numeric {
            value,
            format: NumberFormat::Code(code.into()),
        }
    }

    pub fn is_date(&self) -> bool {
        self.format == NumberFormat::Date
    }
}

/// A primitive cell value: raw content of a non-formula cell, or the result
/// of evaluating a formula
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Blank,
    Text(String),
    Numeric(Numeric),
    /// Wall-clock value stored as a date rather than a serial (ods)
    DateTime(NaiveDateTime),
    Boolean(bool),
    /// Spreadsheet error value such as `#DIV/0!`
    Error(String),
}

/// Raw content of a cell as stored in the workbook
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Blank,
    Text(String),
    Numeric(Numeric),
    DateTime(NaiveDateTime),
    Boolean(bool),
    Error(String),
    /// Formula source text; the value comes from [`Worksheet::evaluate`]
    Formula(String),
}

/// One cell at an absolute worksheet position
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub content: CellContent,
}

impl Cell {
    pub fn new(row: u32, col: u32, content: CellContent) -> Self {
        Cell { row, col, content }
    }

    /// Spreadsheet-style reference, e.g. `D6`
    pub fn reference(&self) -> String {
        cell_reference(self.row, self.col)
    }
}

/// Formula evaluation failure reported by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationError {
    pub message: String,
}

impl std::fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "formula evaluation failed: {}", self.message)
    }
}

impl std::error::Error for EvaluationError {}

/// A single worksheet exposed by a decoder
pub trait Worksheet {
    /// Sheet name as shown in the workbook
    fn name(&self) -> &str;

    /// Whether the sheet has a row object at this index
    fn has_row(&self, row: u32) -> bool;

    /// Cell at an absolute position, `None` when no cell exists there
    fn cell(&self, row: u32, col: u32) -> Option<Cell>;

    /// Evaluate a formula cell to its primitive result
    fn evaluate(&self, cell: &Cell) -> Result<CellValue, EvaluationError>;

    /// Epoch the workbook counts date serials from
    fn date_system(&self) -> DateSystem {
        DateSystem::V1900
    }
}

/// An opened workbook that can hand out its first worksheet
///
/// The source is consumed by the ingestion run; dropping it releases the
/// underlying file handle.
pub trait WorkbookSource {
    type Sheet: Worksheet;

    /// The first worksheet, or `IngestError::InvalidFormat` when there is none
    fn first_sheet(&mut self) -> Result<Self::Sheet, IngestError>;
}

/// Convert 0-indexed coordinates to an A1-style reference
pub fn cell_reference(row: u32, col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect::<String>() + &(row + 1).to_string()
}
