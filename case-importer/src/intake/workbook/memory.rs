//! In-memory worksheet used by the engine's unit tests

use std::collections::{BTreeMap, BTreeSet};

use super::{Cell, CellContent, CellValue, EvaluationError, Numeric, Worksheet, WorkbookSource};
use crate::intake::error::IngestError;
use crate::intake::resolve::DateSystem;

#[derive(Debug, Default, Clone)]
pub(crate) struct MemorySheet {
    cells: BTreeMap<(u32, u32), CellContent>,
    formula_results: BTreeMap<(u32, u32), Result<CellValue, String>>,
    rows: BTreeSet<u32>,
    date_system: DateSystem,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_system(&mut self, date_system: DateSystem) -> &mut Self {
        self.date_system = date_system;
        self
    }

    pub fn set(&mut self, row: u32, col: u32, content: CellContent) -> &mut Self {
        self.rows.insert(row);
        self.cells.insert((row, col), content);
        self
    }

    pub fn text(&mut self, row: u32, col: u32, s: &str) -> &mut Self {
        self.set(row, col, CellContent::Text(s.to_string()))
    }

    pub fn number(&mut self, row: u32, col: u32, value: f64) -> &mut Self {
        self.set(row, col, CellContent::Numeric(Numeric::plain(value)))
    }

    pub fn date(&mut self, row: u32, col: u32, serial: f64) -> &mut Self {
        self.set(row, col, CellContent::Numeric(Numeric::date(serial)))
    }

    pub fn formula(&mut self, row: u32, col: u32, source: &str, result: CellValue) -> &mut Self {
        self.formula_results.insert((row, col), Ok(result));
        self.set(row, col, CellContent::Formula(source.to_string()))
    }

    pub fn broken_formula(&mut self, row: u32, col: u32, source: &str, message: &str) -> &mut Self {
        self.formula_results
            .insert((row, col), Err(message.to_string()));
        self.set(row, col, CellContent::Formula(source.to_string()))
    }

    /// Register a row object with no cells in it
    pub fn empty_row(&mut self, row: u32) -> &mut Self {
        self.rows.insert(row);
        self
    }
}

impl Worksheet for MemorySheet {
    fn name(&self) -> &str {
        "Sheet1"
    }

    fn has_row(&self, row: u32) -> bool {
        self.rows.contains(&row)
    }

    fn cell(&self, row: u32, col: u32) -> Option<Cell> {
        self.cells
            .get(&(row, col))
            .map(|content| Cell::new(row, col, content.clone()))
    }

    fn evaluate(&self, cell: &Cell) -> Result<CellValue, EvaluationError> {
        match self.formula_results.get(&(cell.row, cell.col)) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(EvaluationError {
                message: message.clone(),
            }),
            None => Ok(CellValue::Blank),
        }
    }

    fn date_system(&self) -> DateSystem {
        self.date_system
    }
}

/// Workbook wrapper around zero or one memory sheet
pub(crate) struct MemoryWorkbook {
    pub sheet: Option<MemorySheet>,
}

impl WorkbookSource for MemoryWorkbook {
    type Sheet = MemorySheet;

    fn first_sheet(&mut self) -> Result<MemorySheet, IngestError> {
        self.sheet.take().ok_or_else(|| IngestError::InvalidFormat {
            reason: "workbook does not contain any sheets".to_string(),
        })
    }
}
