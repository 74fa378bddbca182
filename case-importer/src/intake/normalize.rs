//! Row to record normalization

use chrono::NaiveDateTime;

use super::error::IngestError;
use super::resolve::CellResolver;
use super::types::{IngestWarning, NormalizedRecord};
use super::workbook::Worksheet;
use crate::config::{FieldColumns, RecordDefaults};

/// Builds one [`NormalizedRecord`] per data row
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    columns: FieldColumns,
    defaults: RecordDefaults,
}

impl RecordNormalizer {
    pub fn new(columns: FieldColumns, defaults: RecordDefaults) -> Self {
        RecordNormalizer { columns, defaults }
    }

    /// Map a row's cells onto record fields
    ///
    /// Depends only on the row and the shared timestamp; cells that cannot be
    /// interpreted become `None` and are reported through `warnings`.
    pub fn normalize<W: Worksheet + ?Sized>(
        &self,
        resolver: &CellResolver<'_, W>,
        row: u32,
        submitted_at: NaiveDateTime,
        warnings: &mut Vec<IngestWarning>,
    ) -> Result<NormalizedRecord, IngestError> {
        if !resolver.sheet().has_row(row) {
            return Err(IngestError::unexpected(
                row,
                format!("row is not present in sheet '{}'", resolver.sheet().name()),
            ));
        }

        let mut text = |col: u32| {
            let cell = resolver.cell(row, col);
            resolver.resolve_text(cell.as_ref(), warnings)
        };

        let mut record = NormalizedRecord::with_defaults(&self.defaults, submitted_at);
        record.third_party_reference_1 = text(self.columns.third_party_reference_1);
        record.third_party_reference_2 = text(self.columns.third_party_reference_2);
        record.last_name = text(self.columns.last_name);
        record.first_name = text(self.columns.first_name);
        record.post_code = text(self.columns.post_code);

        let dob_cell = resolver.cell(row, self.columns.date_of_birth);
        record.date_of_birth = resolver.resolve_as_date(dob_cell.as_ref(), warnings);

        Ok(record)
    }
}
