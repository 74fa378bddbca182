//! Fatal errors of an ingestion run
//!
//! Per-cell problems never show up here: they resolve to an absent value and
//! are reported as [`IngestWarning`](super::IngestWarning)s instead.

use super::store::PersistenceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// No worksheet, or the source could not be read at all
    InvalidFormat { reason: String },
    /// The sheet layout is inconsistent and no row was read
    InvalidLayout { reason: String },
    /// A row failed in a way the cell-level policy does not cover
    UnexpectedFailure { row: Option<u32>, message: String },
    /// The store rejected the batch; nothing was committed
    PersistenceFailure { row: Option<u32>, message: String },
}

impl IngestError {
    pub fn unexpected(row: u32, message: impl Into<String>) -> Self {
        IngestError::UnexpectedFailure {
            row: Some(row),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::InvalidFormat { reason } => {
                write!(f, "invalid workbook: {}", reason)
            }
            IngestError::InvalidLayout { reason } => {
                write!(f, "invalid sheet layout: {}", reason)
            }
            IngestError::UnexpectedFailure { row: Some(row), message } => {
                write!(f, "failed to process row {}: {}", row + 1, message)
            }
            IngestError::UnexpectedFailure { row: None, message } => {
                write!(f, "failed to process workbook: {}", message)
            }
            IngestError::PersistenceFailure { row: Some(row), message } => {
                write!(f, "failed to save data for row {}: {}", row + 1, message)
            }
            IngestError::PersistenceFailure { row: None, message } => {
                write!(f, "failed to save batch: {}", message)
            }
        }
    }
}

impl std::error::Error for IngestError {}

impl From<PersistenceError> for IngestError {
    fn from(err: PersistenceError) -> Self {
        IngestError::PersistenceFailure {
            row: err.row,
            message: err.message,
        }
    }
}
