//! Spreadsheet intake engine
//!
//! Turns the data block of an intake worksheet into normalized case records:
//! cells are resolved to typed values ([`resolve`]), the block is walked until
//! its first empty row ([`scan`]), and each row is mapped onto a record
//! ([`normalize`]). Committing a batch goes through the [`store`] boundary.

pub mod error;
pub mod normalize;
pub mod resolve;
pub mod scan;
pub mod store;
pub mod types;
pub mod workbook;

pub use error::IngestError;
pub use normalize::RecordNormalizer;
pub use resolve::{CellResolver, DateSystem};
pub use scan::{RowBlock, is_row_empty};
pub use store::{CaseRepository, PersistenceError};
pub use types::*;
pub use workbook::{
    CalamineWorkbook, Cell, CellContent, CellValue, NumberFormat, Numeric, Worksheet, WorkbookSource,
};
