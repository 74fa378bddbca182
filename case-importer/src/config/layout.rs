//! Worksheet layout and record defaults
//!
//! All positions are 0-indexed. The defaults describe the standard intake
//! template: submitted timestamp in D6, data rows from row 10, columns B..I
//! watched for the end of the block and B..G read into fields.

use serde::{Deserialize, Serialize};

use crate::intake::error::IngestError;
use crate::intake::resolve::DateSystem;
use crate::intake::workbook::cell_reference;

pub const HEADER_TIMESTAMP_ROW: u32 = 5;
pub const HEADER_TIMESTAMP_COL: u32 = 3;
pub const DATA_START_ROW: u32 = 9;
pub const MONITORED_FIRST_COL: u32 = 1;
pub const MONITORED_LAST_COL: u32 = 8;

/// Column indices for intake fields
mod cols {
    pub const THIRD_PARTY_REFERENCE_1: u32 = 1;
    pub const THIRD_PARTY_REFERENCE_2: u32 = 2;
    pub const LAST_NAME: u32 = 3;
    pub const FIRST_NAME: u32 = 4;
    pub const DATE_OF_BIRTH: u32 = 5;
    pub const POST_CODE: u32 = 6;
}

/// Absolute cell position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", cell_reference(self.row, self.col))
    }
}

/// Inclusive column range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub start: u32,
    pub end: u32,
}

impl ColumnRange {
    pub fn contains(&self, col: u32) -> bool {
        col >= self.start && col <= self.end
    }

    pub fn columns(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

/// Where each intake field is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldColumns {
    pub third_party_reference_1: u32,
    pub third_party_reference_2: u32,
    pub last_name: u32,
    pub first_name: u32,
    pub date_of_birth: u32,
    pub post_code: u32,
}

impl Default for FieldColumns {
    fn default() -> Self {
        FieldColumns {
            third_party_reference_1: cols::THIRD_PARTY_REFERENCE_1,
            third_party_reference_2: cols::THIRD_PARTY_REFERENCE_2,
            last_name: cols::LAST_NAME,
            first_name: cols::FIRST_NAME,
            date_of_birth: cols::DATE_OF_BIRTH,
            post_code: cols::POST_CODE,
        }
    }
}

impl FieldColumns {
    /// (field name, column) pairs in template order
    pub fn entries(&self) -> [(&'static str, u32); 6] {
        [
            ("third_party_reference_1", self.third_party_reference_1),
            ("third_party_reference_2", self.third_party_reference_2),
            ("last_name", self.last_name),
            ("first_name", self.first_name),
            ("date_of_birth", self.date_of_birth),
            ("post_code", self.post_code),
        ]
    }
}

/// Positions the engine reads from one worksheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    /// Cell holding the timestamp shared by the whole batch
    pub header_timestamp: CellRef,
    /// First data row
    pub data_start_row: u32,
    /// Columns checked when deciding whether a row ends the block
    pub monitored_columns: ColumnRange,
    pub columns: FieldColumns,
    /// Forces an epoch for serial dates; unset uses the workbook's own
    pub date_system: Option<DateSystem>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        SheetLayout {
            header_timestamp: CellRef {
                row: HEADER_TIMESTAMP_ROW,
                col: HEADER_TIMESTAMP_COL,
            },
            data_start_row: DATA_START_ROW,
            monitored_columns: ColumnRange {
                start: MONITORED_FIRST_COL,
                end: MONITORED_LAST_COL,
            },
            columns: FieldColumns::default(),
            date_system: None,
        }
    }
}

impl SheetLayout {
    /// Reject layouts where the scanner and normalizer would disagree
    pub fn validate(&self) -> Result<(), IngestError> {
        let range = self.monitored_columns;
        if range.start > range.end {
            return Err(IngestError::InvalidLayout {
                reason: format!(
                    "monitored columns start ({}) after they end ({})",
                    range.start, range.end
                ),
            });
        }

        for (field, col) in self.columns.entries() {
            if !range.contains(col) {
                return Err(IngestError::InvalidLayout {
                    reason: format!(
                        "field {} reads column {} outside the monitored columns {}..={}",
                        field, col, range.start, range.end
                    ),
                });
            }
        }

        if self.data_start_row <= self.header_timestamp.row {
            return Err(IngestError::InvalidLayout {
                reason: format!(
                    "data rows start at row {} but the header timestamp is at {}",
                    self.data_start_row + 1,
                    self.header_timestamp
                ),
            });
        }

        Ok(())
    }
}

/// Static values stamped on every record of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordDefaults {
    pub channel_id: String,
    pub user_id: String,
    pub case_type: String,
    pub case_status_id: i32,
    pub is_current_resident: String,
    pub title_code: Option<String>,
    pub middle_name: Option<String>,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        RecordDefaults {
            channel_id: "10".to_string(),
            user_id: "SYS".to_string(),
            case_type: "QRY".to_string(),
            case_status_id: 8,
            is_current_resident: "Y".to_string(),
            title_code: None,
            middle_name: None,
        }
    }
}
