//! Values produced by the intake engine

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::workbook::cell_reference;
use crate::config::RecordDefaults;

/// Canonical interpretation of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ResolvedValue {
    /// Trimmed text (may be empty)
    Text(String),
    /// Calendar date in local time
    Date(NaiveDate),
    /// Wall-clock date-time in local time
    DateTime(NaiveDateTime),
    /// Blank or unreadable cell; persisted as NULL, never as ""
    Absent,
}

impl ResolvedValue {
    /// Absent, or text that is empty after trimming
    pub fn is_blank(&self) -> bool {
        match self {
            ResolvedValue::Absent => true,
            ResolvedValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for text fields; date-times keep only their date
    pub fn into_text(self) -> Option<String> {
        match self {
            ResolvedValue::Text(s) => Some(s),
            ResolvedValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            ResolvedValue::DateTime(dt) => Some(dt.date().format("%Y-%m-%d").to_string()),
            ResolvedValue::Absent => None,
        }
    }
}

/// One case built from a data row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Assigned by the store at commit time
    pub case_id: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    /// Shared by every record of a batch
    pub submitted_at: NaiveDateTime,
    pub case_type: String,
    pub case_status_id: i32,
    pub is_current_resident: String,
    pub title_code: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub post_code: Option<String>,
    pub third_party_reference_1: Option<String>,
    pub third_party_reference_2: Option<String>,
}

impl NormalizedRecord {
    /// A record carrying only the static defaults and the batch timestamp
    pub fn with_defaults(defaults: &RecordDefaults, submitted_at: NaiveDateTime) -> Self {
        NormalizedRecord {
            case_id: None,
            channel_id: defaults.channel_id.clone(),
            user_id: defaults.user_id.clone(),
            submitted_at,
            case_type: defaults.case_type.clone(),
            case_status_id: defaults.case_status_id,
            is_current_resident: defaults.is_current_resident.clone(),
            title_code: defaults.title_code.clone(),
            first_name: None,
            middle_name: defaults.middle_name.clone(),
            last_name: None,
            date_of_birth: None,
            post_code: None,
            third_party_reference_1: None,
            third_party_reference_2: None,
        }
    }

    /// "First Last" for log lines
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A normalized record tagged with the worksheet row it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedRecord {
    /// 0-indexed worksheet row
    pub row: u32,
    pub record: NormalizedRecord,
}

impl StagedRecord {
    /// Row number as shown in the spreadsheet
    pub fn row_number(&self) -> u32 {
        self.row + 1
    }
}

/// All records of one ingestion run, in source row order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub submitted_at: NaiveDateTime,
    pub records: Vec<StagedRecord>,
}

impl Batch {
    pub fn new(submitted_at: NaiveDateTime) -> Self {
        Batch {
            submitted_at,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, row: u32, record: NormalizedRecord) {
        self.records.push(StagedRecord { row, record });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Non-fatal condition encountered while building a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestWarning {
    /// Header cell blank or unreadable; the run used `fallback` instead
    HeaderTimestampMissing { cell: String, fallback: NaiveDateTime },
    /// One cell could not be coerced and was treated as absent
    CellCoercionFailure { row: u32, col: u32, detail: String },
}

impl std::fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestWarning::HeaderTimestampMissing { cell, fallback } => write!(
                f,
                "submitted timestamp ({}) is empty or invalid, using {}",
                cell, fallback
            ),
            IngestWarning::CellCoercionFailure { row, col, detail } => {
                write!(f, "cell {} treated as empty: {}", cell_reference(*row, *col), detail)
            }
        }
    }
}
