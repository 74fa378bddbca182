//! Spreadsheet serial number to calendar date/time conversion
//!
//! The integer part counts days from the epoch of the date system, the
//! fraction is the time of day. Conversion itself is calamine's
//! [`ExcelDateTime`]; this module bounds the serials it accepts and carries
//! the workbook's date system.

use calamine::{ExcelDateTime, ExcelDateTimeType};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Largest serial a spreadsheet accepts (9999-12-31 in the 1900 system)
pub const MAX_SERIAL: f64 = 2_958_466.0;

/// Days between the 1900 and 1904 epochs
const EPOCH_GAP_1904: f64 = 1_462.0;

/// Epoch used by a workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateSystem {
    #[default]
    #[serde(rename = "1900")]
    V1900,
    #[serde(rename = "1904")]
    V1904,
}

/// A serial number that does not map to a calendar date
#[derive(Debug, Clone, PartialEq)]
pub struct SerialDateError {
    pub serial: f64,
    pub reason: &'static str,
}

impl std::fmt::Display for SerialDateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is not a valid date serial: {}", self.serial, self.reason)
    }
}

impl std::error::Error for SerialDateError {}

fn invalid(serial: f64, reason: &'static str) -> SerialDateError {
    SerialDateError { serial, reason }
}

/// Convert a serial number to a wall-clock date-time
pub fn serial_to_datetime(serial: f64, system: DateSystem) -> Result<NaiveDateTime, SerialDateError> {
    if !serial.is_finite() {
        return Err(invalid(serial, "not a finite number"));
    }
    if serial < 0.0 {
        return Err(invalid(serial, "negative serial"));
    }
    let offset = match system {
        DateSystem::V1900 => 0.0,
        DateSystem::V1904 => EPOCH_GAP_1904,
    };
    if serial + offset >= MAX_SERIAL {
        return Err(invalid(serial, "beyond the last representable day"));
    }

    ExcelDateTime::new(serial, ExcelDateTimeType::DateTime, system == DateSystem::V1904)
        .as_datetime()
        .ok_or_else(|| invalid(serial, "date out of range"))
}

/// Whether the serial carries a time-of-day component
pub fn has_time(serial: f64) -> bool {
    serial.is_finite() && serial.fract() != 0.0
}
