//! Rendering of records and run results

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use serde::Serialize;

use case_importer::intake::{IngestWarning, NormalizedRecord, StagedRecord};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns for the terminal
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// CSV with a header row
    Csv,
}

/// One record flattened for display
#[derive(Debug, Clone, Serialize)]
pub struct RecordRow {
    /// 1-based spreadsheet row, when the record came from a sheet
    pub row: Option<u32>,
    pub case_id: Option<String>,
    pub submitted_at: String,
    pub third_party_reference_1: Option<String>,
    pub third_party_reference_2: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub post_code: Option<String>,
}

impl RecordRow {
    pub fn from_record(row: Option<u32>, record: &NormalizedRecord) -> Self {
        RecordRow {
            row,
            case_id: record.case_id.clone(),
            submitted_at: record.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            third_party_reference_1: record.third_party_reference_1.clone(),
            third_party_reference_2: record.third_party_reference_2.clone(),
            last_name: record.last_name.clone(),
            first_name: record.first_name.clone(),
            date_of_birth: record.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            post_code: record.post_code.clone(),
        }
    }

    pub fn from_staged(staged: &StagedRecord) -> Self {
        Self::from_record(Some(staged.row_number()), &staged.record)
    }
}

const TABLE_HEADERS: [&str; 9] = [
    "Row",
    "Case",
    "Submitted",
    "Reference 1",
    "Reference 2",
    "Last Name",
    "First Name",
    "Date of Birth",
    "Post Code",
];

fn table_cells(row: &RecordRow) -> [String; 9] {
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    [
        row.row.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
        opt(&row.case_id),
        row.submitted_at.clone(),
        opt(&row.third_party_reference_1),
        opt(&row.third_party_reference_2),
        opt(&row.last_name),
        opt(&row.first_name),
        opt(&row.date_of_birth),
        opt(&row.post_code),
    ]
}

pub fn format_records(rows: &[RecordRow], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(format_table(rows)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(rows).context("Failed to format JSON output")
        }
        OutputFormat::Csv => to_csv(rows),
    }
}

fn format_table(rows: &[RecordRow]) -> String {
    if rows.is_empty() {
        return "No records".dimmed().to_string();
    }

    let cells: Vec<[String; 9]> = rows.iter().map(table_cells).collect();
    let mut widths = TABLE_HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |values: &[String]| {
        values
            .iter()
            .zip(widths.iter())
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = TABLE_HEADERS.iter().map(|h| h.to_string()).collect();
    let mut out = line(&header).bold().to_string();
    for row in &cells {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}

fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in rows {
        wtr.serialize(row).context("Failed to write CSV row")?;
    }
    let bytes = wtr.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Case ids of a committed run, one per line for CSV
pub fn format_case_ids(case_ids: &[String], format: OutputFormat) -> Result<String> {
    #[derive(Serialize)]
    struct CaseIdRow<'a> {
        case_id: &'a str,
    }

    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(case_ids).context("Failed to format JSON output")
        }
        OutputFormat::Csv => {
            let rows: Vec<_> = case_ids.iter().map(|id| CaseIdRow { case_id: id }).collect();
            to_csv(&rows)
        }
        OutputFormat::Table => Ok(case_ids.join(", ")),
    }
}

pub fn print_warnings(warnings: &[IngestWarning]) {
    for warning in warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use case_importer::config::RecordDefaults;
    use chrono::NaiveDate;

    fn sample() -> RecordRow {
        let submitted = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut record = NormalizedRecord::with_defaults(&RecordDefaults::default(), submitted);
        record.last_name = Some("Smith".into());
        record.first_name = Some("Jane, Q".into());
        record.date_of_birth = NaiveDate::from_ymd_opt(1990, 5, 14);
        RecordRow::from_record(Some(10), &record)
    }

    #[test]
    fn test_csv_output() {
        let csv = format_records(&[sample()], OutputFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some(
                "row,case_id,submitted_at,third_party_reference_1,third_party_reference_2,\
                 last_name,first_name,date_of_birth,post_code"
            )
        );
        assert_eq!(
            lines.next(),
            Some("10,,2024-03-01 09:00:00,,,Smith,\"Jane, Q\",1990-05-14,")
        );
    }

    #[test]
    fn test_json_output() {
        let json = format_records(&[sample()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["last_name"], "Smith");
        assert_eq!(value[0]["post_code"], serde_json::Value::Null);
    }

    #[test]
    fn test_table_output() {
        colored::control::set_override(false);
        let table = format_records(&[sample()], OutputFormat::Table).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Row  Case"));
        assert!(lines[1].contains("Smith"));
        assert!(lines[1].contains("1990-05-14"));
    }

    #[test]
    fn test_case_ids() {
        let ids = vec!["1".to_string(), "2".to_string()];
        assert_eq!(format_case_ids(&ids, OutputFormat::Table).unwrap(), "1, 2");
        assert_eq!(
            format_case_ids(&ids, OutputFormat::Csv).unwrap(),
            "case_id\n1\n2\n"
        );
    }
}
