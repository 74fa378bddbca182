//! Batch ingestion
//!
//! One run reads the first worksheet of a workbook, stamps every record with
//! the header timestamp, and commits the batch through a [`CaseRepository`]
//! in a single all-or-nothing call.

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{RecordDefaults, SheetLayout};
use crate::intake::{
    Batch, CaseRepository, CellResolver, IngestError, IngestWarning, RecordNormalizer, RowBlock,
    WorkbookSource, Worksheet,
};

/// A staged batch together with the warnings raised while building it
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub sheet_name: String,
    pub batch: Batch,
    pub warnings: Vec<IngestWarning>,
}

/// Result of a committed run
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub run_id: Uuid,
    pub committed: usize,
    /// Store-assigned ids, in source row order
    pub case_ids: Vec<String>,
    pub submitted_at: NaiveDateTime,
    pub warnings: Vec<IngestWarning>,
}

/// Read the first sheet of `source` into a batch without persisting anything
pub fn stage_workbook<S: WorkbookSource>(
    mut source: S,
    layout: &SheetLayout,
    defaults: &RecordDefaults,
) -> Result<BatchReport, IngestError> {
    layout.validate()?;
    let sheet = source.first_sheet()?;
    // The source is done with once the sheet is loaded
    drop(source);
    build_batch(&sheet, layout, defaults)
}

/// Build the batch for one worksheet
pub fn build_batch<W: Worksheet + ?Sized>(
    sheet: &W,
    layout: &SheetLayout,
    defaults: &RecordDefaults,
) -> Result<BatchReport, IngestError> {
    layout.validate()?;

    let resolver = match layout.date_system {
        Some(forced) => {
            if forced != sheet.date_system() {
                log::info!(
                    "Reading dates with the {:?} system instead of the workbook's {:?}",
                    forced,
                    sheet.date_system()
                );
            }
            CellResolver::new(sheet).with_date_system(forced)
        }
        None => CellResolver::new(sheet),
    };
    let mut warnings = Vec::new();

    let header = layout.header_timestamp;
    let header_cell = resolver.cell(header.row, header.col);
    let submitted_at = match resolver.resolve_as_date_time(header_cell.as_ref(), &mut warnings) {
        Some(ts) => ts,
        None => {
            let fallback = chrono::Local::now().naive_local();
            log::warn!(
                "Submitted timestamp ({}) is empty or invalid. Using current time {} for all rows.",
                header,
                fallback
            );
            warnings.push(IngestWarning::HeaderTimestampMissing {
                cell: header.to_string(),
                fallback,
            });
            fallback
        }
    };
    log::debug!("Submitted timestamp for sheet '{}': {}", sheet.name(), submitted_at);

    let normalizer = RecordNormalizer::new(layout.columns, defaults.clone());
    let mut batch = Batch::new(submitted_at);

    for row in RowBlock::new(resolver, layout.data_start_row, layout.monitored_columns) {
        let record = normalizer.normalize(&resolver, row, submitted_at, &mut warnings)?;
        log::debug!(
            "Staged row {}: {} ({})",
            row + 1,
            record.display_name(),
            record.third_party_reference_1.as_deref().unwrap_or("-")
        );
        batch.push(row, record);
    }

    log::info!(
        "Staged {} record(s) from sheet '{}' with {} warning(s)",
        batch.len(),
        sheet.name(),
        warnings.len()
    );

    Ok(BatchReport {
        sheet_name: sheet.name().to_string(),
        batch,
        warnings,
    })
}

/// Runs ingestions against one repository
pub struct IngestionService<R: CaseRepository> {
    repository: R,
    layout: SheetLayout,
    defaults: RecordDefaults,
}

impl<R: CaseRepository> IngestionService<R> {
    pub fn new(repository: R, layout: SheetLayout, defaults: RecordDefaults) -> Self {
        IngestionService {
            repository,
            layout,
            defaults,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Decode and stage on the blocking pool
    pub async fn stage<S>(&self, source: S) -> Result<BatchReport, IngestError>
    where
        S: WorkbookSource + Send + 'static,
    {
        let layout = self.layout;
        let defaults = self.defaults.clone();

        tokio::task::spawn_blocking(move || stage_workbook(source, &layout, &defaults))
            .await
            .map_err(|e| IngestError::UnexpectedFailure {
                row: None,
                message: format!("ingestion task failed: {}", e),
            })?
    }

    /// Stage the workbook and commit it as one batch
    ///
    /// Either every record of the block is committed, or none is.
    pub async fn ingest<S>(&self, source: S) -> Result<IngestOutcome, IngestError>
    where
        S: WorkbookSource + Send + 'static,
    {
        let run_id = Uuid::new_v4();
        log::info!("Starting ingestion run {}", run_id);

        let report = match self.stage(source).await {
            Ok(report) => report,
            Err(e) => {
                log::error!("Ingestion run {} failed: {}", run_id, e);
                return Err(e);
            }
        };

        let case_ids = match self.repository.save_batch(&report.batch).await {
            Ok(ids) => ids,
            Err(e) => {
                let err = IngestError::from(e);
                log::error!("Ingestion run {} failed, nothing committed: {}", run_id, err);
                return Err(err);
            }
        };

        log::info!(
            "Ingestion run {} committed {} record(s)",
            run_id,
            case_ids.len()
        );

        Ok(IngestOutcome {
            run_id,
            committed: case_ids.len(),
            case_ids,
            submitted_at: report.batch.submitted_at,
            warnings: report.warnings,
        })
    }
}
