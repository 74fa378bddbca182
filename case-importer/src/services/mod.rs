// Business logic services layer
//
// Services coordinate the intake engine with persistence and are shared by
// the CLI commands.

pub mod ingestion;

pub use ingestion::{BatchReport, IngestOutcome, IngestionService, build_batch, stage_workbook};
