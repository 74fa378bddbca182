//! `import` command

pub mod handler;

use std::path::PathBuf;

use clap::Args;

use crate::cli::output::OutputFormat;

#[derive(Args)]
pub struct ImportCommands {
    /// Workbook to ingest (xlsx, xlsm, xls, ods)
    pub file: PathBuf,

    /// Build and print the batch without saving it
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}
