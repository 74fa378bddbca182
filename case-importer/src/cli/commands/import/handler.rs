//! Import command handler

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;

use super::ImportCommands;
use crate::cli::GlobalArgs;
use crate::cli::output::{RecordRow, format_case_ids, format_records, print_warnings};
use case_importer::config::repository::{self, SqliteCaseRepository};
use case_importer::intake::CalamineWorkbook;
use case_importer::services::{IngestionService, stage_workbook};

pub async fn handle_import_command(global: &GlobalArgs, args: ImportCommands) -> Result<()> {
    if !args.file.exists() {
        anyhow::bail!("Workbook does not exist: {}", args.file.display());
    }

    let config = global.load_config()?;
    let start = Instant::now();

    let workbook = CalamineWorkbook::open(&args.file)
        .with_context(|| format!("Failed to open workbook: {}", args.file.display()))?;

    if args.dry_run {
        let layout = config.layout;
        let defaults = config.defaults.clone();
        let report =
            tokio::task::spawn_blocking(move || stage_workbook(workbook, &layout, &defaults))
                .await
                .context("Staging task failed")?
                .context("Failed to read workbook")?;

        let rows: Vec<RecordRow> = report
            .batch
            .records
            .iter()
            .map(RecordRow::from_staged)
            .collect();
        println!("{}", format_records(&rows, args.format)?);
        print_warnings(&report.warnings);
        eprintln!(
            "{} {} record(s) from sheet '{}' (not saved)",
            "Staged".bright_cyan().bold(),
            report.batch.len(),
            report.sheet_name
        );
        return Ok(());
    }

    let database_url = config.database_url()?;
    let pool = repository::connect(&database_url).await?;
    let service = IngestionService::new(
        SqliteCaseRepository::new(pool),
        config.layout,
        config.defaults.clone(),
    );

    let outcome = service
        .ingest(workbook)
        .await
        .with_context(|| format!("Failed to import {}", args.file.display()))?;

    print_warnings(&outcome.warnings);

    match args.format {
        crate::cli::output::OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&outcome)
                .context("Failed to format JSON output")?;
            println!("{}", json);
        }
        format => {
            if !outcome.case_ids.is_empty() {
                println!("{}", format_case_ids(&outcome.case_ids, format)?);
            }
            eprintln!(
                "{} {} records ({:.2}s)",
                "Imported".bright_green().bold(),
                outcome.committed,
                start.elapsed().as_secs_f64()
            );
        }
    }

    service.repository().pool().close().await;
    Ok(())
}
