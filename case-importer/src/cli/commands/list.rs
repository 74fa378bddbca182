//! `list` command

use anyhow::Result;
use clap::Args;

use crate::cli::GlobalArgs;
use crate::cli::output::{OutputFormat, RecordRow, format_records};
use case_importer::config::repository::{self, count_cases, list_cases};

#[derive(Args)]
pub struct ListCommands {
    /// Maximum number of cases to show
    #[arg(short, long, default_value_t = 20)]
    pub limit: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub async fn handle_list_command(global: &GlobalArgs, args: ListCommands) -> Result<()> {
    let config = global.load_config()?;
    let pool = repository::connect(&config.database_url()?).await?;

    let cases = list_cases(&pool, args.limit).await?;
    let rows: Vec<RecordRow> = cases.iter().map(|c| RecordRow::from_record(None, c)).collect();
    println!("{}", format_records(&rows, args.format)?);

    if matches!(args.format, OutputFormat::Table) {
        let total = count_cases(&pool).await?;
        eprintln!("Showing {} of {} case(s)", rows.len(), total);
    }

    pool.close().await;
    Ok(())
}
