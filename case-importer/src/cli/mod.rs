//! Command-line interface

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use case_importer::config::Config;
use commands::import::ImportCommands;
use commands::list::ListCommands;
use commands::template::TemplateCommands;

#[derive(Parser)]
#[command(name = "case-importer")]
#[command(author, version, about = "Import case intake spreadsheets into the case store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: <config dir>/case-importer/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, overrides config and environment
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest the first worksheet of a workbook
    Import(ImportCommands),
    /// Show the most recently imported cases
    List(ListCommands),
    /// Write a blank intake workbook
    Template(TemplateCommands),
}

/// Settings shared by every command
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub database: Option<String>,
}

impl GlobalArgs {
    /// Config with the command-line overrides applied
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        config.apply_database_override(self.database.clone());
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let global = GlobalArgs {
        config: cli.config,
        database: cli.database,
    };

    match cli.command {
        Commands::Import(args) => {
            commands::import::handler::handle_import_command(&global, args).await
        }
        Commands::List(args) => commands::list::handle_list_command(&global, args).await,
        Commands::Template(args) => commands::template::handle_template_command(&global, args),
    }
}
