//! `template` command

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::*;

use crate::cli::GlobalArgs;
use case_importer::template::write_template;

#[derive(Args)]
pub struct TemplateCommands {
    /// Where to write the workbook (.xlsx)
    pub file: PathBuf,

    /// Replace the file if it exists
    #[arg(long)]
    pub force: bool,
}

pub fn handle_template_command(global: &GlobalArgs, args: TemplateCommands) -> Result<()> {
    if args.file.exists() && !args.force {
        anyhow::bail!(
            "File already exists: {} (use --force to replace it)",
            args.file.display()
        );
    }

    let config = global.load_config()?;
    write_template(&args.file, &config.layout)?;

    println!(
        "Template written to {}",
        args.file.display().to_string().bright_green()
    );
    Ok(())
}
