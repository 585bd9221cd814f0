//! Config subcommand implementation.

use crate::config::{AppSettings, Paths};
use crate::output;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Show or initialise settings.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings as JSON
    Show,

    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(
        &self,
        settings: &AppSettings,
        path: Option<&PathBuf>,
        quiet: bool,
    ) -> anyhow::Result<()> {
        match &self.action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(settings)?;
                println!("{}", json);
                Ok(())
            }
            ConfigAction::Init { force } => {
                let file = match path {
                    Some(p) => p.clone(),
                    None => Paths::get()?.settings_file(),
                };
                let written = init_settings(&file, *force)?;
                if !quiet {
                    output::print_success(&format!("wrote {}", written.display()));
                }
                Ok(())
            }
        }
    }
}

fn init_settings(file: &PathBuf, force: bool) -> anyhow::Result<PathBuf> {
    if file.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            file.display()
        );
    }
    AppSettings::default()
        .save_to(file)
        .with_context(|| format!("could not initialise {}", file.display()))?;
    Ok(file.clone())
}
