//! Config CLI commands

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Subcommand;

use super::output::Output;
use crate::storage::{Config, CONFIG_FILE};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a config file with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(cmd: ConfigCommands, output: &Output, explicit: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(output, explicit),
        ConfigCommands::Init { force } => init(output, explicit, force),
    }
}

fn show(output: &Output, explicit: Option<&Path>) -> Result<()> {
    let source = explicit.map(Path::to_path_buf).or_else(Config::locate);
    output.verbose_ctx(
        "config",
        &match &source {
            Some(path) => format!("Loading {}", path.display()),
            None => "No config file found, using defaults".to_string(),
        },
    );
    let config = Config::load(explicit)?;

    if output.is_json() {
        output.data(&config);
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}

fn init(output: &Output, explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default().save(&path)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "created": true,
            "path": path.display().to_string(),
        }));
    } else {
        output.success(&format!("Wrote default configuration to {}", path.display()));
    }
    Ok(())
}
