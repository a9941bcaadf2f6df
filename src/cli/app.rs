//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{batch, config_cmd, inspect};
use crate::domain::AlignStrategy;
use crate::storage::Config;

#[derive(Parser)]
#[command(name = "omr-eval")]
#[command(author, version, about = "Evaluate optical music recognition against reference scores")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Config file (defaults to ./omr-eval.toml, then the global config)
    #[arg(long, short = 'c', global = true, env = "OMR_EVAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch datasets, prepare a folder, then recognize and score every fragment
    Run {
        /// Folder to evaluate (defaults to the configured folder)
        #[arg(long)]
        folder: Option<PathBuf>,

        /// Do not clone missing datasets
        #[arg(long)]
        skip_fetch: bool,

        /// Prepare again even if the folder is marked as prepared
        #[arg(long)]
        force: bool,

        /// Fragments processed concurrently
        #[arg(long, short = 'j')]
        jobs: Option<usize>,
    },

    /// Clone reference datasets that are not present yet
    Fetch,

    /// Split every score in a folder and render the fragments
    Prepare {
        /// Folder to prepare (defaults to the configured folder)
        folder: Option<PathBuf>,

        /// Prepare again even if the folder is marked as prepared
        #[arg(long)]
        force: bool,

        /// Fragments rendered concurrently
        #[arg(long, short = 'j')]
        jobs: Option<usize>,
    },

    /// Show how a score would be split
    Plan {
        /// Score file (.mscx)
        file: PathBuf,
    },

    /// Write the fragments of a score next to it, without rendering
    Split {
        /// Score file (.mscx)
        file: PathBuf,
    },

    /// Print the token sequence of a score
    Tokens {
        /// Score file (.mscx)
        file: PathBuf,
    },

    /// Score a recognized document against its reference
    Compare {
        /// Recognized document
        result: PathBuf,

        /// Reference document
        reference: PathBuf,

        /// Alignment strategy (defaults to the configured one)
        #[arg(long, short = 's')]
        strategy: Option<AlignStrategy>,
    },

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(config_cmd::ConfigCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = Output::new(cli.format, cli.verbose);

    output.verbose_ctx("cli", &format!("omr-eval {} starting", env!("CARGO_PKG_VERSION")));
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run { folder, skip_fetch, force, jobs } => {
            let config = with_jobs(Config::load(config_path)?, jobs)?;
            let folder = folder.unwrap_or_else(|| config.folder.clone());
            batch::run(&output, &config, &folder, skip_fetch, force)?
        }

        Commands::Fetch => batch::fetch(&output, &Config::load(config_path)?)?,

        Commands::Prepare { folder, force, jobs } => {
            let config = with_jobs(Config::load(config_path)?, jobs)?;
            let folder = folder.unwrap_or_else(|| config.folder.clone());
            batch::prepare(&output, &config, &folder, force)?
        }

        Commands::Plan { file } => inspect::plan(&output, &Config::load(config_path)?, &file)?,
        Commands::Split { file } => inspect::split(&output, &Config::load(config_path)?, &file)?,
        Commands::Tokens { file } => inspect::tokens(&output, &file)?,

        Commands::Compare { result, reference, strategy } => {
            let strategy = match strategy {
                Some(strategy) => strategy,
                None => Config::load(config_path)?.compare.strategy,
            };
            inspect::compare(&output, &result, &reference, strategy)?
        }

        Commands::Config(cmd) => config_cmd::run(cmd, &output, config_path)?,
    }

    output.verbose_ctx("cli", "Command completed successfully");
    Ok(())
}

/// Applies a `--jobs` override
fn with_jobs(mut config: Config, jobs: Option<usize>) -> Result<Config> {
    if let Some(jobs) = jobs {
        config.jobs = jobs;
        config.validate()?;
    }
    Ok(config)
}

/// Logs to stderr at `info`, or `debug` with `--verbose`; `RUST_LOG` wins
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
