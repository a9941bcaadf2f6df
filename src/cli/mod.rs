//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Batch | Whole-folder evaluation | `run`, `fetch`, `prepare` |
//! | Inspect | One file at a time | `plan`, `split`, `tokens`, `compare` |
//! | Config | Configuration file | `config show`, `config init` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Progress is logged to stderr; set `RUST_LOG` to tune it.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug logging:
//! ```bash
//! omr-eval --verbose run --skip-fetch
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod batch;
mod inspect;
mod config_cmd;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
