//! # Storage Layer
//!
//! Files read and written by the evaluation pipeline.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Scores and fragments | MuseScore XML | `{folder}/**/*.mscx`, `split_{i}.mscx` |
//! | Rendered fragments | PNG (renderer output) | `split_{i}-1.png` |
//! | Preparation marker | Plain text | `{folder}/prepare_done.txt` |
//! | Config | TOML | `omr-eval.toml` or global `config.toml` |
//!
//! ## Key Types
//!
//! - [`ScoreDocument`](crate::domain::ScoreDocument) files via [`mscx`]
//! - [`PreparedMarker`] - Decides whether a folder needs preparing
//! - [`Config`] - Project and global configuration

pub mod mscx;
mod config;
mod workspace;

pub use config::{
    CompareConfig, Config, ConfigError, DatasetConfig, GitConfig, PrepareConfig,
    RecognizerConfig, RendererConfig, SplitConfig, CONFIG_FILE,
};
pub use mscx::MscxError;
pub use workspace::{
    fragment_path, is_fragment, reference_for_image, scan_images, source_scores,
    write_fragments, MarkerFile, PreparedMarker, FRAGMENT_PREFIX,
};
