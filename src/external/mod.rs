//! # External Collaborators
//!
//! The evaluator drives three external programs and never links against
//! them:
//!
//! | Collaborator | Default | Input | Output |
//! |--------------|---------|-------|--------|
//! | Renderer | `musescore` | `split_N.mscx` | `split_N.png` or `split_N-1.png` |
//! | Recognizer | `oemer` | `split_N-1.png` | `split_N-1.musicxml` |
//! | Dataset fetch | `git clone` | repository URL | checkout directory |
//!
//! Each collaborator is a trait so the pipeline can run against fakes in
//! tests; the command-backed implementations go through [`ExternalCommand`].

mod process;
mod renderer;
mod recognizer;
mod dataset;

use std::path::PathBuf;

use thiserror::Error;

pub use process::{CapturedOutput, ExternalCommand, ProcessError};
pub use renderer::{CommandRenderer, Renderer};
pub use recognizer::{CommandRecognizer, Recognizer};
pub use dataset::{ensure_datasets, Acquisition, AcquisitionStatus, DatasetFetcher, GitFetcher};

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Expected output not found: {}", .0.display())]
    MissingOutput(PathBuf),
}
