//! # Evaluation Pipeline
//!
//! Ties the domain and the external tools together:
//!
//! ```text
//! folder ─▶ Preparer ─▶ split_{i}.mscx ─▶ Renderer ─▶ split_{i}-1.png
//!                                                          │
//!      Evaluator ◀─ reference split_{i}.mscx ◀─────────────┤
//!          │                                               ▼
//!          └──────── recognized document ◀──────────── Recognizer
//! ```
//!
//! Failures of a single source score or fragment are recorded as a
//! [`Failure`] and never abort the batch. Only problems with the folder
//! itself (missing, unwritable) are returned as errors.

mod evaluate;
mod prepare;
mod report;

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

pub use evaluate::{compare_files, Comparison, Evaluator, FragmentOutcome, FragmentStatus};
pub use prepare::{split_score, Preparation, Preparer};
pub use report::{evaluate_folder, EvaluationSummary};

/// Stage a hard failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A reference dataset could not be fetched
    Acquisition,
    /// The renderer failed or produced no image
    Rendering,
    /// The recognizer failed or produced no document
    Recognition,
    /// A score, fragment or recognized document could not be read
    Parse,
}

impl FailureKind {
    pub fn as_str(&self) -> &str {
        match self {
            FailureKind::Acquisition => "acquisition",
            FailureKind::Rendering => "rendering",
            FailureKind::Recognition => "recognition",
            FailureKind::Parse => "parse",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hard failure tied to the file it happened on
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub path: PathBuf,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        let failure = Self {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        };
        log::warn!("{} failure on {}: {}", failure.kind, failure.path.display(), failure.reason);
        failure
    }
}

/// Hard failures by stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub acquisition: usize,
    pub rendering: usize,
    pub recognition: usize,
    pub parse: usize,
}

impl FailureCounts {
    pub fn add(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::Acquisition => self.acquisition += 1,
            FailureKind::Rendering => self.rendering += 1,
            FailureKind::Recognition => self.recognition += 1,
            FailureKind::Parse => self.parse += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.acquisition + self.rendering + self.recognition + self.parse
    }

    pub fn get(&self, kind: FailureKind) -> usize {
        match kind {
            FailureKind::Acquisition => self.acquisition,
            FailureKind::Rendering => self.rendering,
            FailureKind::Recognition => self.recognition,
            FailureKind::Parse => self.parse,
        }
    }
}

/// Bounded pool for fragment-level work; one job means sequential
fn worker_pool(jobs: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to start worker pool")
}
