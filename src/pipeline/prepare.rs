//! Folder preparation: split every source score and render the fragments

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use super::{worker_pool, Failure, FailureKind};
use crate::domain::Splitter;
use crate::external::Renderer;
use crate::storage::{self, mscx, PreparedMarker};

/// Result of preparing a folder
#[derive(Debug, Clone, Default, Serialize)]
pub struct Preparation {
    /// Rendered fragment images, in fragment order
    pub images: Vec<PathBuf>,
    /// Sources and fragments that could not be prepared
    pub failures: Vec<Failure>,
    /// True if an earlier preparation was reused
    pub reused: bool,
}

/// Splits and renders the scores of a folder
pub struct Preparer<'a> {
    splitter: Splitter,
    renderer: &'a dyn Renderer,
    marker: &'a dyn PreparedMarker,
    jobs: usize,
}

impl<'a> Preparer<'a> {
    pub fn new(splitter: Splitter, renderer: &'a dyn Renderer, marker: &'a dyn PreparedMarker) -> Self {
        Self {
            splitter,
            renderer,
            marker,
            jobs: 1,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Prepares `folder`, or returns the images of an earlier preparation
    ///
    /// With `force` the marker is cleared first and everything is redone.
    pub fn prepare(&self, folder: &Path, force: bool) -> Result<Preparation> {
        if !folder.is_dir() {
            bail!("Folder not found: {}", folder.display());
        }

        if force {
            self.marker.clear(folder)?;
        } else if self.marker.is_prepared(folder) {
            log::info!("{} already prepared, reusing fragment images", folder.display());
            return Ok(Preparation {
                images: storage::scan_images(folder)?,
                failures: Vec::new(),
                reused: true,
            });
        }

        let mut failures = Vec::new();
        let mut fragments = Vec::new();
        for source in storage::source_scores(folder)? {
            match split_source(&self.splitter, &source) {
                Ok(paths) => fragments.extend(paths),
                Err(SourceError::Unreadable(reason)) => {
                    failures.push(Failure::new(FailureKind::Parse, &source, reason));
                }
                Err(SourceError::Fatal(e)) => return Err(e),
            }
        }

        let rendered = worker_pool(self.jobs)?.install(|| {
            fragments
                .par_iter()
                .map(|fragment| (fragment, self.renderer.render(fragment)))
                .collect::<Vec<_>>()
        });

        let mut images = Vec::with_capacity(rendered.len());
        for (fragment, outcome) in rendered {
            match outcome {
                Ok(image) => images.push(image),
                Err(e) => failures.push(Failure::new(FailureKind::Rendering, fragment, e)),
            }
        }

        self.marker.mark(folder)?;
        log::info!(
            "Prepared {}: {} fragments, {} images",
            folder.display(),
            fragments.len(),
            images.len()
        );

        Ok(Preparation {
            images,
            failures,
            reused: false,
        })
    }
}

/// Splits one source score and writes its fragments next to it
pub fn split_score(splitter: &Splitter, source: &Path) -> Result<Vec<PathBuf>> {
    split_source(splitter, source).map_err(|e| match e {
        SourceError::Unreadable(reason) => {
            anyhow::anyhow!("Failed to split {}: {}", source.display(), reason)
        }
        SourceError::Fatal(e) => e,
    })
}

fn split_source(splitter: &Splitter, source: &Path) -> Result<Vec<PathBuf>, SourceError> {
    log::debug!("Splitting {}", source.display());
    let doc = mscx::read_file(source).map_err(|e| SourceError::Unreadable(e.to_string()))?;
    let fragments = splitter
        .fragments(&doc)
        .map_err(|e| SourceError::Unreadable(e.to_string()))?;

    storage::write_fragments(source, &fragments)
        .with_context(|| format!("Failed to write fragments of {}", source.display()))
        .map_err(SourceError::Fatal)
}

/// Unreadable sources are skipped; anything else stops preparation
enum SourceError {
    Unreadable(String),
    Fatal(anyhow::Error),
}
