//! Reference dataset acquisition
//!
//! Datasets are plain git checkouts. A dataset whose directory already exists
//! is left alone; a failed clone is reported and the batch goes on.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{ExternalCommand, ExternalError};
use crate::storage::DatasetConfig;

/// Retrieves a dataset into its directory
pub trait DatasetFetcher {
    fn fetch(&self, url: &str, dir: &Path) -> Result<(), ExternalError>;
}

/// Fetches datasets with `git clone`
#[derive(Debug, Clone)]
pub struct GitFetcher {
    command: ExternalCommand,
}

impl GitFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            command: ExternalCommand::new(program).with_args(["clone", "{url}", "{dir}"]),
        }
    }
}

impl DatasetFetcher for GitFetcher {
    fn fetch(&self, url: &str, dir: &Path) -> Result<(), ExternalError> {
        let dir = dir.to_string_lossy();
        self.command.run(&[("url", url), ("dir", &*dir)])?;
        Ok(())
    }
}

/// What happened to one dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcquisitionStatus {
    Present,
    Fetched,
    Failed { reason: String },
}

/// Outcome for one dataset
#[derive(Debug, Clone, Serialize)]
pub struct Acquisition {
    pub name: String,
    pub dir: PathBuf,
    #[serde(flatten)]
    pub status: AcquisitionStatus,
}

impl Acquisition {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, AcquisitionStatus::Failed { .. })
    }
}

/// Makes sure every dataset exists locally, fetching the missing ones
///
/// Paths in `datasets` are resolved against `base`.
pub fn ensure_datasets(
    datasets: &[DatasetConfig],
    base: &Path,
    fetcher: &dyn DatasetFetcher,
) -> Vec<Acquisition> {
    datasets
        .iter()
        .map(|dataset| {
            let dir = base.join(&dataset.dir);
            let status = if dir.is_dir() {
                log::debug!("{} already present at {}", dataset.name, dir.display());
                AcquisitionStatus::Present
            } else {
                log::info!("Downloading {}...", dataset.name);
                match fetcher.fetch(&dataset.url, &dir) {
                    Ok(()) => AcquisitionStatus::Fetched,
                    Err(e) => {
                        log::warn!("Failed to fetch {}: {}", dataset.name, e);
                        AcquisitionStatus::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            };
            Acquisition {
                name: dataset.name.clone(),
                dir,
                status,
            }
        })
        .collect()
}
