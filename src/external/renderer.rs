//! Score rendering

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ExternalCommand, ExternalError};
use crate::storage::RendererConfig;

/// Turns a fragment file into an image
pub trait Renderer: Send + Sync {
    /// Renders `fragment` and returns the path of the produced image
    fn render(&self, fragment: &Path) -> Result<PathBuf, ExternalError>;
}

/// Renderer backed by an external program (MuseScore by default)
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    command: ExternalCommand,
    page_suffix: String,
}

impl CommandRenderer {
    pub fn new(command: ExternalCommand, page_suffix: impl Into<String>) -> Self {
        Self {
            command,
            page_suffix: page_suffix.into(),
        }
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        let command = ExternalCommand::new(&config.program)
            .with_args(config.args.iter().cloned())
            .with_timeout(config.timeout_secs.map(Duration::from_secs))
            .with_retries(config.retries);
        Self::new(command, config.page_suffix.clone())
    }

    /// Image path requested from the renderer: the fragment with a `.png` extension
    pub fn image_path(fragment: &Path) -> PathBuf {
        fragment.with_extension("png")
    }

    /// Image path when the renderer numbers pages, e.g. `split_0-1.png`
    fn paged_image_path(&self, fragment: &Path) -> Option<PathBuf> {
        let stem = fragment.file_stem()?.to_string_lossy();
        Some(fragment.with_file_name(format!("{}{}.png", stem, self.page_suffix)))
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, fragment: &Path) -> Result<PathBuf, ExternalError> {
        let image = Self::image_path(fragment);
        self.command.run_on(fragment, &image)?;
        log::info!("Converted {} to {}", fragment.display(), image.display());

        if let Some(paged) = self.paged_image_path(fragment).filter(|p| p.is_file()) {
            return Ok(paged);
        }
        if image.is_file() {
            return Ok(image);
        }
        Err(ExternalError::MissingOutput(image))
    }
}
