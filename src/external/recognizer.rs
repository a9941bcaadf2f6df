//! Optical music recognition

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ExternalCommand, ExternalError};
use crate::storage::RecognizerConfig;

/// Recognizes a rendered image into a score document
pub trait Recognizer: Send + Sync {
    /// Runs recognition on `image` and returns the path of the recognized document
    fn recognize(&self, image: &Path) -> Result<PathBuf, ExternalError>;
}

/// Recognizer backed by an external OMR program (oemer by default)
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    command: ExternalCommand,
    output_extension: String,
}

impl CommandRecognizer {
    pub fn new(command: ExternalCommand, output_extension: impl Into<String>) -> Self {
        Self {
            command,
            output_extension: output_extension.into(),
        }
    }

    pub fn from_config(config: &RecognizerConfig) -> Self {
        let command = ExternalCommand::new(&config.program)
            .with_args(config.args.iter().cloned())
            .with_timeout(config.timeout_secs.map(Duration::from_secs))
            .with_retries(config.retries);
        Self::new(command, config.output_extension.clone())
    }

    /// Where the recognized document is expected: next to the image
    pub fn output_path(&self, image: &Path) -> PathBuf {
        image.with_extension(&self.output_extension)
    }
}

impl Recognizer for CommandRecognizer {
    fn recognize(&self, image: &Path) -> Result<PathBuf, ExternalError> {
        let output = self.output_path(image);
        log::info!("Running OMR on {}", image.display());
        self.command.run_on(image, &output)?;

        if output.is_file() {
            Ok(output)
        } else {
            Err(ExternalError::MissingOutput(output))
        }
    }
}
