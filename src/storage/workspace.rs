//! Evaluation folder layout
//!
//! A prepared folder looks like this:
//!
//! ```text
//! Barnby,_Joseph/
//! ├── Sweet_and_Low/
//! │   ├── lc1234.mscx          # source score (reference)
//! │   ├── split_0.mscx         # fragments, one per split
//! │   ├── split_0-1.png        # rendered fragment
//! │   ├── split_0-1.musicxml   # recognition result
//! │   └── ...
//! └── prepare_done.txt         # marker: splitting and rendering finished
//! ```
//!
//! The marker is only a hint. Deleting it forces the folder to be prepared
//! again.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{glob, Pattern};

use crate::domain::ScoreDocument;

use super::mscx;

/// File name prefix shared by all fragments
pub const FRAGMENT_PREFIX: &str = "split_";

/// Decides whether a folder still needs preparation
pub trait PreparedMarker: Send + Sync {
    /// Returns true if the folder was fully prepared before
    fn is_prepared(&self, folder: &Path) -> bool;

    /// Records that the folder is prepared
    fn mark(&self, folder: &Path) -> Result<()>;

    /// Forgets an earlier preparation
    fn clear(&self, folder: &Path) -> Result<()>;
}

/// Marker stored as a fixed-name file inside the folder
#[derive(Debug, Clone)]
pub struct MarkerFile {
    name: String,
}

impl MarkerFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn path(&self, folder: &Path) -> PathBuf {
        folder.join(&self.name)
    }
}

impl PreparedMarker for MarkerFile {
    fn is_prepared(&self, folder: &Path) -> bool {
        self.path(folder).is_file()
    }

    fn mark(&self, folder: &Path) -> Result<()> {
        let path = self.path(folder);
        fs::write(&path, "done")
            .with_context(|| format!("Failed to write marker: {}", path.display()))
    }

    fn clear(&self, folder: &Path) -> Result<()> {
        let path = self.path(folder);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove marker: {}", path.display()))?;
        }
        Ok(())
    }
}

/// Returns true if the file is a fragment produced by a split
pub fn is_fragment(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(FRAGMENT_PREFIX))
        .unwrap_or(false)
}

/// Path of fragment `index` of `source`: `split_{index}.mscx` next to it
pub fn fragment_path(source: &Path, index: usize) -> PathBuf {
    source.with_file_name(format!("{}{}.mscx", FRAGMENT_PREFIX, index))
}

/// Reference fragment for a rendered image
///
/// `split_3-1.png` becomes `split_3.mscx`: the extension is replaced and the
/// renderer's page suffix, if present, is dropped.
pub fn reference_for_image(image: &Path, page_suffix: &str) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = if page_suffix.is_empty() {
        stem.as_str()
    } else {
        stem.strip_suffix(page_suffix).unwrap_or(&stem)
    };
    image.with_file_name(format!("{}.mscx", stem))
}

/// Source scores below `folder`, fragments excluded, sorted
pub fn source_scores(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = find(folder, "**/*.mscx")?;
    files.retain(|f| !is_fragment(f));
    Ok(files)
}

/// Rendered fragment images below `folder`, sorted
pub fn scan_images(folder: &Path) -> Result<Vec<PathBuf>> {
    find(folder, &format!("**/{}*.png", FRAGMENT_PREFIX))
}

/// Writes fragments of `source` next to it, returning their paths in split order
pub fn write_fragments(source: &Path, fragments: &[ScoreDocument]) -> Result<Vec<PathBuf>> {
    fragments
        .iter()
        .enumerate()
        .map(|(index, fragment)| {
            let path = fragment_path(source, index);
            mscx::write_file(&path, fragment)
                .with_context(|| format!("Failed to write fragment {}", path.display()))?;
            Ok(path)
        })
        .collect()
}

fn find(folder: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        Pattern::escape(&folder.to_string_lossy()),
        pattern
    );
    let mut files = Vec::new();
    for entry in glob(&full).with_context(|| format!("Invalid glob pattern: {}", full))? {
        let path = entry.with_context(|| format!("Error resolving pattern: {}", full))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
