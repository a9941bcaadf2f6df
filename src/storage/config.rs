//! Configuration handling for omr-eval
//!
//! Configuration is read from, in order of preference:
//! 1. the path given with `--config`
//! 2. `omr-eval.toml` in the current directory
//! 3. `config.toml` in the global config directory (e.g. `~/.config/omr-eval/`)
//!
//! Every field has a default, so a missing file or a partial one is fine.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AlignStrategy, DEFAULT_GROUP_SIZE};

/// Name of the project-local config file
pub const CONFIG_FILE: &str = "omr-eval.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Fragment sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Maximum measures per fragment
    pub group_size: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
        }
    }
}

/// Folder preparation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    /// Marker file written once a folder has been split and rendered
    pub marker: String,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            marker: "prepare_done.txt".to_string(),
        }
    }
}

/// Score renderer invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Executable to run
    pub program: String,

    /// Arguments; `{input}` and `{output}` are substituted
    pub args: Vec<String>,

    /// Kill the renderer after this many seconds
    pub timeout_secs: Option<u64>,

    /// Extra attempts after a failed invocation
    pub retries: u32,

    /// Suffix the renderer appends to the image stem (page number)
    pub page_suffix: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        let program = if cfg!(windows) {
            r"C:\Program Files\MuseScore 4\bin\MuseScore4.exe"
        } else {
            "musescore"
        };
        Self {
            program: program.to_string(),
            args: vec!["{input}".into(), "-o".into(), "{output}".into()],
            timeout_secs: Some(300),
            retries: 0,
            page_suffix: "-1".to_string(),
        }
    }
}

/// OMR engine invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Executable to run
    pub program: String,

    /// Arguments; `{input}` and `{output}` are substituted
    pub args: Vec<String>,

    /// Kill the recognizer after this many seconds
    pub timeout_secs: Option<u64>,

    /// Extra attempts after a failed invocation
    pub retries: u32,

    /// Extension of the document written next to the image
    pub output_extension: String,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            program: "oemer".to_string(),
            args: vec!["--use-tf".into(), "{input}".into()],
            timeout_secs: Some(600),
            retries: 0,
            output_extension: "musicxml".to_string(),
        }
    }
}

/// Scoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    pub strategy: AlignStrategy,
}

/// Git used to fetch reference datasets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub program: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

/// A reference dataset cloned on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub url: String,
    /// Local checkout directory, relative to the working directory
    pub dir: PathBuf,
}

impl DatasetConfig {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            dir: PathBuf::from(name),
        }
    }
}

fn default_datasets() -> Vec<DatasetConfig> {
    vec![
        DatasetConfig::new("StringQuartets", "https://github.com/OpenScore/StringQuartets"),
        DatasetConfig::new("Lieder", "https://github.com/OpenScore/Lieder"),
    ]
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder evaluated by `run`
    pub folder: PathBuf,

    /// Fragments processed concurrently
    pub jobs: usize,

    pub split: SplitConfig,
    pub prepare: PrepareConfig,
    pub renderer: RendererConfig,
    pub recognizer: RecognizerConfig,
    pub compare: CompareConfig,
    pub git: GitConfig,
    pub datasets: Vec<DatasetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("Lieder/scores/Barnby,_Joseph/"),
            jobs: 1,
            split: SplitConfig::default(),
            prepare: PrepareConfig::default(),
            renderer: RendererConfig::default(),
            recognizer: RecognizerConfig::default(),
            compare: CompareConfig::default(),
            git: GitConfig::default(),
            datasets: default_datasets(),
        }
    }
}

impl Config {
    /// Loads configuration from an explicit path or the default locations
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::locate() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Finds the config file to use when none is given explicitly
    pub fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }

        let global = Self::global_config_dir()?.join("config.toml");
        global.is_file().then_some(global)
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "omr-eval", "omr-eval").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Reads and validates a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to load config: {}", path.display()))?;
        Ok(config)
    }

    /// Parses and validates TOML content
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.split.group_size == 0 {
            return Err(ConfigError::Invalid("split.group_size must be at least 1".into()));
        }
        if self.jobs == 0 {
            return Err(ConfigError::Invalid("jobs must be at least 1".into()));
        }
        if self.prepare.marker.trim().is_empty() {
            return Err(ConfigError::Invalid("prepare.marker must not be empty".into()));
        }
        if self.renderer.program.is_empty() || self.recognizer.program.is_empty() {
            return Err(ConfigError::Invalid("renderer and recognizer programs must be set".into()));
        }
        Ok(())
    }

    /// Renders the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Writes the configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config::default();

        assert_eq!(config.split.group_size, 4);
        assert_eq!(config.jobs, 1);
        assert_eq!(config.prepare.marker, "prepare_done.txt");
        assert_eq!(config.recognizer.output_extension, "musicxml");
        assert_eq!(config.compare.strategy, AlignStrategy::Lcs);
        assert_eq!(config.datasets.len(), 2);
        assert_eq!(config.datasets[1].dir, PathBuf::from("Lieder"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
folder = "scores"
jobs = 4

[split]
group_size = 2

[compare]
strategy = "matching-blocks"

[recognizer]
program = "my-omr"
args = ["{input}", "{output}"]
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.folder, PathBuf::from("scores"));
        assert_eq!(config.jobs, 4);
        assert_eq!(config.split.group_size, 2);
        assert_eq!(config.compare.strategy, AlignStrategy::MatchingBlocks);
        assert_eq!(config.recognizer.program, "my-omr");
        // Untouched sections keep their defaults
        assert_eq!(config.recognizer.output_extension, "musicxml");
        assert_eq!(config.renderer.page_suffix, "-1");
    }

    #[test]
    fn parse_datasets() {
        let toml = r#"
[[datasets]]
name = "Local"
url = "https://example.com/local.git"
dir = "data/local"
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.datasets.len(), 1);
        assert_eq!(config.datasets[0].dir, PathBuf::from("data/local"));
    }

    #[test]
    fn zero_group_size_is_invalid() {
        let err = Config::parse("[split]\ngroup_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_jobs_is_invalid() {
        assert!(matches!(Config::parse("jobs = 0\n"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(Config::parse("jobs = ["), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.jobs = 3;
        config.renderer.timeout_secs = Some(42);
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.jobs, 3);
        assert_eq!(loaded.renderer.timeout_secs, Some(42));
        assert_eq!(loaded.datasets, config.datasets);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
