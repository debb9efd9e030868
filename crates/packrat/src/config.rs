//! Project configuration
//!
//! A build is described by `packrat.toml` in the project root: the entry module, the output
//! location, the default extension and the path rules selecting transform chains.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::util::normalize_path;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "packrat.toml";

/// Project configuration read from `packrat.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory containing the configuration file; module ids are relative to it
    #[serde(skip)]
    pub root: PathBuf,

    /// Entry module path, relative to the root
    pub entry: PathBuf,

    #[serde(default)]
    pub output: OutputConfig,

    /// Extension appended to `require` specifiers whose last segment has none
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Path rules selecting the transform chain of each module
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Built-in plugins applied before the first build, in order
    #[serde(default)]
    pub plugins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output directory, relative to the root; replaced as a whole on every build
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Bundle file name inside the output directory
    #[serde(default = "default_output_filename")]
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            filename: default_output_filename(),
        }
    }
}

/// A `[[rules]]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Regular expression matched against the slash-separated absolute module path
    pub test: String,

    /// Transform names; the last one runs first
    #[serde(rename = "use")]
    pub uses: Vec<String>,
}

fn default_extension() -> String {
    "js".to_owned()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("dist")
}

fn default_output_filename() -> String {
    "main.js".to_owned()
}

impl Config {
    /// Configuration for `entry` under `root` with every optional setting at its default
    pub fn new(root: impl Into<PathBuf>, entry: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entry: entry.into(),
            output: OutputConfig::default(),
            extension: default_extension(),
            rules: Vec::new(),
            plugins: Vec::new(),
        }
    }

    /// Read the configuration file at `path`; its directory becomes the project root
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve project root {}", root.display()))?;

        let config = Self::from_toml_str(&content, root)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `packrat.toml` from `dir`
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            bail!(
                "No {CONFIG_FILE_NAME} found in {}; create one with at least an `entry` key",
                dir.display()
            );
        }
        Self::load(&path)
    }

    /// Parse configuration text for a project rooted at `root`
    pub fn from_toml_str(content: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.root = root.into();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.entry.as_os_str().is_empty() {
            bail!("`entry` must not be empty");
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            bail!(
                "`extension` must be a non-empty extension without the leading dot, got '{}'",
                self.extension
            );
        }
        if self.output.filename.is_empty() {
            bail!("`output.filename` must not be empty");
        }
        Ok(())
    }

    /// Absolute path of the entry module
    pub fn entry_path(&self) -> PathBuf {
        normalize_path(&self.root.join(&self.entry))
    }

    /// Absolute path of the output directory
    pub fn output_dir(&self) -> PathBuf {
        normalize_path(&self.root.join(&self.output.path))
    }
}
