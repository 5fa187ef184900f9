//! Global configuration parsing and validation.
//!
//! Everything the original deployment hard-coded — pipe paths, the results
//! directory, the worker command, the review threshold, the full engine
//! parameter surface — lives in one TOML file supplied at startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::session::params::EngineParams;
use crate::{AppError, Result};

/// Filesystem paths of the two named channels.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ChannelConfig {
    /// Analyzer→Controller FIFO (carries the ready signal).
    #[serde(default = "default_to_controller")]
    pub to_controller: PathBuf,
    /// Controller→Analyzer FIFO (carries the filename and trigger tokens).
    #[serde(default = "default_from_controller")]
    pub from_controller: PathBuf,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            to_controller: default_to_controller(),
            from_controller: default_from_controller(),
        }
    }
}

fn default_to_controller() -> PathBuf {
    PathBuf::from("/tmp/getPipeMMCaImAn.ser")
}

fn default_from_controller() -> PathBuf {
    PathBuf::from("/tmp/sendPipeMMCaImAn.ser")
}

/// Launch settings for the external engine worker process.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Worker executable (e.g. `python3`).
    pub command: String,
    /// Arguments passed to the worker before it starts listening.
    #[serde(default)]
    pub args: Vec<String>,
    /// Maximum time to wait for the worker's ready event.
    #[serde(default = "default_startup_timeout_seconds")]
    pub startup_timeout_seconds: u64,
}

impl WorkerConfig {
    /// Startup timeout as a [`Duration`].
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_seconds)
    }
}

fn default_startup_timeout_seconds() -> u64 {
    120
}

/// Settings for the post-initialization review pause.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ReviewConfig {
    /// Skip the interactive pause and continue immediately.
    #[serde(default)]
    pub auto: bool,
    /// Classifier threshold applied for the review pass when the CNN
    /// classifier is enabled. Deliberately near zero so the operator sees
    /// every plausible component before deciding.
    #[serde(default = "default_classifier_threshold")]
    pub classifier_threshold: f64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            auto: false,
            classifier_threshold: default_classifier_threshold(),
        }
    }
}

fn default_classifier_threshold() -> f64 {
    0.000_01
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Directory under which the acquisition software writes each session's
    /// movie.
    pub results_dir: PathBuf,
    /// Named channel paths.
    #[serde(default)]
    pub channels: ChannelConfig,
    /// Engine worker launch settings.
    pub worker: WorkerConfig,
    /// Review pause behavior.
    #[serde(default)]
    pub review: ReviewConfig,
    /// Engine parameter surface (frame rate and decay time are required).
    pub params: EngineParams,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.results_dir.as_os_str().is_empty() {
            return Err(AppError::Config("results_dir must not be empty".into()));
        }
        if self.channels.to_controller == self.channels.from_controller {
            return Err(AppError::Config(
                "to_controller and from_controller must be distinct paths".into(),
            ));
        }
        if self.worker.command.is_empty() {
            return Err(AppError::Config("worker.command must not be empty".into()));
        }
        if self.worker.startup_timeout_seconds == 0 {
            return Err(AppError::Config(
                "worker.startup_timeout_seconds must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.review.classifier_threshold) {
            return Err(AppError::Config(
                "review.classifier_threshold must be in [0, 1]".into(),
            ));
        }
        self.params.validate()
    }
}
