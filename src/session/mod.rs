//! Analysis session: finalized configuration plus the owned engine.
//!
//! A session is built exactly once per process, after the filename notice
//! resolves the movie path, and mutated in place by the initialization and
//! streaming phases. The configuration is immutable after construction save
//! for the single documented classifier-threshold override.

pub mod params;

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::Value;
use tracing::info;

use crate::engine::{AnalysisEngine, InitSummary, RescoreSummary, StreamSummary};
use crate::session::params::EngineParams;
use crate::{AppError, Result};

/// Immutable, validated configuration for one recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    params: EngineParams,
    movie_path: PathBuf,
}

impl SessionConfig {
    /// Validate `params` and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when a required parameter is missing or
    /// out of its engine-defined range.
    pub fn new(params: EngineParams, movie_path: PathBuf) -> Result<Self> {
        params.validate()?;
        Ok(Self { params, movie_path })
    }

    /// The validated engine parameters.
    #[must_use]
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Path to the growing movie file this session analyzes.
    #[must_use]
    pub fn movie_path(&self) -> &Path {
        &self.movie_path
    }

    /// Serialize the parameter bundle the engine consumes, with the movie
    /// path under the engine's `fnames` key.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if
    /// serialization fails.
    pub fn worker_bundle(&self) -> Result<Value> {
        let mut bundle = serde_json::to_value(&self.params)?;
        if let Some(map) = bundle.as_object_mut() {
            map.insert(
                "fnames".to_owned(),
                Value::String(self.movie_path.to_string_lossy().into_owned()),
            );
        }
        Ok(bundle)
    }
}

/// One recording session's analysis state: configuration plus engine.
pub struct AnalysisSession {
    config: SessionConfig,
    engine: Box<dyn AnalysisEngine>,
}

impl AnalysisSession {
    /// Wrap a constructed engine with its session configuration.
    #[must_use]
    pub fn new(config: SessionConfig, engine: Box<dyn AnalysisEngine>) -> Self {
        Self { config, engine }
    }

    /// The session's frozen configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the engine's initialization phase against the current movie
    /// contents.
    ///
    /// Long-running and CPU/GPU-bound with no defined upper bound; the
    /// movie may still be growing while this executes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Init`] carrying the engine's diagnostic detail.
    pub async fn initialize(&mut self) -> Result<InitSummary> {
        let started = Instant::now();
        let summary = self
            .engine
            .initialize()
            .await
            .map_err(|err| match err {
                AppError::Engine(msg) => AppError::Init(msg),
                other => other,
            })?;
        info!(
            components = summary.components,
            elapsed = ?started.elapsed(),
            "initialization phase complete"
        );
        Ok(summary)
    }

    /// Re-score already-detected components at `threshold` without
    /// re-running initialization.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the threshold is not a finite
    /// probability, or the engine-boundary error on transport failure.
    pub async fn apply_classifier_override(&mut self, threshold: f64) -> Result<RescoreSummary> {
        if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
            return Err(AppError::Config(format!(
                "classifier threshold {threshold} must be in [0, 1]"
            )));
        }
        let summary = self.engine.rescore(threshold).await?;
        info!(
            threshold,
            accepted = summary.accepted,
            rejected = summary.rejected,
            "classifier override applied"
        );
        Ok(summary)
    }

    /// Run the engine's streaming phase until the frame supply is exhausted.
    ///
    /// Intended to run for the duration of the recording; there is no
    /// cancellation mechanism short of process termination.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Streaming`] on mid-run failure; partial results
    /// up to the failure point are not guaranteed recoverable.
    pub async fn run_streaming(&mut self) -> Result<StreamSummary> {
        let started = Instant::now();
        let summary = self
            .engine
            .fit_online()
            .await
            .map_err(|err| match err {
                AppError::Engine(msg) => AppError::Streaming(msg),
                other => other,
            })?;
        info!(
            frames = summary.frames_processed,
            components = summary.components,
            elapsed = ?started.elapsed(),
            "streaming phase complete"
        );
        Ok(summary)
    }
}
