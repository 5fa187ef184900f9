//! Boundary to the external source-extraction engine.
//!
//! The numerical engine (component extraction, deconvolution, classifier) is
//! a black box. The [`AnalysisEngine`] trait is the whole surface this crate
//! relies on: one-time initialization against a partially written movie, a
//! post-hoc classifier re-score, and the long-running streaming fit. The
//! production implementation ([`worker::WorkerEngine`]) drives an external
//! worker process over line-delimited JSON; tests substitute scripted stubs.

pub mod codec;
pub mod worker;

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

use crate::session::SessionConfig;
use crate::Result;

/// Outcome of the engine's initialization phase.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InitSummary {
    /// Number of components detected from the initialization batch.
    pub components: u32,
}

/// Outcome of a classifier re-score over already-detected components.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RescoreSummary {
    /// Components accepted at the new threshold.
    pub accepted: u32,
    /// Components rejected at the new threshold.
    pub rejected: u32,
}

/// Outcome of the streaming phase, reported once the frame supply is
/// exhausted.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StreamSummary {
    /// Total frames consumed across all epochs.
    pub frames_processed: u64,
    /// Component count at the end of the run.
    pub components: u32,
}

/// Black-box interface to the online analysis engine.
///
/// An engine owns all accumulated algorithm state (components, traces,
/// background model); its state is mutated in place by each phase and lives
/// until the value is dropped at process exit. There is no cancellation:
/// once a phase starts, the only way to stop it is process termination.
pub trait AnalysisEngine: Send {
    /// Run the one-time model bootstrap against the current movie contents.
    ///
    /// Long-running and unbounded; the movie may still be growing while this
    /// executes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) with the
    /// engine's diagnostic detail on internal failure (no components found,
    /// malformed or too-short movie).
    fn initialize(&mut self) -> Pin<Box<dyn Future<Output = Result<InitSummary>> + Send + '_>>;

    /// Re-score already-detected components at a different classifier
    /// acceptance threshold, without re-running initialization.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the worker
    /// rejects the request or the transport fails.
    fn rescore(
        &mut self,
        threshold: f64,
    ) -> Pin<Box<dyn Future<Output = Result<RescoreSummary>> + Send + '_>>;

    /// Run the incremental streaming fit over frames as they arrive.
    ///
    /// Blocks until the source movie's frame supply is exhausted or the
    /// engine decides to stop.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) on mid-run
    /// failure; partial results are not guaranteed recoverable.
    fn fit_online(&mut self) -> Pin<Box<dyn Future<Output = Result<StreamSummary>> + Send + '_>>;
}

/// Constructs an engine for a finalized session configuration.
///
/// Splitting construction behind a trait lets the orchestration driver run
/// against a scripted engine in tests while production launches the worker
/// process.
pub trait EngineFactory: Send + Sync {
    /// Build an engine instance bound to `config`.
    ///
    /// Construction is side-effect-free with respect to the signalling
    /// channels and the movie file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the engine
    /// cannot be brought up or refuses the parameter bundle.
    fn construct<'a>(
        &'a self,
        config: &'a SessionConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn AnalysisEngine>>> + Send + 'a>>;
}
