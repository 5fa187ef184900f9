//! Orchestration driver: the top-level session state machine.
//!
//! Sequences Channel Manager → wait-for-filename → configure → wait-for
//! init-trigger → initialize → review → ready signal → wait-for-stream
//! trigger → streaming. Every transition blocks on the previous one by
//! construction, so no engine phase can run before its gating message has
//! arrived. Any error — including a protocol violation — is fatal to the
//! whole session; the driver reports it and the process terminates rather
//! than retrying, since an unexpected token means the peer is not in the
//! state this side assumes.

pub mod review;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::channel::MessageChannel;
use crate::config::GlobalConfig;
use crate::driver::review::ReviewGate;
use crate::engine::{EngineFactory, StreamSummary};
use crate::protocol::{self, START_INIT_PROCESS, START_STREAM_ANALYSIS};
use crate::session::{AnalysisSession, SessionConfig};
use crate::Result;

/// Session lifecycle phases, in order.
///
/// `ReviewPending` is the one interactive suspension point; every other
/// transition is automatic. There is no recovery state: an error anywhere
/// ends the session where it stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has happened yet.
    Idle,
    /// Both channels are freshly (re)created.
    ChannelsReady,
    /// The session identifier arrived and resolved to a movie path.
    FilenameReceived,
    /// Configuration frozen and the engine constructed.
    Configured,
    /// The engine's model bootstrap completed.
    Initialized,
    /// Waiting on the operator's component review.
    ReviewPending,
    /// The ready signal went out to the Controller.
    ReadySignalSent,
    /// The long-running streaming fit is in progress.
    Streaming,
    /// The streaming fit returned; the session is over.
    Done,
}

/// Drives one recording session from channel creation to `Done`.
pub struct SessionDriver {
    results_dir: PathBuf,
    params: crate::session::params::EngineParams,
    review_threshold: f64,
    from_controller: Box<dyn MessageChannel>,
    to_controller: Box<dyn MessageChannel>,
    factory: Arc<dyn EngineFactory>,
    review: Box<dyn ReviewGate>,
    phase: Phase,
}

impl SessionDriver {
    /// Assemble a driver from configuration and its collaborators.
    ///
    /// `from_controller` and `to_controller` are the two unidirectional
    /// channels; `factory` constructs the engine once configuration is
    /// frozen; `review` supplies the human-in-the-loop pause.
    #[must_use]
    pub fn new(
        config: &GlobalConfig,
        from_controller: Box<dyn MessageChannel>,
        to_controller: Box<dyn MessageChannel>,
        factory: Arc<dyn EngineFactory>,
        review: Box<dyn ReviewGate>,
    ) -> Self {
        Self {
            results_dir: config.results_dir.clone(),
            params: config.params.clone(),
            review_threshold: config.review.classifier_threshold,
            from_controller,
            to_controller,
            factory,
            review,
            phase: Phase::Idle,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the whole session to completion.
    ///
    /// Blocks (at each stage, indefinitely) on the Controller's messages,
    /// the engine's phases, and the operator's review.
    ///
    /// # Errors
    ///
    /// Any [`AppError`](crate::AppError) from a stage ends the session; a
    /// [`Protocol`](crate::AppError::Protocol) violation is logged as a
    /// warning before it propagates, and the gated engine phase is never
    /// invoked.
    pub async fn run(&mut self) -> Result<StreamSummary> {
        let span = info_span!("session");
        async move {
            self.to_controller.prepare()?;
            self.from_controller.prepare()?;
            self.phase = Phase::ChannelsReady;
            info!("channels ready, waiting for file name");

            let session_id = protocol::recv_session_id(&*self.from_controller)
                .await
                .map_err(log_violation)?;
            let movie_path = protocol::derive_movie_path(&self.results_dir, &session_id);
            self.phase = Phase::FilenameReceived;
            info!(session_id = %session_id, movie = %movie_path.display(), "file name received");

            let config = SessionConfig::new(self.params.clone(), movie_path)?;
            let engine = self.factory.construct(&config).await?;
            let mut session = AnalysisSession::new(config, engine);
            self.phase = Phase::Configured;
            info!(
                init_batch = session.config().params().init_batch,
                "engine constructed, waiting for initialization trigger"
            );

            protocol::await_token(&*self.from_controller, START_INIT_PROCESS)
                .await
                .map_err(log_violation)?;
            let init = session.initialize().await?;
            self.phase = Phase::Initialized;

            self.phase = Phase::ReviewPending;
            if session.config().params().sniper_mode {
                // Low-threshold pass keeps clear neuron shapes visible for
                // the operator while excluding processes.
                session
                    .apply_classifier_override(self.review_threshold)
                    .await?;
            }
            if let Some(revised) = self.review.wait_for_confirmation(init.components).await? {
                session.apply_classifier_override(revised).await?;
            }

            protocol::send_ready(&*self.to_controller).await?;
            self.phase = Phase::ReadySignalSent;
            info!("ready signal sent, waiting for streaming trigger");

            protocol::await_token(&*self.from_controller, START_STREAM_ANALYSIS)
                .await
                .map_err(log_violation)?;
            self.phase = Phase::Streaming;
            info!("streaming analysis started");

            let summary = session.run_streaming().await?;
            self.phase = Phase::Done;
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}

/// Log a handshake failure before it terminates the session.
fn log_violation(err: crate::AppError) -> crate::AppError {
    warn!(%err, "handshake aborted");
    err
}
