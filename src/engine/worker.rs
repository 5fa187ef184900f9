//! Engine worker process adapter.
//!
//! Spawns the external numerical engine as a child process with:
//! - `kill_on_drop(true)` so a dying Analyzer never leaves an orphaned
//!   worker chewing on the movie.
//! - `env_clear()` + a small allowlist, so only the variables a Python
//!   scientific stack needs reach the child.
//! - A configurable startup timeout: if the worker does not emit its
//!   `ready` event within the window, the process is killed and
//!   `AppError::Engine("startup timeout …")` is returned.
//!
//! ## Wire protocol
//!
//! Requests (one JSON object per line on the worker's stdin):
//! ```json
//! {"op": "configure", "bundle": { "fnames": "…", "fr": 40.0, … }}
//! {"op": "initialize"}
//! {"op": "rescore", "threshold": 0.00001}
//! {"op": "stream"}
//! ```
//!
//! Events (one JSON object per line on the worker's stdout):
//! ```json
//! {"event": "ready"}
//! {"event": "configured"}
//! {"event": "initialized", "components": 3}
//! {"event": "rescored", "accepted": 2, "rejected": 1}
//! {"event": "done", "frames_processed": 12000, "components": 3}
//! {"event": "log", "message": "…"}
//! {"event": "progress", "frame": 4096}
//! {"event": "error", "message": "…"}
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::engine::codec::EngineCodec;
use crate::engine::{AnalysisEngine, EngineFactory, InitSummary, RescoreSummary, StreamSummary};
use crate::session::SessionConfig;
use crate::{AppError, Result};

/// Environment variables inherited by the spawned worker process.
///
/// Everything else is stripped via `env_clear()` before launch. The list
/// covers what a Python scientific stack needs to locate its interpreter and
/// environments.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "LANG",
    "TMPDIR",
    "PYTHONPATH",
    "VIRTUAL_ENV",
    "CONDA_PREFIX",
    "CONDA_DEFAULT_ENV",
];

/// Launches [`WorkerEngine`] instances from the deployment's worker command.
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    config: WorkerConfig,
}

impl WorkerLauncher {
    /// Create a launcher for the configured worker command.
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }
}

impl EngineFactory for WorkerLauncher {
    fn construct<'a>(
        &'a self,
        config: &'a SessionConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn AnalysisEngine>>> + Send + 'a>> {
        Box::pin(async move {
            let engine = WorkerEngine::spawn(&self.config, config).await?;
            Ok(Box::new(engine) as Box<dyn AnalysisEngine>)
        })
    }
}

/// Active connection to a spawned engine worker process.
///
/// The child has `kill_on_drop(true)`; dropping the engine terminates the
/// worker and with it all accumulated algorithm state.
#[derive(Debug)]
pub struct WorkerEngine {
    /// Child process handle — kept alive so `kill_on_drop` works.
    _child: Child,
    stdin: ChildStdin,
    stdout: FramedRead<ChildStdout, EngineCodec>,
}

impl WorkerEngine {
    /// Spawn the worker, wait for its `ready` event, and send the parameter
    /// bundle.
    ///
    /// Construction touches neither the signalling channels nor the movie
    /// file; the worker only opens the movie when `initialize` is requested.
    ///
    /// # Errors
    ///
    /// - `AppError::Engine("failed to spawn worker: …")` — OS spawn failure.
    /// - `AppError::Engine("startup timeout …")` — no `ready` event in time.
    /// - `AppError::Engine(…)` — the worker rejected the parameter bundle.
    pub async fn spawn(worker: &WorkerConfig, session: &SessionConfig) -> Result<Self> {
        let mut cmd = Command::new(&worker.command);
        for arg in &worker.args {
            cmd.arg(arg);
        }

        cmd.env_clear();
        for &key in ALLOWED_ENV_VARS {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }

        cmd.stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| AppError::Engine(format!("failed to spawn worker: {err}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Engine("failed to capture worker stdin".into()))?;
        let stdout_raw = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Engine("failed to capture worker stdout".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        let mut engine = Self {
            _child: child,
            stdin,
            stdout: FramedRead::new(stdout_raw, EngineCodec::new()),
        };

        let startup = worker.startup_timeout();
        tokio::time::timeout(startup, engine.next_event("ready"))
            .await
            .map_err(|_elapsed| {
                AppError::Engine(format!(
                    "startup timeout: worker did not emit ready event within {startup:?}"
                ))
            })??;
        info!(command = %worker.command, "engine worker ready");

        let bundle = session.worker_bundle()?;
        engine
            .call(json!({ "op": "configure", "bundle": bundle }), "configured")
            .await?;
        debug!("engine worker accepted parameter bundle");

        Ok(engine)
    }

    /// Send one request line and wait for the named terminal event.
    async fn call(&mut self, request: Value, terminal: &str) -> Result<Value> {
        let mut line = request.to_string();
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|err| AppError::Engine(format!("write to worker failed: {err}")))?;

        self.next_event(terminal).await
    }

    /// Read events until the named terminal event (or an `error`) arrives.
    async fn next_event(&mut self, terminal: &str) -> Result<Value> {
        loop {
            let Some(next) = self.stdout.next().await else {
                return Err(AppError::Engine(format!(
                    "worker exited before '{terminal}' event"
                )));
            };
            let line = next?;
            let value: Value = serde_json::from_str(&line)?;

            match value.get("event").and_then(Value::as_str) {
                Some(event) if event == terminal => return Ok(value),
                Some("error") => {
                    let message = value
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("worker reported an error without detail");
                    return Err(AppError::Engine(message.to_owned()));
                }
                Some("log") => {
                    if let Some(message) = value.get("message").and_then(Value::as_str) {
                        info!(message, "worker log");
                    }
                }
                Some("progress") => {
                    if let Some(frame) = value.get("frame").and_then(Value::as_u64) {
                        debug!(frame, "worker progress");
                    }
                }
                other => {
                    debug!(event = ?other, raw = %line, "skipping unexpected worker event");
                }
            }
        }
    }
}

impl AnalysisEngine for WorkerEngine {
    fn initialize(&mut self) -> Pin<Box<dyn Future<Output = Result<InitSummary>> + Send + '_>> {
        Box::pin(async move {
            let value = self.call(json!({ "op": "initialize" }), "initialized").await?;
            Ok(serde_json::from_value(value)?)
        })
    }

    fn rescore(
        &mut self,
        threshold: f64,
    ) -> Pin<Box<dyn Future<Output = Result<RescoreSummary>> + Send + '_>> {
        Box::pin(async move {
            let value = self
                .call(json!({ "op": "rescore", "threshold": threshold }), "rescored")
                .await?;
            Ok(serde_json::from_value(value)?)
        })
    }

    fn fit_online(&mut self) -> Pin<Box<dyn Future<Output = Result<StreamSummary>> + Send + '_>> {
        Box::pin(async move {
            let value = self.call(json!({ "op": "stream" }), "done").await?;
            Ok(serde_json::from_value(value)?)
        })
    }
}

/// Forward worker stderr lines into the Analyzer's log at warn level.
async fn drain_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(line = %line, "worker stderr");
    }
}
