//! Handshake protocol between the Analyzer and the acquisition Controller.
//!
//! The exchange is a fixed, staged sequence of single-line messages:
//!
//! 1. Controller → Analyzer: the session identifier (free-form line).
//! 2. Controller → Analyzer: [`START_INIT_PROCESS`] once enough frames exist.
//! 3. Analyzer → Controller: [`START_STREAM_ACQUISITION`] after review.
//! 4. Controller → Analyzer: [`START_STREAM_ANALYSIS`] once acquisition
//!    continues.
//!
//! Tokens are compared verbatim and case-sensitively. Any mismatch means the
//! peer is not in the state this side expects, and a silent retry could
//! desynchronize the two processes permanently — so every mismatch is fatal
//! for the run. No NACK or resynchronization exists in this protocol.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::channel::MessageChannel;
use crate::{AppError, Result};

/// Controller→Analyzer trigger: enough frames captured, start initialization.
pub const START_INIT_PROCESS: &str = "startInitProcess";

/// Controller→Analyzer trigger: acquisition continuing, start the streaming
/// analysis phase.
pub const START_STREAM_ANALYSIS: &str = "startStreamAnalysis";

/// Analyzer→Controller ready signal: initialization reviewed, stream away.
pub const START_STREAM_ACQUISITION: &str = "startStreamAcquisition";

/// Fixed suffix the acquisition software appends to the movie it writes.
pub const MOVIE_SUFFIX: &str = "_MMStack_Default.ome.tif";

/// Receive one line and require it to equal `expected` verbatim.
///
/// # Errors
///
/// Returns [`AppError::Protocol`] when the received payload differs from the
/// expected token (including case mismatches), or the channel's own error
/// when the transport fails.
pub async fn await_token(channel: &dyn MessageChannel, expected: &str) -> Result<()> {
    let received = channel.recv_line().await?;
    if received == expected {
        debug!(token = expected, "expected token received");
        Ok(())
    } else {
        Err(AppError::Protocol(format!(
            "expected token '{expected}', received '{received}'"
        )))
    }
}

/// Receive and validate the session identifier line.
///
/// The identifier is used directly in a path join, so anything that could
/// escape the results directory is rejected here rather than trusted.
///
/// # Errors
///
/// Returns [`AppError::Protocol`] when the identifier is empty, is a `.` /
/// `..` component, or contains a path separator or NUL byte.
pub async fn recv_session_id(channel: &dyn MessageChannel) -> Result<String> {
    let id = channel.recv_line().await?;
    validate_session_id(&id)?;
    debug!(session_id = %id, "session identifier received");
    Ok(id)
}

/// Send the ready signal to the Controller.
///
/// # Errors
///
/// Propagates the channel's transport error.
pub async fn send_ready(channel: &dyn MessageChannel) -> Result<()> {
    channel.send_line(START_STREAM_ACQUISITION).await
}

/// Derive the movie path for a session under the results directory.
///
/// Layout follows the acquisition software's convention:
/// `<results_dir>/<id>/<id>_MMStack_Default.ome.tif`.
#[must_use]
pub fn derive_movie_path(results_dir: &Path, session_id: &str) -> PathBuf {
    results_dir
        .join(session_id)
        .join(format!("{session_id}{MOVIE_SUFFIX}"))
}

/// Reject identifiers that could traverse outside the results directory.
fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(AppError::Protocol("empty session identifier".into()));
    }
    if id == "." || id == ".." {
        return Err(AppError::Protocol(format!(
            "session identifier '{id}' is a path component"
        )));
    }
    if id.contains('/') || id.contains('\\') || id.contains('\0') {
        return Err(AppError::Protocol(format!(
            "session identifier '{id}' contains a path separator"
        )));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
