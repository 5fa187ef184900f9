//! Named-FIFO channel transport.
//!
//! Each exchange is a fresh open/read/close (or open/write/close) cycle:
//! FIFOs only support strict reader/writer pairing, and the handshake cadence
//! is low-frequency and explicitly staged, so no connection is kept open
//! between phases. Opening either end blocks until the peer opens the other,
//! which is exactly the rendezvous the protocol relies on.
//!
//! All blocking opens, reads, and writes run on the tokio blocking pool so
//! the async executor is never stalled by a peer that has not attached yet.

use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::{debug, info};

use crate::channel::MessageChannel;
use crate::{AppError, Result};

/// Ensure a fresh, empty FIFO exists at `path`.
///
/// A stale entry from a prior run — FIFO or not — is removed first, so a
/// crashed session never leaves the next launch reading leftover bytes. The
/// FIFO persists after process exit; operators should expect idempotent
/// re-creation on every start.
///
/// # Errors
///
/// Returns [`AppError::Channel`] if the stale entry cannot be removed or the
/// FIFO cannot be created (permissions, unsupported filesystem).
pub fn ensure_fifo(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path).map_err(|err| {
            AppError::Channel(format!(
                "cannot remove stale entry at {}: {err}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), "removed stale channel entry");
    }

    mkfifo(path, Mode::from_bits_truncate(0o666)).map_err(|err| {
        AppError::Channel(format!("cannot create fifo at {}: {err}", path.display()))
    })?;

    info!(path = %path.display(), "channel fifo ready");
    Ok(())
}

/// One named FIFO, one direction.
///
/// The struct holds only the path; the FIFO is opened anew for every message
/// so the reader/writer pairing resets between protocol phases.
#[derive(Debug, Clone)]
pub struct FifoChannel {
    path: PathBuf,
}

impl FifoChannel {
    /// Create a channel handle for the FIFO at `path`.
    ///
    /// Does not touch the filesystem; call
    /// [`prepare`](MessageChannel::prepare) before the first exchange.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Filesystem path of the backing FIFO.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageChannel for FifoChannel {
    fn prepare(&self) -> Result<()> {
        ensure_fifo(&self.path)
    }

    fn recv_line(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let path = self.path.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || read_one_line(&path))
                .await
                .map_err(|err| AppError::Io(format!("blocking read task failed: {err}")))?
        })
    }

    fn send_line(&self, line: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let path = self.path.clone();
        let line = line.to_owned();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || write_one_line(&path, &line))
                .await
                .map_err(|err| AppError::Io(format!("blocking write task failed: {err}")))?
        })
    }
}

/// Open the read end (blocks until a writer attaches) and read one line.
fn read_one_line(path: &Path) -> Result<String> {
    let file = File::open(path)
        .map_err(|err| AppError::Io(format!("cannot open {} for reading: {err}", path.display())))?;
    let mut reader = BufReader::new(file);

    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .map_err(|err| AppError::Io(format!("read from {} failed: {err}", path.display())))?;

    if n == 0 {
        return Err(AppError::Channel(format!(
            "peer closed {} without sending a message",
            path.display()
        )));
    }

    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Open the write end (blocks until a reader attaches), write `line\n`, flush.
fn write_one_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|err| AppError::Io(format!("cannot open {} for writing: {err}", path.display())))?;

    file.write_all(line.as_bytes())
        .and_then(|()| file.write_all(b"\n"))
        .and_then(|()| file.flush())
        .map_err(|err| AppError::Io(format!("write to {} failed: {err}", path.display())))
}
