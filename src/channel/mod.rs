//! Signalling channels between the Analyzer and the acquisition Controller.
//!
//! A channel is a named, unidirectional, line-oriented message stream. The
//! production transport is a filesystem FIFO ([`fifo::FifoChannel`]); tests
//! and embedded deployments use the in-process [`memory::MemoryChannel`].
//! Both obey the same open-per-message discipline: each receive blocks until
//! the peer writes one full line, each send blocks until the peer is reading.

#[cfg(unix)]
pub mod fifo;
pub mod memory;

use std::future::Future;
use std::pin::Pin;

use crate::Result;

/// Transport-agnostic, one-line-at-a-time message channel.
///
/// Implementations must provide blocking-rendezvous semantics: `recv_line`
/// resolves only once the peer has written a complete line, and `send_line`
/// resolves only once the line has been handed to the peer's transport.
/// There is deliberately no timeout on either operation — the handshake is a
/// two-party, co-located, supervised exchange.
pub trait MessageChannel: Send + Sync {
    /// Create or reset any transport-level resource backing this channel.
    ///
    /// For FIFO channels this removes a stale filesystem entry and creates a
    /// fresh FIFO; in-process channels need no preparation. Idempotent across
    /// process restarts, which doubles as crash recovery.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Channel`](crate::AppError::Channel) if the
    /// transport resource cannot be (re)created.
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Receive exactly one line from the peer, with the terminator stripped.
    ///
    /// Blocks indefinitely until the peer connects and writes a full line.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Channel`](crate::AppError::Channel) if the peer
    /// disconnects without sending a message, or
    /// [`AppError::Io`](crate::AppError::Io) on transport failure.
    fn recv_line(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Send one line to the peer, terminated and flushed immediately.
    ///
    /// Blocks indefinitely until the peer attaches its receiving end.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Channel`](crate::AppError::Channel) if the peer
    /// endpoint is gone, or [`AppError::Io`](crate::AppError::Io) on
    /// transport failure.
    fn send_line(&self, line: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
