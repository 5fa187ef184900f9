//! In-process channel transport.
//!
//! A cross-wired pair of unbounded tokio mpsc queues standing in for a FIFO
//! pair. Used by the test harness to drive the Controller side of the
//! handshake, and usable by embedded deployments that run both halves inside
//! one process.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use crate::channel::MessageChannel;
use crate::{AppError, Result};

/// One endpoint of an in-process channel pair.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: UnboundedSender<String>,
    rx: Mutex<UnboundedReceiver<String>>,
}

impl MemoryChannel {
    /// Create a connected pair of endpoints.
    ///
    /// Lines sent on one endpoint are received on the other, in order.
    /// Dropping an endpoint makes the peer's operations fail, mirroring a
    /// disconnected FIFO.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: a_tx,
                rx: Mutex::new(a_rx),
            },
            Self {
                tx: b_tx,
                rx: Mutex::new(b_rx),
            },
        )
    }
}

impl MessageChannel for MemoryChannel {
    fn recv_line(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            let mut rx = self.rx.lock().await;
            rx.recv()
                .await
                .ok_or_else(|| AppError::Channel("peer endpoint dropped".into()))
        })
    }

    fn send_line(&self, line: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let line = line.to_owned();
        Box::pin(async move {
            self.tx
                .send(line)
                .map_err(|_| AppError::Channel("peer endpoint dropped".into()))
        })
    }
}
