//! The initialization review gate.
//!
//! After initialization the operator inspects the detected components and
//! may pick a different classifier acceptance threshold before the
//! Controller is told to stream. This is the single interactive suspension
//! point in the whole session.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::{AppError, Result};

/// The human-in-the-loop pause between initialization and streaming.
pub trait ReviewGate: Send + Sync {
    /// Block until the operator confirms the initialization results.
    ///
    /// `components` is the detected component count, surfaced so the gate
    /// can present it. Returns `Some(threshold)` when the operator picked a
    /// revised classifier threshold, `None` to keep the current one.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`](crate::AppError::Io) if the confirmation
    /// source fails.
    fn wait_for_confirmation(
        &self,
        components: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Option<f64>>> + Send + '_>>;
}

/// Interactive gate reading the operator's decision from stdin.
///
/// An empty line keeps the current threshold; a number between 0 and 1
/// re-scores at that threshold; anything else is logged and treated as
/// keep-current.
#[derive(Debug, Default)]
pub struct StdinReviewGate;

impl ReviewGate for StdinReviewGate {
    fn wait_for_confirmation(
        &self,
        components: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Option<f64>>> + Send + '_>> {
        Box::pin(async move {
            info!(
                components,
                "review: press Enter to continue, or type a classifier threshold first"
            );

            let mut line = String::new();
            let mut reader = BufReader::new(tokio::io::stdin());
            reader
                .read_line(&mut line)
                .await
                .map_err(|err| AppError::Io(format!("cannot read review input: {err}")))?;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            match trimmed.parse::<f64>() {
                Ok(threshold) if (0.0..=1.0).contains(&threshold) => Ok(Some(threshold)),
                Ok(threshold) => {
                    warn!(threshold, "threshold outside [0, 1], keeping current");
                    Ok(None)
                }
                Err(_) => {
                    warn!(input = trimmed, "not a number, keeping current threshold");
                    Ok(None)
                }
            }
        })
    }
}

/// Non-interactive gate for unattended deployments: continues immediately,
/// optionally applying a fixed revised threshold.
#[derive(Debug, Default)]
pub struct AutoReviewGate {
    threshold: Option<f64>,
}

impl AutoReviewGate {
    /// Create a gate that continues immediately.
    ///
    /// `threshold`, when set, is applied as the revised classifier
    /// threshold every session.
    #[must_use]
    pub fn new(threshold: Option<f64>) -> Self {
        Self { threshold }
    }
}

impl ReviewGate for AutoReviewGate {
    fn wait_for_confirmation(
        &self,
        components: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Option<f64>>> + Send + '_>> {
        let threshold = self.threshold;
        Box::pin(async move {
            info!(components, "auto review: continuing without operator input");
            Ok(threshold)
        })
    }
}
