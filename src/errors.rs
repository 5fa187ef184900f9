//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// Every variant is fatal to the current session: the coordination core has
/// no retry loop anywhere, and errors propagate straight to the operator
/// before the process exits.
#[derive(Debug)]
pub enum AppError {
    /// A named channel could not be (re)created on the filesystem.
    Channel(String),
    /// A received handshake message did not match the expected token.
    Protocol(String),
    /// Configuration parsing or parameter validation failure.
    Config(String),
    /// Worker process spawn or wire-protocol failure at the engine boundary.
    Engine(String),
    /// The engine's initialization phase failed internally.
    Init(String),
    /// The engine's streaming phase failed mid-run.
    Streaming(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel(msg) => write!(f, "channel: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol violation: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Engine(msg) => write!(f, "engine: {msg}"),
            Self::Init(msg) => write!(f, "initialization: {msg}"),
            Self::Streaming(msg) => write!(f, "streaming: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Engine(format!("invalid worker message: {err}"))
    }
}
