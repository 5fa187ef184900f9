#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod protocol;
pub mod session;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
