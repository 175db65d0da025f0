//! Error types for logbridge

use thiserror::Error;

use crate::level::Level;

/// Errors returned by [`Handler::handle`](crate::Handler::handle)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("unsupported log level {0}")]
    UnsupportedLevel(Level),
}

/// Errors raised while building a logger from configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(#[from] crate::level::ParseLevelError),

    #[error("Log output I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create rolling log file: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),
}
