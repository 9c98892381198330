//! Error types for CodeGauge core.

use std::{error::Error, fmt, io};

/// Error type for CodeGauge core operations.
#[derive(Debug)]
pub enum CodeGaugeError {
    /// A network, timeout, or non-2xx HTTP failure after retries were exhausted.
    Transport(String),
    /// Missing or malformed configuration or credentials.
    Config(String),
    /// An upstream response did not have the expected shape.
    Schema(String),
    /// A non-zero status code reported inside an upstream response envelope.
    Application {
        /// Upstream status code.
        code: String,
        /// Upstream error message.
        message: String,
    },
    /// A failure while writing a report or export artifact.
    Render(String),
    /// An underlying I/O error.
    Io(io::Error),
    /// A JSON serialization or deserialization error.
    Json(serde_json::Error),
}

impl fmt::Display for CodeGaugeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::Config(message) => write!(f, "config error: {message}"),
            Self::Schema(message) => write!(f, "unexpected upstream shape: {message}"),
            Self::Application { code, message } => {
                write!(f, "upstream error (code {code}): {message}")
            }
            Self::Render(message) => write!(f, "render error: {message}"),
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl Error for CodeGaugeError {}

impl From<io::Error> for CodeGaugeError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CodeGaugeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<csv::Error> for CodeGaugeError {
    fn from(value: csv::Error) -> Self {
        Self::Render(value.to_string())
    }
}

/// Convenience result type for CodeGauge core.
pub type Result<T> = std::result::Result<T, CodeGaugeError>;
