//! Error types for the tracer's outer layers.
//!
//! Probe handling itself never fails: missing data is logged and recorded as
//! best-effort values. These errors come from configuration and sinks.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("sink error: {message}")]
    Sink { message: String },
}

impl TracerError {
    pub fn config(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        TracerError::Config {
            path: path.into(),
            source,
        }
    }

    pub fn sink(message: impl Into<String>) -> Self {
        TracerError::Sink {
            message: message.into(),
        }
    }
}
