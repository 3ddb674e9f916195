//! Failures raised while bringing foglio's infrastructure up: resolving
//! configuration, reaching the database, installing telemetry, and
//! preparing the media directory.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("database unavailable: {message}")]
    Database { message: String },
    #[error("telemetry setup failed: {message}")]
    Telemetry { message: String },
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry {
            message: message.into(),
        }
    }
}
