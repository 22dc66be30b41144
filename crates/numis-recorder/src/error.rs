//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(#[from] numis_feed::FeedError),

    #[error("REST error: {0}")]
    Rest(#[from] numis_rest::RestError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] numis_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
