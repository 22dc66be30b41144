//! Feed error types.

use numis_core::CoreError;
use numis_rest::RestError;
use numis_ws::WsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Connection error: {0}")]
    Connection(#[from] WsError),

    #[error("{exchange} decode error: {reason}")]
    Decode { exchange: String, reason: String },

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error("Feed has no {0} client")]
    CapabilityMissing(&'static str),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("{exchange} does not support channel {channel:?}")]
    UnsupportedChannel { exchange: String, channel: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Listener task failed: {0}")]
    TaskFailed(String),
}

impl FeedError {
    pub fn decode(exchange: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            exchange: exchange.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error ends a listener session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Decode { .. })
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
