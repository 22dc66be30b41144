//! Prometheus metrics and structured logging for numismatic feeds.
//!
//! - Process-wide Prometheus counters for listeners, capture and REST calls
//! - Structured logging with tracing (JSON in production, pretty otherwise)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with};
pub use metrics::Metrics;
