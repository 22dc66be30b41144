//! Feed recorder.
//!
//! Runs one listener per configured symbol, captures the raw streams to
//! disk and logs the decoded events until shut down.

pub mod app;
pub mod config;
pub mod error;

pub use app::{Recorder, RunReport};
pub use config::{RecorderConfig, RestConfig};
pub use error::{AppError, AppResult};
