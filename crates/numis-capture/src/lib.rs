//! Time-windowed raw packet capture.
//!
//! Packets handed to a [`CaptureSink`] are buffered in memory and, once per
//! window, appended as one gzip member to the session file
//! `{exchange}_{symbol}_{YYYYMMDDTHHMMSS}.json.gz`. Empty windows are never
//! written. Capture is best-effort: write failures are logged and the window
//! is dropped.

pub mod error;
pub mod session;
pub mod sink;
pub mod writer;

pub use error::{CaptureError, CaptureResult};
pub use session::{default_capture_dir, CaptureConfig, CaptureSession};
pub use sink::{CaptureSink, CaptureStats, RawCapture};
pub use writer::{read_capture_file, GzipBatchWriter};
