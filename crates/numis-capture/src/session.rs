//! Capture sessions and directory resolution.

use chrono::{DateTime, Local};
use numis_core::Symbol;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name used for the default cache directory.
pub const LIBRARY_NAME: &str = "numismatic";

static DEFAULT_CAPTURE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(LIBRARY_NAME)
});

/// Process-wide default capture directory (user cache dir + "numismatic").
///
/// Resolved once and shared by every session.
pub fn default_capture_dir() -> &'static Path {
    DEFAULT_CAPTURE_DIR.as_path()
}

/// Raw capture configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Whether listeners capture their raw stream.
    #[serde(default)]
    pub enabled: bool,
    /// Output directory. `None` uses [`default_capture_dir`].
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Window length in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    1_000
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: None,
            interval_ms: default_interval_ms(),
        }
    }
}

impl CaptureConfig {
    /// Enabled config writing to `directory`.
    pub fn in_dir(directory: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            directory: Some(directory.into()),
            ..Default::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// Directory this config writes to.
    pub fn resolve_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| default_capture_dir().to_path_buf())
    }
}

/// One capture file scope: (exchange, symbol, start time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSession {
    exchange: String,
    symbol: Symbol,
    started_at: DateTime<Local>,
    filename: String,
}

impl CaptureSession {
    /// Session starting now.
    pub fn new(exchange: impl Into<String>, symbol: Symbol) -> Self {
        Self::started_at(exchange, symbol, Local::now())
    }

    pub fn started_at(
        exchange: impl Into<String>,
        symbol: Symbol,
        started_at: DateTime<Local>,
    ) -> Self {
        let exchange = exchange.into();
        let filename = format!(
            "{}_{}_{}.json.gz",
            exchange,
            symbol.file_component(),
            started_at.format("%Y%m%dT%H%M%S")
        );
        Self {
            exchange,
            symbol,
            started_at,
            filename,
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.started_at
    }

    /// File name, fixed for the session's lifetime.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path_in(&self, directory: &Path) -> PathBuf {
        directory.join(&self.filename)
    }
}
