//! Capture sink and window task.
//!
//! The receive loop only ever takes the buffer lock to push one packet. The
//! window task takes the same lock once per interval to swap the buffer for
//! an empty one, then writes the swapped-out window on the blocking pool.
//! A packet therefore lands in exactly one window.

use crate::error::{CaptureError, CaptureResult};
use crate::session::{CaptureConfig, CaptureSession};
use crate::writer::GzipBatchWriter;
use numis_core::RawPacket;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters for one capture session.
#[derive(Debug, Default)]
pub struct CaptureStats {
    packets_accepted: AtomicU64,
    windows_written: AtomicU64,
    packets_written: AtomicU64,
    windows_dropped: AtomicU64,
}

impl CaptureStats {
    pub fn packets_accepted(&self) -> u64 {
        self.packets_accepted.load(Ordering::Relaxed)
    }

    pub fn windows_written(&self) -> u64 {
        self.windows_written.load(Ordering::Relaxed)
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written.load(Ordering::Relaxed)
    }

    pub fn windows_dropped(&self) -> u64 {
        self.windows_dropped.load(Ordering::Relaxed)
    }

    fn record_written(&self, packets: usize) {
        self.windows_written.fetch_add(1, Ordering::Relaxed);
        self.packets_written
            .fetch_add(packets as u64, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.windows_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Entry point for opening capture sinks.
pub struct RawCapture;

impl RawCapture {
    /// Open a sink for `session` and start its window task.
    ///
    /// Creates the capture directory if needed. Must be called from within a
    /// tokio runtime.
    pub fn open(config: &CaptureConfig, session: CaptureSession) -> CaptureSink {
        let directory = config.resolve_directory();
        if let Err(e) = std::fs::create_dir_all(&directory) {
            warn!(?e, directory = %directory.display(), "Failed to create capture directory");
        }

        let path = session.path_in(&directory);
        info!(path = %path.display(), "Writing raw stream");

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stats = Arc::new(CaptureStats::default());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run_windows(
            GzipBatchWriter::new(&path),
            buffer.clone(),
            stats.clone(),
            config.interval(),
            shutdown.clone(),
        ));

        CaptureSink {
            session,
            path,
            buffer,
            stats,
            shutdown,
            task: Some(task),
        }
    }
}

/// Handle through which the receive loop records raw packets.
pub struct CaptureSink {
    session: CaptureSession,
    path: PathBuf,
    buffer: Arc<Mutex<Vec<RawPacket>>>,
    stats: Arc<CaptureStats>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CaptureSink {
    /// Buffer one packet for the current window.
    pub fn accept(&self, packet: RawPacket) {
        self.buffer.lock().push(packet);
        self.stats.packets_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    /// Flush the partially filled window and stop the window task.
    pub async fn close(mut self) -> CaptureResult<()> {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| CaptureError::TaskFailed(e.to_string()))?;
        }
        info!(
            path = %self.path.display(),
            accepted = self.stats.packets_accepted(),
            windows = self.stats.windows_written(),
            dropped = self.stats.windows_dropped(),
            "Closed capture session"
        );
        Ok(())
    }
}

impl Drop for CaptureSink {
    fn drop(&mut self) {
        // The window task still flushes whatever is buffered.
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSink")
            .field("path", &self.path)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

async fn run_windows(
    writer: GzipBatchWriter,
    buffer: Arc<Mutex<Vec<RawPacket>>>,
    stats: Arc<CaptureStats>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut writer = Some(writer);

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                if let Some(w) = writer.take() {
                    flush_window(w, &buffer, &stats).await;
                }
                debug!("Capture window task stopped");
                return;
            }

            _ = ticker.tick() => {
                match writer.take() {
                    Some(w) => writer = flush_window(w, &buffer, &stats).await,
                    None => return,
                }
            }
        }
    }
}

/// Swap out the current window and append it if non-empty.
///
/// Returns the writer for reuse, or `None` if the blocking write task died.
async fn flush_window(
    mut writer: GzipBatchWriter,
    buffer: &Mutex<Vec<RawPacket>>,
    stats: &CaptureStats,
) -> Option<GzipBatchWriter> {
    let batch = std::mem::take(&mut *buffer.lock());
    if batch.is_empty() {
        return Some(writer);
    }

    let count = batch.len();
    debug!(count, path = %writer.path().display(), "Writing capture window");

    let written = tokio::task::spawn_blocking(move || {
        let result = writer.append_batch(&batch);
        (writer, result)
    })
    .await;

    match written {
        Ok((writer, Ok(_))) => {
            stats.record_written(count);
            Some(writer)
        }
        Ok((writer, Err(e))) => {
            error!(error = %e, count, "Capture window write failed, dropping window");
            stats.record_dropped();
            Some(writer)
        }
        Err(e) => {
            error!(?e, count, "Capture write task aborted, stopping capture");
            stats.record_dropped();
            None
        }
    }
}
