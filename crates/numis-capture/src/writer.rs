//! Gzip batch writer for capture files.
//!
//! Each batch is appended to the file as an independent gzip member:
//! - The file is opened in append mode and never truncated
//! - An interrupted write only corrupts the last member
//! - Standard multi-member gzip readers (`zcat`, `MultiGzDecoder`) see one
//!   continuous stream of newline-delimited packets

use crate::error::{CaptureError, CaptureResult};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use numis_core::RawPacket;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Appends packet batches to one capture file.
#[derive(Debug)]
pub struct GzipBatchWriter {
    path: PathBuf,
    batches_written: usize,
    packets_written: usize,
}

impl GzipBatchWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            batches_written: 0,
            packets_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn batches_written(&self) -> usize {
        self.batches_written
    }

    pub fn packets_written(&self) -> usize {
        self.packets_written
    }

    /// Append `batch` as one gzip member, one packet per line.
    ///
    /// An empty batch is a no-op and does not touch the file.
    pub fn append_batch(&mut self, batch: &[RawPacket]) -> CaptureResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        self.write_member(batch).map_err(|source| CaptureError::Write {
            path: self.path.clone(),
            source,
        })?;

        self.batches_written += 1;
        self.packets_written += batch.len();

        debug!(
            path = %self.path.display(),
            packets = batch.len(),
            "Appended capture window"
        );

        Ok(batch.len())
    }

    fn write_member(&self, batch: &[RawPacket]) -> std::io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        for packet in batch {
            encoder.write_all(packet.as_text().as_bytes())?;
            encoder.write_all(b"\n")?;
        }

        let mut inner = encoder.finish()?;
        inner.flush()?;
        Ok(())
    }
}

/// Read every line of a capture file, across all of its gzip members.
pub fn read_capture_file(path: impl AsRef<Path>) -> CaptureResult<Vec<String>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(MultiGzDecoder::new(file));
    let lines = reader.lines().collect::<std::io::Result<Vec<_>>>()?;
    Ok(lines)
}
