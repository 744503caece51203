//! Result sinks
//!
//! A sink receives one `LookupResult` at a time and appends it to durable
//! output. Writes take `&mut self`, so a sink has exactly one writer; the
//! fan-out funnels concurrent lookups through a channel to that writer.

use crate::output::record::LookupResult;
use crate::output::{OutputError, OutputResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Append-only destination for lookup records
#[async_trait]
pub trait ResultSink: Send {
    /// Appends one complete record
    async fn write(&mut self, result: &LookupResult) -> OutputResult<()>;

    /// Flushes and releases the underlying resource
    async fn close(&mut self) -> OutputResult<()>;
}

/// Line-delimited JSON file sink
///
/// Each record goes out as a single `write_all` of one newline-terminated
/// line followed by a flush, so the file only ever contains whole lines.
pub struct JsonLinesSink {
    path: PathBuf,
    file: Option<File>,
    records_written: u64,
}

impl JsonLinesSink {
    /// Creates (or truncates) the file at `path`, creating parent directories
    pub async fn create(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = File::create(path).await?;
        tracing::debug!("Opened sink at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            records_written: 0,
        })
    }
}

#[async_trait]
impl ResultSink for JsonLinesSink {
    async fn write(&mut self, result: &LookupResult) -> OutputResult<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            OutputError::Write(format!("sink {} is already closed", self.path.display()))
        })?;

        let line = result.to_line()?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.records_written += 1;
        Ok(())
    }

    async fn close(&mut self) -> OutputResult<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            tracing::debug!(
                "Closed sink at {} after {} records",
                self.path.display(),
                self.records_written
            );
        }
        Ok(())
    }
}
