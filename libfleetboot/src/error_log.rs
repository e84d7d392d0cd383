//! Durable, append-only record of per-host faults.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::log::*;

pub const DEFAULT_ERROR_LOG_FILE_NAME: &str = "error.log";

#[async_trait]
pub trait ErrorSink: std::fmt::Debug + Send + Sync {
    /// Append one entry. Entries are free text and are never rewritten.
    async fn record(&self, entry: &str) -> Result<()>;
}

/// Appends one line per fault to a file. The file is created on first write
/// and is never truncated or rotated.
#[derive(Debug)]
pub struct FileErrorLog {
    path: PathBuf,
    // Serialises appends from concurrent writers sharing this log.
    lock: Mutex<()>,
}

impl FileErrorLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileErrorLog {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LOG_FILE_NAME)
    }
}

#[async_trait]
impl ErrorSink for FileErrorLog {
    #[tracing::instrument(skip(self, entry), fields(path = %self.path.display()))]
    async fn record(&self, entry: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .wrap_err_with(|| format!("opening error log {}", self.path.display()))?;
        let mut line = entry.trim_end_matches('\n').to_string();
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .wrap_err("appending to error log")?;
        file.flush().await?;
        trace!("recorded error log entry");
        Ok(())
    }
}
