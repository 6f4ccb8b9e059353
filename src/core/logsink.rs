use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::error::RunnerError;

pub const DEFAULT_LOG_NAME: &str = "ffmpeg.stderr.log";

pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_LOG_NAME)
}

/// Batch-wide diagnostic log: truncated on open, one line per write, closed once.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl LogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn open(&mut self) -> Result<(), RunnerError> {
        let file = File::create(&self.path).map_err(|source| RunnerError::LogSink {
            path: self.path.clone(),
            source,
        })?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    /// Writes are best effort; a full disk must not stall the batch.
    pub fn write_line(&mut self, line: &str) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(err) = writeln!(writer, "{line}") {
                tracing::warn!(path = %self.path.display(), "log write failed: {err}");
            }
        }
    }

    /// Returns `true` only for the call that actually closed the file.
    pub fn close(&mut self) -> bool {
        match self.writer.take() {
            Some(mut writer) => {
                if let Err(err) = writer.flush() {
                    tracing::warn!(path = %self.path.display(), "log flush failed: {err}");
                }
                true
            }
            None => false,
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.close();
    }
}
