//! Line-oriented audit log sinks.
//!
//! Adapters record the commands they issue, timestamps, resolved job ids and
//! failure details as raw text lines. Sinks never format for display.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace, warn};

use crate::error::SchedResult;

/// File name of the audit log inside a log directory.
pub const LOG_FILE_NAME: &str = "hpcsub.log";

/// Receives raw diagnostic lines.
pub trait LogSink: Send + Sync {
    /// Append one line.
    fn write_line(&self, line: &str);
}

/// Sink that only forwards lines to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn write_line(&self, line: &str) {
        debug!(target: "hpcsub::audit", "{}", line);
    }
}

/// Sink appending lines to a file.
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogSink {
    /// Open (or create) a log file in append mode.
    pub fn open(path: impl Into<PathBuf>) -> SchedResult<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Open the audit log inside `log_dir`.
    pub fn in_dir(log_dir: &Path) -> SchedResult<Self> {
        Self::open(log_dir.join(LOG_FILE_NAME))
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn write_line(&self, line: &str) {
        debug!(target: "hpcsub::audit", "{}", line);
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{line}").and_then(|()| file.flush()) {
            warn!("Failed to write audit log {}: {}", self.path.display(), e);
        }
    }
}

/// Sink collecting lines in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemoryLogSink {
    fn write_line(&self, line: &str) {
        trace!(target: "hpcsub::audit", "{}", line);
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}
