//! Append-only log sinks for the run narrative.
//!
//! `DailyLog` writes one plain-text file per target date
//! (`batch_<YYYYMMDD>.log`). Runner events get a bracketed local
//! timestamp; worker output is appended verbatim between a step's
//! `Starting` line and its outcome line. The file is never truncated, so
//! re-running a date appends to the same narrative.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::domain::{RunEvent, TargetDate};

/// Timestamp prefix format for runner-emitted lines
pub const TIMESTAMP_FORMAT: &str = "[%Y-%m-%d %H:%M:%S]";

/// Destination for a run's events and captured worker output
#[async_trait]
pub trait LogSink: Send {
    /// Append a runner event
    async fn record(&mut self, event: &RunEvent) -> Result<()>;

    /// Append output captured from the worker
    async fn capture(&mut self, output: &str) -> Result<()>;
}

/// File-backed sink keyed by target date
pub struct DailyLog {
    /// Path to the batch_<date>.log file
    path: PathBuf,

    /// Handle opened in append mode
    file: File,
}

impl DailyLog {
    /// File name of the log for a date
    pub fn file_name(target_date: &TargetDate) -> String {
        format!("batch_{}.log", target_date.compact())
    }

    /// Open (creating directory and file if absent) the log for a date
    pub async fn open(log_dir: &Path, target_date: &TargetDate) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .await
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        let path = log_dir.join(Self::file_name(target_date));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        Ok(Self { path, file })
    }

    /// Get the path to the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.file
            .write_all(text.as_bytes())
            .await
            .with_context(|| format!("Failed to write log file: {}", self.path.display()))?;
        self.file
            .flush()
            .await
            .with_context(|| format!("Failed to flush log file: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl LogSink for DailyLog {
    async fn record(&mut self, event: &RunEvent) -> Result<()> {
        let mut line = format!("{} {}\n", Local::now().format(TIMESTAMP_FORMAT), event);
        if event.separated() {
            line.push('\n');
        }
        self.write(&line).await
    }

    async fn capture(&mut self, output: &str) -> Result<()> {
        if output.is_empty() {
            return Ok(());
        }

        if output.ends_with('\n') {
            self.write(output).await
        } else {
            self.write(&format!("{}\n", output)).await
        }
    }
}

/// One entry held by a `MemoryLog`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Event(RunEvent),
    Output(String),
}

/// In-memory sink for callers that inspect the narrative directly
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Vec<LogEntry>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Rendered text of the recorded events, in order
    pub fn event_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Event(event) => Some(event.to_string()),
                LogEntry::Output(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl LogSink for MemoryLog {
    async fn record(&mut self, event: &RunEvent) -> Result<()> {
        self.entries.push(LogEntry::Event(event.clone()));
        Ok(())
    }

    async fn capture(&mut self, output: &str) -> Result<()> {
        if !output.is_empty() {
            self.entries.push(LogEntry::Output(output.to_string()));
        }
        Ok(())
    }
}
