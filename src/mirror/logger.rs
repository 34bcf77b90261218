// ABOUTME: ChangeLogger - formats a ChangeReport as a timestamped block
// ABOUTME: Appends the block to a RecordSink (log file or memory) and optionally echoes it

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::path_key::PathKey;
use super::report::ChangeReport;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const PATH_SEPARATOR: &str = ", ";

/// Destination for formatted change records.
pub trait RecordSink: Send {
    /// Append one complete record block.
    fn append(&mut self, block: &str) -> Result<()>;
}

/// Appends records to a log file.
///
/// The file is opened in append mode for every record so that an external
/// rotation (rename + recreate) is picked up on the next write.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for FileSink {
    fn append(&mut self, block: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log file: {}", self.path.display()))?;
        file.write_all(block.as_bytes())
            .with_context(|| format!("Failed to write log file: {}", self.path.display()))?;
        Ok(())
    }
}

/// Keeps records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    blocks: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every block appended so far.
    pub fn blocks(&self) -> Vec<String> {
        match self.blocks.lock() {
            Ok(blocks) => blocks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, block: &str) -> Result<()> {
        let mut blocks = self
            .blocks
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink lock poisoned"))?;
        blocks.push(block.to_string());
        Ok(())
    }
}

/// Writes a record for every non-empty pass.
pub struct ChangeLogger {
    sink: Box<dyn RecordSink>,
    echo: bool,
}

impl ChangeLogger {
    /// Create a logger writing to `sink`. With `echo`, each record is also
    /// emitted as an info-level tracing event.
    pub fn new(sink: Box<dyn RecordSink>, echo: bool) -> Self {
        Self { sink, echo }
    }

    /// Logger appending to the log file at `path`.
    pub fn for_file(path: impl Into<PathBuf>, echo: bool) -> Self {
        Self::new(Box::new(FileSink::new(path)), echo)
    }

    /// Record `report`, stamped with the current local time.
    ///
    /// An empty report writes nothing. Returns whether a record was written.
    pub fn record(&mut self, report: &ChangeReport) -> Result<bool> {
        self.record_at(report, Local::now())
    }

    /// Record `report` with an explicit timestamp.
    pub fn record_at<Tz>(&mut self, report: &ChangeReport, timestamp: DateTime<Tz>) -> Result<bool>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let Some(block) = format_record(report, &timestamp) else {
            return Ok(false);
        };

        self.sink.append(&block)?;
        if self.echo {
            tracing::info!("{}", block.trim_end());
        }
        Ok(true)
    }
}

/// Format `report` as a log block, or None when the report is empty.
///
/// ```text
/// [2024-05-01 12:00:00] Changes:
/// New folder(s) added: docs
/// File(s) added: docs/a.txt, b.txt
/// ```
pub fn format_record<Tz>(report: &ChangeReport, timestamp: &DateTime<Tz>) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if report.is_empty() {
        return None;
    }

    let mut block = format!("[{}] Changes:\n", timestamp.format(TIMESTAMP_FORMAT));
    let categories: [(&str, &[PathKey]); 5] = [
        ("New folder(s) added", report.dirs_created()),
        ("File(s) added", report.files_added()),
        ("File(s) removed", report.files_removed()),
        ("File(s) updated", report.files_updated()),
        ("Empty folder(s) removed", report.dirs_removed()),
    ];

    for (label, keys) in categories {
        if keys.is_empty() {
            continue;
        }
        let paths: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        block.push_str(label);
        block.push_str(": ");
        block.push_str(&paths.join(PATH_SEPARATOR));
        block.push('\n');
    }

    Some(block)
}
