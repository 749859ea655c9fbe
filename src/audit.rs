//! Append-only record of completed lock and unlock operations.
//!
//! Supports pluggable sinks for forwarding records to files or elsewhere.
//! Failed operations are not recorded; they are reported to the caller.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which transition an operation performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Lock,
    Unlock,
}

/// A sink that receives audit records. Implement this to forward records
/// to a file, a database, or a remote collector.
pub trait AuditSink: Send {
    /// Append a record. Called once per successful operation.
    fn append(&mut self, record: AuditRecord);
}

/// A permanent record of one state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub operation: Operation,
    /// The name the artifact had before the operation.
    pub source: PathBuf,
    /// The name the artifact has now.
    pub destination: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn now(operation: Operation, source: &Path, destination: &Path) -> Self {
        Self {
            operation,
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            timestamp: Utc::now(),
        }
    }
}

/// An append-only log of operations.
/// Can forward records to additional sinks via `add_forward_sink`.
#[derive(Default)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
    forward_sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("records", &self.records)
            .field("forward_sinks", &self.forward_sinks.len())
            .finish()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to receive a copy of every record.
    pub fn add_forward_sink(&mut self, sink: Box<dyn AuditSink>) {
        self.forward_sinks.push(sink);
    }

    /// Append a new record to the log and forward it to any attached sinks.
    pub fn append(&mut self, record: AuditRecord) {
        for sink in &mut self.forward_sinks {
            sink.append(record.clone());
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AuditRecord> {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Built-in sink: file
// ---------------------------------------------------------------------------

/// Writes audit records as JSON lines (one per record) to a file.
/// Creates the file if it doesn't exist; appends if it does.
pub struct FileAuditSink {
    file: std::fs::File,
}

impl FileAuditSink {
    /// Open or create a file for append-only audit logging.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl AuditSink for FileAuditSink {
    fn append(&mut self, record: AuditRecord) {
        let written = serde_json::to_string(&record)
            .map_err(std::io::Error::from)
            .and_then(|line| {
                writeln!(self.file, "{line}")?;
                self.file.flush()
            });
        if let Err(e) = written {
            tracing::warn!(error = %e, "cannot write audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_iterate() {
        let mut log = AuditLog::new();
        assert!(log.is_empty());

        log.append(AuditRecord::now(
            Operation::Lock,
            Path::new("notes.txt"),
            Path::new("notes.txt.enc"),
        ));

        assert_eq!(log.len(), 1);
        let record = log.iter().next().unwrap();
        assert_eq!(record.operation, Operation::Lock);
        assert_eq!(record.destination, Path::new("notes.txt.enc"));
    }

    #[test]
    fn test_record_serializes_operation_lowercase() {
        let record = AuditRecord::now(Operation::Unlock, Path::new("a.enc"), Path::new("a"));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""operation":"unlock""#));
        let parsed: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
