use crate::department::Department;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Denied,
    Failed,
}

/// One journal line per transfer outcome.
#[derive(Serialize, Deserialize, Debug)]
pub struct TransferLogEntry {
    pub timestamp: String,
    pub peer: String,
    pub username: String,
    pub department: Option<Department>,
    pub file_name: Option<String>,
    pub bytes: u64,
    pub status: TransferStatus,
    pub error: Option<String>,
}

impl TransferLogEntry {
    pub fn now(peer: String, username: String) -> Self {
        TransferLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            peer,
            username,
            department: None,
            file_name: None,
            bytes: 0,
            status: TransferStatus::Failed,
            error: None,
        }
    }
}

/// Append-only jsonl journal kept in the depot root.
pub struct TransferLog {
    log_file_path: PathBuf,
}

impl TransferLog {
    pub fn new(depot_root: &Path) -> Self {
        let log_file_path = depot_root.join(".depot_transfers.jsonl");
        TransferLog { log_file_path }
    }

    pub fn add_entry(&self, entry: TransferLogEntry) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("Failed to open transfer log file")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<TransferLogEntry>> {
        if !self.log_file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_file_path)
            .context("Failed to open transfer log file for reading")?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: TransferLogEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransferLog::new(dir.path());

        let mut entry = TransferLogEntry::now("127.0.0.1:5000".into(), "alice".into());
        entry.department = Some(Department::Manufacturing);
        entry.file_name = Some("report.pdf".into());
        entry.bytes = 1024;
        entry.status = TransferStatus::Completed;
        log.add_entry(entry).unwrap();

        let mut denied = TransferLogEntry::now("127.0.0.1:5001".into(), "bob".into());
        denied.status = TransferStatus::Denied;
        denied.error = Some("department mismatch".into());
        log.add_entry(denied).unwrap();

        let entries = log.read_log().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, TransferStatus::Completed);
        assert_eq!(entries[0].department, Some(Department::Manufacturing));
        assert_eq!(entries[1].status, TransferStatus::Denied);
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransferLog::new(dir.path());
        assert!(log.read_log().unwrap().is_empty());
    }
}
