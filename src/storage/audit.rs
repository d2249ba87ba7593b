// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit ledger for payout runs.
//!
//! Every batch prepared, transaction proposed, confirmed or executed, and
//! every failed run is appended to a daily JSONL file so finance can trace
//! which Notion rows ended up in which Safe transaction.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    BatchPrepared,
    TransactionProposed,
    TransactionConfirmed,
    TransactionExecuted,
    RunFailed,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Safe the event concerns.
    pub safe: Option<String>,
    /// `safeTxHash` of the transaction, once known.
    pub safe_tx_hash: Option<String>,
    /// Additional details as JSON.
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            safe: None,
            safe_tx_hash: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the Safe address.
    pub fn with_safe(mut self, safe: impl ToString) -> Self {
        self.safe = Some(safe.to_string());
        self
    }

    /// Set the transaction hash.
    pub fn with_tx_hash(mut self, hash: impl ToString) -> Self {
        self.safe_tx_hash = Some(hash.to_string());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Append-only JSONL audit log, one file per UTC day.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    /// Create a log rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn day_file(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{date}.jsonl"))
    }

    /// Append an event to the file for its day.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)?;

        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.day_file(&date))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Record an event, logging instead of failing when the write fails.
    ///
    /// A payout that already reached the relay must not be reported as
    /// failed because the local ledger could not be written.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::warn!(
                error = %e,
                event_type = ?event.event_type,
                "Failed to write audit event"
            );
        }
    }

    /// Read audit events for a specific date (`YYYY-MM-DD`).
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| StorageError::InvalidDate(format!("{date}: {e}")))?;

        let path = self.day_file(date);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(line)?);
        }

        Ok(events)
    }

    /// Events for one transaction hash on a given date.
    pub fn events_for_tx(
        &self,
        safe_tx_hash: &str,
        date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let events = self.read_events(date)?;
        Ok(events
            .into_iter()
            .filter(|e| {
                e.safe_tx_hash
                    .as_deref()
                    .is_some_and(|h| h.eq_ignore_ascii_case(safe_tx_hash))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AuditLog) {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::new(temp.path().join("audit"));
        (temp, log)
    }

    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::TransactionProposed)
            .with_safe("0x1111111111111111111111111111111111111111")
            .with_tx_hash("0xabc")
            .with_details(json!({ "transfers": 3 }));

        assert_eq!(event.event_type, AuditEventType::TransactionProposed);
        assert_eq!(event.safe_tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(event.details.unwrap()["transfers"], 3);
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::RunFailed).failed("insufficient balance");

        assert!(!event.success);
        assert_eq!(event.error, Some("insufficient balance".to_string()));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, log) = setup();

        log.log(&AuditEvent::new(AuditEventType::BatchPrepared))
            .unwrap();
        log.log(&AuditEvent::new(AuditEventType::TransactionProposed).with_tx_hash("0xabc"))
            .unwrap();

        let events = log.read_events(&today()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::BatchPrepared);
        assert_eq!(events[1].event_type, AuditEventType::TransactionProposed);
    }

    #[test]
    fn read_missing_day_is_empty() {
        let (_temp, log) = setup();
        assert!(log.read_events("2025-02-01").unwrap().is_empty());
    }

    #[test]
    fn read_rejects_bad_date() {
        let (_temp, log) = setup();
        assert!(matches!(
            log.read_events("../etc/passwd"),
            Err(StorageError::InvalidDate(_))
        ));
    }

    #[test]
    fn events_for_tx_matches_case_insensitively() {
        let (_temp, log) = setup();

        log.record(AuditEvent::new(AuditEventType::TransactionProposed).with_tx_hash("0xABC"));
        log.record(AuditEvent::new(AuditEventType::TransactionConfirmed).with_tx_hash("0xabc"));
        log.record(AuditEvent::new(AuditEventType::TransactionProposed).with_tx_hash("0xdef"));

        let events = log.events_for_tx("0xabc", &today()).unwrap();
        assert_eq!(events.len(), 2);
    }
}
