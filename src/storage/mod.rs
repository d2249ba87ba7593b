// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Local Storage
//!
//! Plain file storage for the payout audit ledger.
//!
//! ## Storage Layout
//!
//! ```text
//! {AUDIT_DIR}/
//!   {YYYY-MM-DD}.jsonl  # Daily audit logs
//! ```

pub mod audit;

pub use audit::{AuditEvent, AuditEventType, AuditLog};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Date argument was not `YYYY-MM-DD`
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
