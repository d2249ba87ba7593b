// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payout validation and batching.
//!
//! Rows from Notion are free text; this module turns them into checked
//! recipient addresses and exact token base-unit amounts, drops what cannot be
//! paid, and verifies the Safe can cover the total.

pub mod amount;
pub mod batch;

pub use amount::parse_amount;
pub use batch::{
    build_batch, clean_address, ensure_balance, parse_recipient, validate_rows, PayoutBatch,
    RejectedRow, Transfer,
};

#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    #[error("invalid address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid amount `{amount}`: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("no payable transfers ({rejected} row(s) rejected)")]
    NoTransfers { rejected: usize },

    #[error("batch total overflows uint256")]
    TotalOverflow,

    #[error("insufficient token balance: need {required}, Safe holds {available}")]
    InsufficientBalance { required: String, available: String },
}
