// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::primitives::{Address, B256, U256};

use crate::blockchain::ChainError;
use crate::config::ConfigError;
use crate::notion::NotionError;
use crate::payout::PayoutError;
use crate::relay::RelayError;
use crate::storage::StorageError;

/// Anything that stops a payout run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Notion(#[from] NotionError),

    #[error(transparent)]
    Payout(#[from] PayoutError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{signer} is not an owner of Safe {safe}")]
    NotOwner { signer: Address, safe: Address },

    #[error("transaction belongs to Safe {actual}, expected {expected}")]
    WrongSafe { expected: Address, actual: String },

    #[error("safeTxHash mismatch: service reports {reported}, computed {computed}")]
    HashMismatch { reported: B256, computed: B256 },

    #[error("transaction {0} was already executed")]
    AlreadyExecuted(B256),

    #[error("{confirmations} of {threshold} required confirmations collected")]
    ThresholdNotMet { confirmations: usize, threshold: u64 },

    #[error("transaction nonce {tx} does not match Safe nonce {safe}")]
    StaleNonce { tx: U256, safe: U256 },

    #[error("execution transaction {tx_hash} did not pay out: {reason}")]
    ExecutionFailed {
        tx_hash: String,
        reason: &'static str,
    },

    #[error("TOKEN_DECIMALS is {configured} but the token contract reports {on_chain}")]
    DecimalsMismatch { configured: u8, on_chain: u8 },
}

impl PipelineError {
    /// Process exit code for the CLI.
    ///
    /// Configuration problems, including a `TOKEN_DECIMALS` the token
    /// contradicts, exit with 2; everything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::DecimalsMismatch { .. } => 2,
            _ => 1,
        }
    }
}
