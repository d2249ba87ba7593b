// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Turning payout rows into a validated transfer batch.

use std::str::FromStr;

use alloy::primitives::{Address, U256};
use serde::{Serialize, Serializer};
use tracing::warn;

use super::amount::parse_amount;
use super::PayoutError;
use crate::blockchain::erc20::transfer_calldata;
use crate::blockchain::{format_amount, MultiSendTx};
use crate::notion::PayoutRow;

/// A validated transfer to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    /// Source Notion page
    pub page_id: String,
    /// Recipient address
    #[serde(serialize_with = "checksummed")]
    pub recipient: Address,
    /// Amount as entered, in whole token units
    pub amount: String,
    /// Amount in token base units
    #[serde(serialize_with = "decimal")]
    pub units: U256,
}

/// A row left out of the batch and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub page_id: String,
    pub reason: String,
}

/// Transfers that will be paid in one Safe transaction.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutBatch {
    pub transfers: Vec<Transfer>,
    pub rejected: Vec<RejectedRow>,
    #[serde(serialize_with = "decimal")]
    pub total_units: U256,
}

/// Base-unit amounts go into reports and the audit log as decimal strings.
fn decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn checksummed<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&address.to_checksum(None))
}

impl PayoutBatch {
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Total formatted with the token's decimals.
    pub fn total_formatted(&self, decimals: u8) -> String {
        format_amount(self.total_units, decimals)
    }

    /// One ERC-20 `transfer` call per recipient, in row order.
    pub fn multisend_txs(&self, token: Address) -> Vec<MultiSendTx> {
        self.transfers
            .iter()
            .map(|t| MultiSendTx::call(token, transfer_calldata(t.recipient, t.units)))
            .collect()
    }
}

/// The first whitespace-separated token of a raw address cell.
///
/// Address cells often carry notes after the address ("0xabc... (TRC20?)").
pub fn clean_address(raw: &str) -> Option<&str> {
    raw.split_whitespace().next()
}

/// Parse a recipient address from a raw address cell.
///
/// Mixed-case input must carry a valid EIP-55 checksum; all-lowercase or
/// all-uppercase hex is accepted as-is. The zero address is rejected.
pub fn parse_recipient(raw: &str) -> Result<Address, PayoutError> {
    let invalid = |reason: &str| PayoutError::InvalidAddress {
        address: raw.trim().to_string(),
        reason: reason.to_string(),
    };

    let cleaned = clean_address(raw).ok_or_else(|| invalid("empty address"))?;
    let hex = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .ok_or_else(|| invalid("missing 0x prefix"))?;

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("expected 40 hex characters"));
    }

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());

    let address = if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{hex}"), None)
            .map_err(|_| invalid("bad EIP-55 checksum"))?
    } else {
        Address::from_str(hex).map_err(|e| invalid(&e.to_string()))?
    };

    if address.is_zero() {
        return Err(invalid("zero address"));
    }
    Ok(address)
}

/// Validate rows, recording invalid ones in `rejected`.
///
/// The result may hold no transfers at all; only an overflowing total fails.
pub fn validate_rows(rows: &[PayoutRow], decimals: u8) -> Result<PayoutBatch, PayoutError> {
    let mut transfers = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();
    let mut total_units = U256::ZERO;

    for row in rows {
        let parsed = parse_recipient(&row.address)
            .and_then(|recipient| Ok((recipient, parse_amount(&row.amount, decimals)?)));

        match parsed {
            Ok((recipient, units)) => {
                total_units = total_units
                    .checked_add(units)
                    .ok_or(PayoutError::TotalOverflow)?;
                transfers.push(Transfer {
                    page_id: row.page_id.clone(),
                    recipient,
                    amount: row.amount.clone(),
                    units,
                });
            }
            Err(e) => {
                warn!(page_id = %row.page_id, error = %e, "Rejecting payout row");
                rejected.push(RejectedRow {
                    page_id: row.page_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(PayoutBatch {
        transfers,
        rejected,
        total_units,
    })
}

/// Validate rows into a batch that pays at least one transfer.
pub fn build_batch(rows: &[PayoutRow], decimals: u8) -> Result<PayoutBatch, PayoutError> {
    let batch = validate_rows(rows, decimals)?;
    if batch.is_empty() {
        return Err(PayoutError::NoTransfers {
            rejected: batch.rejected.len(),
        });
    }
    Ok(batch)
}

/// Fail when `balance` cannot cover the batch total.
pub fn ensure_balance(
    balance: U256,
    batch: &PayoutBatch,
    decimals: u8,
) -> Result<(), PayoutError> {
    if balance < batch.total_units {
        return Err(PayoutError::InsufficientBalance {
            required: batch.total_formatted(decimals),
            available: format_amount(balance, decimals),
        });
    }
    Ok(())
}
