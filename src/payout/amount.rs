// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decimal amount parsing.

use alloy::primitives::U256;

use super::PayoutError;

/// Parse a human-readable amount to token base units.
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "0.88")
/// * `decimals` - Number of token decimals (6 for USDT)
///
/// # Returns
/// * `Ok(U256)` - Amount in smallest unit, always non-zero
/// * `Err` - If the text is not a plain positive decimal that fits `decimals`
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, PayoutError> {
    let invalid = |reason: &str| PayoutError::InvalidAmount {
        amount: amount.to_string(),
        reason: reason.to_string(),
    };

    let text = amount.trim();
    if text.is_empty() {
        return Err(invalid("empty amount"));
    }
    if text.starts_with('-') {
        return Err(invalid("negative amount"));
    }

    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() > 2 {
        return Err(invalid("invalid amount format"));
    }

    let whole_str = if parts[0].is_empty() { "0" } else { parts[0] };
    if !whole_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("invalid whole number"));
    }
    let whole = U256::from_str_radix(whole_str, 10).map_err(|_| invalid("invalid whole number"))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if dec_str.is_empty() || !dec_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("invalid decimal"));
        }
        if dec_str.len() > decimals as usize {
            return Err(invalid(&format!("too many decimal places (max {decimals})")));
        }
        // Pad with zeros to match decimals
        let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
        U256::from_str_radix(&padded, 10).map_err(|_| invalid("invalid decimal"))?
    } else {
        U256::ZERO
    };

    let multiplier = U256::from(10u64).pow(U256::from(decimals));
    let total = whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or_else(|| invalid("amount overflow"))?;

    if total.is_zero() {
        return Err(invalid("amount must be greater than zero"));
    }

    Ok(total)
}
