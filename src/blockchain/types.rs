// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use alloy::primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};

/// Ethereum network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network key as used in `NETWORK` and in Safe service host names
    pub key: &'static str,
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// MultiSendCallOnly deployment used for batched transfers
    pub multisend_call_only: Address,
    /// Safe Transaction Service base URL (includes the `/api` prefix)
    pub tx_service_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Ethereum Mainnet configuration.
pub const ETH_MAINNET: NetworkConfig = NetworkConfig {
    key: "mainnet",
    name: "Ethereum Mainnet",
    chain_id: 1,
    // MultiSendCallOnly v1.3.0
    multisend_call_only: address!("0x40A2aCCbd92BCA938b02010E17A5b8929b49130D"),
    tx_service_url: "https://safe-transaction-mainnet.safe.global/api",
    explorer_url: "https://etherscan.io",
};

/// Sepolia testnet configuration.
pub const ETH_SEPOLIA: NetworkConfig = NetworkConfig {
    key: "sepolia",
    name: "Sepolia Testnet",
    chain_id: 11_155_111,
    // MultiSendCallOnly v1.4.1
    multisend_call_only: address!("0x9641d764fc13c8B624c04430C7356C1C7C8102e2"),
    tx_service_url: "https://safe-transaction-sepolia.safe.global/api",
    explorer_url: "https://sepolia.etherscan.io",
};

/// Default network when `NETWORK` is unset.
pub const NETWORK_SEPOLIA: &str = "sepolia";

/// Resolve a network key (case-insensitive) to its configuration.
pub fn network_by_key(raw: Option<&str>) -> Result<NetworkConfig, String> {
    let value = raw.unwrap_or(NETWORK_SEPOLIA).trim().to_ascii_lowercase();
    match value.as_str() {
        "mainnet" | "ethereum" => Ok(ETH_MAINNET),
        "sepolia" => Ok(ETH_SEPOLIA),
        other => Err(format!(
            "Unsupported network `{other}` (expected `mainnet` or `sepolia`)"
        )),
    }
}

/// Token balance information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Token symbol (e.g., "USDT")
    pub symbol: String,
    /// Balance in the token's smallest unit
    pub balance_raw: String,
    /// Balance formatted with decimals
    pub balance_formatted: String,
    /// Number of decimals
    pub decimals: u8,
    /// Token contract address
    pub contract_address: String,
}

/// Format token base units to a human-readable amount.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

/// Shorten an address for human-facing log lines (`0x1234...abcd`).
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() < 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
