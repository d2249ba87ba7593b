// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Safe Transaction Service request and response bodies.

use std::str::FromStr;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer, Serialize};

use super::client::RelayError;
use crate::blockchain::{Operation, OwnerSignature, SafeTransaction};

/// Origin tag attached to proposals so they are recognisable in the Safe UI.
pub const PROPOSAL_ORIGIN: &str = "safe-payouts";

/// `GET /v1/safes/{address}/`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeInfo {
    pub address: String,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub nonce: u64,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub threshold: u64,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl SafeInfo {
    /// Whether `owner` is one of the Safe owners.
    pub fn is_owner(&self, owner: Address) -> bool {
        self.owners
            .iter()
            .filter_map(|o| Address::from_str(o).ok())
            .any(|o| o == owner)
    }
}

/// One owner confirmation on a multisig transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub owner: String,
    #[serde(default)]
    pub signature: Option<String>,
}

/// `GET /v1/multisig-transactions/{safe_tx_hash}/`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigTransaction {
    pub safe: String,
    pub to: String,
    #[serde(deserialize_with = "string_from_number_or_string")]
    pub value: String,
    #[serde(default)]
    pub data: Option<String>,
    pub operation: u8,
    #[serde(deserialize_with = "string_from_number_or_string")]
    pub safe_tx_gas: String,
    #[serde(deserialize_with = "string_from_number_or_string")]
    pub base_gas: String,
    #[serde(deserialize_with = "string_from_number_or_string")]
    pub gas_price: String,
    #[serde(default)]
    pub gas_token: Option<String>,
    #[serde(default)]
    pub refund_receiver: Option<String>,
    #[serde(deserialize_with = "string_from_number_or_string")]
    pub nonce: String,
    pub safe_tx_hash: String,
    #[serde(default)]
    pub is_executed: bool,
    #[serde(default)]
    pub confirmations_required: Option<u64>,
    #[serde(default)]
    pub confirmations: Vec<Confirmation>,
}

impl MultisigTransaction {
    /// Rebuild the typed transaction so its hash can be recomputed locally.
    pub fn to_safe_transaction(&self) -> Result<SafeTransaction, RelayError> {
        let data = match self.data.as_deref() {
            None | Some("") | Some("0x") => Bytes::new(),
            Some(hex) => Bytes::from_str(hex)
                .map_err(|e| RelayError::InvalidResponse(format!("data: {e}")))?,
        };
        let operation = Operation::try_from(self.operation).map_err(RelayError::InvalidResponse)?;

        Ok(SafeTransaction {
            to: parse_address("to", &self.to)?,
            value: parse_u256("value", &self.value)?,
            data,
            operation,
            safe_tx_gas: parse_u256("safeTxGas", &self.safe_tx_gas)?,
            base_gas: parse_u256("baseGas", &self.base_gas)?,
            gas_price: parse_u256("gasPrice", &self.gas_price)?,
            gas_token: parse_optional_address("gasToken", self.gas_token.as_deref())?,
            refund_receiver: parse_optional_address(
                "refundReceiver",
                self.refund_receiver.as_deref(),
            )?,
            nonce: parse_u256("nonce", &self.nonce)?,
        })
    }

    /// Whether `owner` has already confirmed.
    pub fn confirmed_by(&self, owner: Address) -> bool {
        self.confirmations
            .iter()
            .filter_map(|c| Address::from_str(&c.owner).ok())
            .any(|o| o == owner)
    }

    /// Owner signatures collected so far (confirmations without a signature
    /// are skipped).
    pub fn owner_signatures(&self) -> Result<Vec<OwnerSignature>, RelayError> {
        self.confirmations
            .iter()
            .filter_map(|c| c.signature.as_deref().map(|sig| (c.owner.as_str(), sig)))
            .map(|(owner, sig)| {
                Ok(OwnerSignature {
                    owner: parse_address("owner", owner)?,
                    signature: Bytes::from_str(sig)
                        .map_err(|e| RelayError::InvalidResponse(format!("signature: {e}")))?,
                })
            })
            .collect()
    }
}

/// `POST /v1/safes/{address}/multisig-transactions/estimations/`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub to: String,
    pub value: String,
    pub data: Option<String>,
    pub operation: u8,
}

impl EstimateRequest {
    pub fn from_tx(tx: &SafeTransaction) -> Self {
        Self {
            to: tx.to.to_string(),
            value: tx.value.to_string(),
            data: hex_data(&tx.data),
            operation: tx.operation as u8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    #[serde(deserialize_with = "string_from_number_or_string")]
    pub safe_tx_gas: String,
}

/// `POST /v1/safes/{address}/multisig-transactions/`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeRequest {
    pub safe: String,
    pub to: String,
    pub value: String,
    pub data: Option<String>,
    pub operation: u8,
    pub safe_tx_gas: String,
    pub base_gas: String,
    pub gas_price: String,
    pub gas_token: String,
    pub refund_receiver: String,
    pub nonce: String,
    pub contract_transaction_hash: String,
    pub sender: String,
    pub signature: String,
    pub origin: String,
}

impl ProposeRequest {
    pub fn new(
        safe: Address,
        tx: &SafeTransaction,
        safe_tx_hash: B256,
        signature: &OwnerSignature,
    ) -> Self {
        Self {
            safe: safe.to_string(),
            to: tx.to.to_string(),
            value: tx.value.to_string(),
            data: hex_data(&tx.data),
            operation: tx.operation as u8,
            safe_tx_gas: tx.safe_tx_gas.to_string(),
            base_gas: tx.base_gas.to_string(),
            gas_price: tx.gas_price.to_string(),
            gas_token: tx.gas_token.to_string(),
            refund_receiver: tx.refund_receiver.to_string(),
            nonce: tx.nonce.to_string(),
            contract_transaction_hash: safe_tx_hash.to_string(),
            sender: signature.owner.to_string(),
            signature: alloy::hex::encode_prefixed(&signature.signature),
            origin: PROPOSAL_ORIGIN.to_string(),
        }
    }
}

/// `POST /v1/multisig-transactions/{safe_tx_hash}/confirmations/`
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmRequest {
    pub signature: String,
}

fn hex_data(data: &Bytes) -> Option<String> {
    if data.is_empty() {
        None
    } else {
        Some(alloy::hex::encode_prefixed(data))
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, RelayError> {
    Address::from_str(raw).map_err(|e| RelayError::InvalidResponse(format!("{field}: {e}")))
}

fn parse_optional_address(field: &str, raw: Option<&str>) -> Result<Address, RelayError> {
    match raw {
        None | Some("") => Ok(Address::ZERO),
        Some(value) => parse_address(field, value),
    }
}

fn parse_u256(field: &str, raw: &str) -> Result<U256, RelayError> {
    U256::from_str_radix(raw.trim(), 10)
        .map_err(|e| RelayError::InvalidResponse(format!("{field}: {e}")))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    String(String),
}

fn string_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::String(s) => s,
    })
}

fn u64_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = string_from_number_or_string(deserializer)?;
    raw.trim().parse::<u64>().map_err(serde::de::Error::custom)
}
