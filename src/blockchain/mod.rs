// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for Ethereum Safe payouts.
//!
//! This module provides functionality for:
//! - Querying ERC-20 token balances (USDT)
//! - Encoding ERC-20 transfers and MultiSend batches
//! - Hashing, signing and executing Safe multisig transactions

pub mod client;
pub mod erc20;
pub mod multisend;
pub mod safe;
pub mod signing;
pub mod types;

pub use client::{ChainClient, ChainError, ExecutionResult, OnChainSafe};
pub use multisend::{multisend_calldata, MultiSendTx};
pub use safe::{combine_signatures, Operation, OwnerSignature, SafeTransaction};
pub use types::*;
