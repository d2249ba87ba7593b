// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Safe Payouts - Notion-driven USDT payouts from a Safe multisig
//!
//! This crate reads approved payout rows from a Notion database, batches them
//! into one MultiSend Safe transaction, signs it with an owner key and
//! proposes it to the Safe Transaction Service.
//!
//! ## Modules
//!
//! - `blockchain` - Ethereum integration (ERC-20, MultiSend, Safe hashing and signing)
//! - `notion` - Notion database client
//! - `payout` - Row validation and batching
//! - `relay` - Safe Transaction Service client
//! - `storage` - JSONL audit ledger
//! - `pipeline` - The end-to-end payout flow

pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod notion;
pub mod payout;
pub mod pipeline;
pub mod relay;
pub mod storage;
