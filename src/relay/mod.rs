// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Safe Transaction Service integration.
//!
//! The service is where proposed Safe transactions wait for the remaining
//! owner confirmations before someone executes them on chain.

pub mod client;
pub mod types;

pub use client::{RelayError, SafeServiceClient};
pub use types::{MultisigTransaction, SafeInfo};
