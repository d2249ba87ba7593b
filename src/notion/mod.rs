// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notion database integration: the source of approved payout rows.

pub mod client;
pub mod types;

pub use client::{NotionClient, NotionError};
pub use types::{PayoutRow, PropertyNames, RowFilter};
