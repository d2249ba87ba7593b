// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notion API client for reading approved payout rows.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::types::{build_query, parse_page, PayoutRow, PropertyNames, QueryResponse, RowFilter};

const DEFAULT_API_BASE_URL: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    #[error("Notion request failed: {0}")]
    Request(String),

    #[error("Notion returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Notion response was invalid: {0}")]
    InvalidResponse(String),

    #[error("page {page_id} is missing property `{property}`")]
    MissingProperty { page_id: String, property: String },
}

#[derive(Debug, Clone)]
pub struct NotionClient {
    api_base_url: String,
    api_key: String,
    database_id: String,
    properties: PropertyNames,
    http: Client,
}

impl NotionClient {
    pub fn new(
        api_key: impl Into<String>,
        database_id: impl Into<String>,
        properties: PropertyNames,
    ) -> Result<Self, NotionError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| NotionError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: api_key.into(),
            database_id: database_id.into(),
            properties,
            http,
        })
    }

    /// Fetch every approved payout row matching `filter`.
    ///
    /// Pages that cannot be parsed are logged and skipped. When the filter
    /// names an approver, rows not approved by that person are dropped.
    pub async fn query_approved(&self, filter: &RowFilter) -> Result<Vec<PayoutRow>, NotionError> {
        let mut rows = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages_seen = 0usize;
        let mut skipped = 0usize;

        loop {
            let body = build_query(filter, &self.properties, cursor.as_deref());
            let response = self.query_page(&body).await?;
            pages_seen += response.results.len();

            let batch = collect_rows(response, &self.properties, filter);
            rows.extend(batch.rows);
            skipped += batch.skipped;

            match batch.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            pages = pages_seen,
            rows = rows.len(),
            skipped,
            "Notion query complete"
        );
        Ok(rows)
    }

    async fn query_page(&self, body: &Value) -> Result<QueryResponse, NotionError> {
        let path = format!("/v1/databases/{}/query", self.database_id);
        let response = self
            .http
            .post(format!(
                "{}{}",
                self.api_base_url.trim_end_matches('/'),
                path
            ))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| NotionError::Request(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotionError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| NotionError::InvalidResponse(format!("POST {path} invalid JSON: {e}")))
    }
}

/// Rows taken from one page of query results.
#[derive(Debug, Default)]
pub struct ResultRows {
    pub rows: Vec<PayoutRow>,
    /// Unreadable pages plus rows lacking the required approver
    pub skipped: usize,
    /// Cursor for the next request; `None` ends the query.
    pub next_cursor: Option<String>,
}

/// Parse one query response and keep the rows `filter` accepts.
pub fn collect_rows(
    response: QueryResponse,
    props: &PropertyNames,
    filter: &RowFilter,
) -> ResultRows {
    let mut out = ResultRows::default();

    for page in &response.results {
        let row = match parse_page(page, props) {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable Notion page");
                out.skipped += 1;
                continue;
            }
        };
        if let Some(approver) = &filter.approver {
            if !row.approved_by(approver) {
                debug!(page_id = %row.page_id, approver = %approver, "Skipping unapproved row");
                out.skipped += 1;
                continue;
            }
        }
        out.rows.push(row);
    }

    // a `has_more` without a cursor cannot be followed
    if response.has_more {
        out.next_cursor = response.next_cursor;
    }
    out
}
