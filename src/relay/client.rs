// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the Safe Transaction Service.

use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use super::types::{
    ConfirmRequest, EstimateRequest, EstimateResponse, MultisigTransaction, ProposeRequest,
    SafeInfo,
};
use crate::blockchain::{OwnerSignature, SafeTransaction};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Safe service request failed: {0}")]
    Request(String),

    #[error("Safe service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Safe service response was invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct SafeServiceClient {
    base_url: String,
    safe: Address,
    http: Client,
}

impl SafeServiceClient {
    /// `base_url` includes the `/api` prefix, e.g.
    /// `https://safe-transaction-sepolia.safe.global/api`.
    pub fn new(base_url: impl Into<String>, safe: Address) -> Result<Self, RelayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| RelayError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            safe,
            http,
        })
    }

    /// Nonce, threshold, owners and version as tracked by the service.
    pub async fn safe_info(&self) -> Result<SafeInfo, RelayError> {
        self.get_json(&format!("/v1/safes/{}/", self.safe)).await
    }

    /// Ask the service for a `safeTxGas` estimate.
    ///
    /// Falls back to zero (let the Safe use all available gas) when the
    /// endpoint fails or returns something unparsable.
    pub async fn estimate_safe_tx_gas(&self, tx: &SafeTransaction) -> U256 {
        let path = format!("/v1/safes/{}/multisig-transactions/estimations/", self.safe);
        let result: Result<EstimateResponse, RelayError> =
            self.post_json(&path, &EstimateRequest::from_tx(tx)).await;

        match result {
            Ok(estimate) => match U256::from_str_radix(estimate.safe_tx_gas.trim(), 10) {
                Ok(gas) => gas,
                Err(e) => {
                    warn!(error = %e, "Unparsable safeTxGas estimate, using 0");
                    U256::ZERO
                }
            },
            Err(e) => {
                warn!(error = %e, "safeTxGas estimation failed, using 0");
                U256::ZERO
            }
        }
    }

    /// Propose a signed transaction so the other owners can confirm it.
    pub async fn propose(
        &self,
        tx: &SafeTransaction,
        safe_tx_hash: B256,
        signature: &OwnerSignature,
    ) -> Result<(), RelayError> {
        let path = format!("/v1/safes/{}/multisig-transactions/", self.safe);
        let body = ProposeRequest::new(self.safe, tx, safe_tx_hash, signature);
        self.post_no_content(&path, &body).await?;

        info!(
            safe_tx_hash = %safe_tx_hash,
            sender = %signature.owner,
            nonce = %tx.nonce,
            "Safe transaction proposed"
        );
        Ok(())
    }

    /// Fetch a multisig transaction and its confirmations.
    pub async fn transaction(&self, safe_tx_hash: B256) -> Result<MultisigTransaction, RelayError> {
        self.get_json(&format!("/v1/multisig-transactions/{safe_tx_hash}/"))
            .await
    }

    /// Add an owner confirmation to a proposed transaction.
    pub async fn confirm(
        &self,
        safe_tx_hash: B256,
        signature: &OwnerSignature,
    ) -> Result<(), RelayError> {
        let path = format!("/v1/multisig-transactions/{safe_tx_hash}/confirmations/");
        let body = ConfirmRequest {
            signature: alloy::hex::encode_prefixed(&signature.signature),
        };
        self.post_no_content(&path, &body).await?;

        info!(
            safe_tx_hash = %safe_tx_hash,
            owner = %signature.owner,
            "Confirmation submitted"
        );
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RelayError> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| RelayError::Request(format!("GET {path} failed: {e}")))?;

        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(format!("GET {path} invalid JSON: {e}")))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RelayError> {
        let response = self.send_post(path, body).await?;
        response
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(format!("POST {path} invalid JSON: {e}")))
    }

    /// POST where the service answers with an empty 201/204 body.
    async fn post_no_content<B: Serialize>(&self, path: &str, body: &B) -> Result<(), RelayError> {
        self.send_post(path, body).await.map(|_| ())
    }

    async fn send_post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, RelayError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::Request(format!("POST {path} failed: {e}")))?;

        ensure_success(response).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RelayError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(RelayError::Status { status, body })
}
