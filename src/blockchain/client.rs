// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ethereum JSON-RPC client for token balances and Safe contract state.

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, Bytes, B256, U256},
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};

use super::erc20::Erc20Contract;
use super::safe::{execution_event, ExecutionEvent, ISafe, SafeTransaction};
use super::types::*;

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// HTTP provider type with a signing wallet attached.
type WalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

/// Safe state read directly from the contract.
#[derive(Debug, Clone)]
pub struct OnChainSafe {
    pub nonce: U256,
    pub threshold: u64,
    pub owners: Vec<Address>,
}

/// Result of an `execTransaction` submission.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Ethereum transaction hash
    pub tx_hash: String,
    /// Explorer URL for the transaction
    pub explorer_url: String,
    /// Block number where the transaction was included
    pub block_number: u64,
    /// Whether the transaction was mined without reverting
    pub mined: bool,
    /// Execution event the Safe emitted for the transaction, if any
    pub event: Option<ExecutionEvent>,
}

impl ExecutionResult {
    /// The Safe only reports a successful inner call through `ExecutionSuccess`;
    /// a mined transaction may still carry `ExecutionFailure`.
    pub fn succeeded(&self) -> bool {
        self.failure_reason().is_none()
    }

    /// Why the payout did not go through, if it did not.
    pub fn failure_reason(&self) -> Option<&'static str> {
        match (self.mined, self.event) {
            (false, _) => Some("transaction reverted"),
            (true, Some(ExecutionEvent::Success)) => None,
            (true, Some(ExecutionEvent::Failure)) => Some("Safe emitted ExecutionFailure"),
            (true, None) => Some("no ExecutionSuccess event for this safeTxHash"),
        }
    }
}

/// Ethereum client bound to one network.
pub struct ChainClient {
    network: NetworkConfig,
    rpc_url: url::Url,
    provider: HttpProvider,
}

impl ChainClient {
    /// Create a new client for the specified network and RPC endpoint.
    pub fn new(network: NetworkConfig, rpc_url: &str) -> Result<Self, ChainError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url.clone());

        Ok(Self {
            network,
            rpc_url: url,
            provider,
        })
    }

    /// Get the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Get the chain id reported by the RPC endpoint.
    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))
    }

    /// Fail unless the RPC endpoint serves the configured network.
    pub async fn ensure_chain(&self) -> Result<(), ChainError> {
        let actual = self.chain_id().await?;
        if actual != self.network.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.network.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Get the `decimals()` reported by an ERC-20 token.
    pub async fn token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        Erc20Contract::new(&self.provider, token).decimals().await
    }

    /// Get the raw ERC-20 balance held by `owner`.
    pub async fn token_balance_raw(
        &self,
        token: Address,
        owner: Address,
    ) -> Result<U256, ChainError> {
        Erc20Contract::new(&self.provider, token)
            .raw_balance_of(owner)
            .await
    }

    /// Get the ERC-20 balance held by `owner` with display metadata.
    pub async fn token_balance(
        &self,
        token: Address,
        owner: Address,
        decimals: u8,
        fallback_symbol: &str,
    ) -> Result<TokenBalance, ChainError> {
        Erc20Contract::new(&self.provider, token)
            .balance_of(owner, decimals, fallback_symbol)
            .await
    }

    /// Read nonce, threshold and owners from the Safe contract.
    pub async fn safe_state(&self, safe: Address) -> Result<OnChainSafe, ChainError> {
        let contract = ISafe::new(safe, self.provider.clone());

        let nonce = contract
            .nonce()
            .call()
            .await
            .map_err(|e| ChainError::ContractError(format!("nonce(): {e}")))?;
        let threshold = contract
            .getThreshold()
            .call()
            .await
            .map_err(|e| ChainError::ContractError(format!("getThreshold(): {e}")))?;
        let owners = contract
            .getOwners()
            .call()
            .await
            .map_err(|e| ChainError::ContractError(format!("getOwners(): {e}")))?;

        Ok(OnChainSafe {
            nonce,
            threshold: threshold.saturating_to::<u64>(),
            owners,
        })
    }

    /// Submit `execTransaction` on the Safe from `wallet` and wait for the
    /// receipt.
    pub async fn execute(
        &self,
        wallet: EthereumWallet,
        safe: Address,
        tx: &SafeTransaction,
        safe_tx_hash: B256,
        signatures: Bytes,
    ) -> Result<ExecutionResult, ChainError> {
        let provider: WalletProvider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone());
        let contract = ISafe::new(safe, provider);

        let call = tx.exec_call(signatures);
        let pending = contract
            .execTransaction(
                call.to,
                call.value,
                call.data,
                call.operation,
                call.safeTxGas,
                call.baseGas,
                call.gasPrice,
                call.gasToken,
                call.refundReceiver,
                call.signatures,
            )
            .send()
            .await
            .map_err(|e| ChainError::TransactionFailed(format!("Failed to send: {}", e)))?;

        let tx_hash = format!("{:?}", pending.tx_hash());
        tracing::info!(tx_hash = %tx_hash, "execTransaction sent, waiting for receipt");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::RpcError(format!("Failed to get receipt: {}", e)))?;

        let logs: Vec<_> = receipt.inner.logs().iter().map(|log| log.inner.clone()).collect();
        let event = execution_event(&logs, safe, safe_tx_hash);
        if receipt.status() && event.is_none() {
            tracing::warn!(tx_hash = %tx_hash, "No Safe execution event found in receipt");
        }

        Ok(ExecutionResult {
            explorer_url: format!("{}/tx/{}", self.network.explorer_url, tx_hash),
            tx_hash,
            block_number: receipt.block_number.unwrap_or(0),
            mined: receipt.status(),
            event,
        })
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("RPC endpoint is on chain {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}
