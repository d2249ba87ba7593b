// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Payout Pipeline
//!
//! One run pulls approved rows from Notion, validates them into a batch,
//! checks the Safe can pay, wraps every transfer into a single Safe
//! transaction and hands the signed proposal to the Safe Transaction Service.
//!
//! ```text
//! Notion rows -> PayoutBatch -> SafeTransaction -> safeTxHash -> signature
//!   -> propose (relay)  |  execTransaction (threshold 1, --execute)
//! ```
//!
//! `confirm` and `execute` pick a proposal back up by its `safeTxHash` so the
//! remaining owners can sign and anyone can submit it once the threshold is
//! met.

use std::str::FromStr;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::blockchain::erc20::transfer_calldata;
use crate::blockchain::signing::{create_wallet, sign_safe_hash};
use crate::blockchain::{
    combine_signatures, multisend_calldata, short_address, ChainClient, ChainError,
    ExecutionResult, Operation, OwnerSignature, SafeTransaction, TokenBalance,
};
use crate::config::Config;
use crate::error::PipelineError;
use crate::notion::{NotionClient, PayoutRow};
use crate::payout::{build_batch, ensure_balance, validate_rows, PayoutBatch};
use crate::relay::{MultisigTransaction, SafeInfo, SafeServiceClient};
use crate::storage::{AuditEvent, AuditEventType, AuditLog};

/// Flags for [`Pipeline::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after signing; nothing is sent.
    pub dry_run: bool,
    /// Execute on chain instead of proposing when the threshold is 1.
    pub execute: bool,
    /// Use this Safe nonce instead of the one reported by the service.
    pub nonce: Option<u64>,
}

/// A batch turned into a signed Safe transaction.
#[derive(Debug, Clone)]
pub struct PreparedPayout {
    pub batch: PayoutBatch,
    pub tx: SafeTransaction,
    pub safe_tx_hash: B256,
    pub signature: OwnerSignature,
}

/// What a run ended with.
#[derive(Debug)]
pub enum Outcome {
    /// No approved rows matched the filter.
    Empty,
    DryRun(PreparedPayout),
    Proposed(PreparedPayout),
    Executed {
        prepared: PreparedPayout,
        result: ExecutionResult,
    },
}

/// Result of validating the current rows without building a transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub rows: usize,
    pub batch: Option<PayoutBatch>,
    pub balance: TokenBalance,
    pub sufficient: bool,
}

#[derive(Debug)]
pub enum ConfirmOutcome {
    Confirmed { confirmations: usize, required: u64 },
    AlreadyConfirmed,
}

/// Safe configuration as the service sees it, plus the token balance.
#[derive(Debug, Clone, Serialize)]
pub struct SafeStatus {
    pub safe: String,
    pub network: String,
    pub nonce: u64,
    pub threshold: u64,
    pub owners: Vec<String>,
    pub version: Option<String>,
    pub signer: String,
    pub signer_is_owner: bool,
    /// `decimals()` as reported by the token contract
    pub token_decimals: u8,
    pub balance: TokenBalance,
}

pub struct Pipeline {
    config: Config,
    signer: PrivateKeySigner,
    notion: NotionClient,
    chain: ChainClient,
    relay: SafeServiceClient,
    audit: AuditLog,
}

impl Pipeline {
    /// Wire up all clients from the configuration.
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let signer = config.owner_key.signer()?;
        let notion = NotionClient::new(
            config.notion_api_key.expose(),
            config.notion_database_id.clone(),
            config.notion_properties.clone(),
        )?;
        let chain = ChainClient::new(config.network.clone(), &config.rpc_url)?;
        let relay = SafeServiceClient::new(config.tx_service_url.clone(), config.safe_address)?;
        let audit = AuditLog::new(config.audit_dir.clone());

        info!(
            network = %config.network.name,
            safe = %config.safe_address,
            signer = %signer.address(),
            "Pipeline ready"
        );

        Ok(Self {
            config,
            signer,
            notion,
            chain,
            relay,
            audit,
        })
    }

    /// Fetch, validate, sign and propose (or execute) this period's payouts.
    pub async fn run(&self, options: RunOptions) -> Result<Outcome, PipelineError> {
        let (prepared, threshold) = match self.prepare(options).await {
            Ok(Some(prepared)) => prepared,
            Ok(None) => return Ok(Outcome::Empty),
            Err(e) => {
                self.record_failure(None, &e);
                return Err(e);
            }
        };
        self.submit(prepared, threshold, options).await
    }

    /// Build and sign the batch; `None` when there is nothing to pay.
    ///
    /// Also returns the Safe threshold reported by the service.
    async fn prepare(
        &self,
        options: RunOptions,
    ) -> Result<Option<(PreparedPayout, u64)>, PipelineError> {
        let symbol = &self.config.token_symbol;
        let decimals = self.config.token_decimals;

        self.chain.ensure_chain().await?;
        let on_chain_decimals = self.chain.token_decimals(self.config.token_address).await?;
        check_token_decimals(decimals, on_chain_decimals)?;

        let rows = self.notion.query_approved(&self.config.row_filter).await?;
        if rows.is_empty() {
            info!("No approved payout rows, nothing to process");
            return Ok(None);
        }
        for row in &rows {
            info!("{} <- {} {}", short_address(&row.address), row.amount, symbol);
        }

        let batch = build_batch(&rows, decimals)?;
        if !batch.rejected.is_empty() {
            warn!(
                rejected = batch.rejected.len(),
                "Some rows were rejected and will not be paid"
            );
        }

        let balance = self
            .chain
            .token_balance_raw(self.config.token_address, self.config.safe_address)
            .await?;
        ensure_balance(balance, &batch, decimals)?;
        info!(
            transfers = batch.len(),
            total = %batch.total_formatted(decimals),
            symbol = %symbol,
            "Batch validated"
        );

        let info = self.relay.safe_info().await?;
        self.ensure_owner(&info)?;

        let nonce = options.nonce.unwrap_or(info.nonce);
        if nonce < info.nonce {
            warn!(
                nonce,
                safe_nonce = info.nonce,
                "Nonce override is below the Safe nonce"
            );
        }

        let tx = build_safe_transaction(
            &batch,
            self.config.token_address,
            self.config.multisend_address,
            U256::from(nonce),
        );
        let safe_tx_gas = self.relay.estimate_safe_tx_gas(&tx).await;
        let tx = tx.with_safe_tx_gas(safe_tx_gas);

        let safe_tx_hash = tx.safe_tx_hash(
            self.config.network.chain_id,
            self.config.safe_address,
            info.version.as_deref(),
        );
        let signature = sign_safe_hash(&self.signer, &safe_tx_hash)?;

        let prepared = PreparedPayout {
            batch,
            tx,
            safe_tx_hash,
            signature,
        };

        self.audit.record(
            AuditEvent::new(AuditEventType::BatchPrepared)
                .with_safe(self.config.safe_address)
                .with_tx_hash(safe_tx_hash)
                .with_details(json!({
                    "dry_run": options.dry_run,
                    "nonce": nonce,
                    "total": prepared.batch.total_formatted(decimals),
                    "transfers": &prepared.batch.transfers,
                    "rejected": &prepared.batch.rejected,
                })),
        );

        Ok(Some((prepared, info.threshold)))
    }

    /// Send a signed payout; failures are audited under its `safeTxHash`.
    async fn submit(
        &self,
        prepared: PreparedPayout,
        threshold: u64,
        options: RunOptions,
    ) -> Result<Outcome, PipelineError> {
        let safe_tx_hash = prepared.safe_tx_hash;
        let result = self.submit_inner(prepared, threshold, options).await;
        if let Err(e) = &result {
            self.record_failure(Some(safe_tx_hash), e);
        }
        result
    }

    async fn submit_inner(
        &self,
        prepared: PreparedPayout,
        threshold: u64,
        options: RunOptions,
    ) -> Result<Outcome, PipelineError> {
        let safe_tx_hash = prepared.safe_tx_hash;

        if options.dry_run {
            info!(safe_tx_hash = %safe_tx_hash, "Dry run, transaction not sent");
            return Ok(Outcome::DryRun(prepared));
        }

        if options.execute {
            if threshold <= 1 {
                let signatures = [prepared.signature.clone()];
                let result = self
                    .execute_signed(&prepared.tx, safe_tx_hash, &signatures)
                    .await?;
                return Ok(Outcome::Executed { prepared, result });
            }
            warn!(
                threshold,
                "Safe needs more than one signature, proposing instead of executing"
            );
        }

        self.relay
            .propose(&prepared.tx, safe_tx_hash, &prepared.signature)
            .await?;
        self.audit.record(
            AuditEvent::new(AuditEventType::TransactionProposed)
                .with_safe(self.config.safe_address)
                .with_tx_hash(safe_tx_hash)
                .with_details(json!({
                    "nonce": prepared.tx.nonce.saturating_to::<u64>(),
                    "transfers": prepared.batch.len(),
                    "threshold": threshold,
                })),
        );

        Ok(Outcome::Proposed(prepared))
    }

    /// Fetch and validate rows and check the balance; nothing is signed.
    pub async fn preview(&self) -> Result<Preview, PipelineError> {
        let decimals = self.config.token_decimals;
        self.chain.ensure_chain().await?;
        let on_chain_decimals = self.chain.token_decimals(self.config.token_address).await?;
        check_token_decimals(decimals, on_chain_decimals)?;

        let rows = self.notion.query_approved(&self.config.row_filter).await?;
        let balance = self
            .chain
            .token_balance(
                self.config.token_address,
                self.config.safe_address,
                decimals,
                &self.config.token_symbol,
            )
            .await?;

        preview_rows(&rows, decimals, balance)
    }

    /// Add this owner's confirmation to a proposed transaction.
    pub async fn confirm(&self, safe_tx_hash: B256) -> Result<ConfirmOutcome, PipelineError> {
        let result = self.confirm_inner(safe_tx_hash).await;
        if let Err(e) = &result {
            self.record_failure(Some(safe_tx_hash), e);
        }
        result
    }

    async fn confirm_inner(&self, safe_tx_hash: B256) -> Result<ConfirmOutcome, PipelineError> {
        let pending = self.relay.transaction(safe_tx_hash).await?;
        let info = self.relay.safe_info().await?;
        self.ensure_owner(&info)?;
        verify_transaction(
            &pending,
            safe_tx_hash,
            self.config.network.chain_id,
            self.config.safe_address,
            info.version.as_deref(),
        )?;

        let required = pending.confirmations_required.unwrap_or(info.threshold);
        if pending.confirmed_by(self.signer.address()) {
            info!(safe_tx_hash = %safe_tx_hash, "Already confirmed by this owner");
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }

        let signature = sign_safe_hash(&self.signer, &safe_tx_hash)?;
        self.relay.confirm(safe_tx_hash, &signature).await?;

        let confirmations = pending.confirmations.len() + 1;
        self.audit.record(
            AuditEvent::new(AuditEventType::TransactionConfirmed)
                .with_safe(self.config.safe_address)
                .with_tx_hash(safe_tx_hash)
                .with_details(json!({
                    "owner": signature.owner.to_string(),
                    "confirmations": confirmations,
                    "required": required,
                })),
        );

        Ok(ConfirmOutcome::Confirmed {
            confirmations,
            required,
        })
    }

    /// Submit a fully confirmed proposal on chain.
    pub async fn execute(&self, safe_tx_hash: B256) -> Result<ExecutionResult, PipelineError> {
        let result = self.execute_inner(safe_tx_hash).await;
        if let Err(e) = &result {
            self.record_failure(Some(safe_tx_hash), e);
        }
        result
    }

    async fn execute_inner(&self, safe_tx_hash: B256) -> Result<ExecutionResult, PipelineError> {
        let pending = self.relay.transaction(safe_tx_hash).await?;
        let info = self.relay.safe_info().await?;
        let tx = verify_transaction(
            &pending,
            safe_tx_hash,
            self.config.network.chain_id,
            self.config.safe_address,
            info.version.as_deref(),
        )?;

        let mut signatures = pending.owner_signatures()?;
        if info.is_owner(self.signer.address()) && !pending.confirmed_by(self.signer.address()) {
            signatures.push(sign_safe_hash(&self.signer, &safe_tx_hash)?);
        }

        self.execute_signed(&tx, safe_tx_hash, &signatures).await
    }

    /// Check the Safe state on chain and send `execTransaction`.
    async fn execute_signed(
        &self,
        tx: &SafeTransaction,
        safe_tx_hash: B256,
        signatures: &[OwnerSignature],
    ) -> Result<ExecutionResult, PipelineError> {
        self.chain.ensure_chain().await?;
        let on_chain = self.chain.safe_state(self.config.safe_address).await?;
        if on_chain.nonce != tx.nonce {
            return Err(PipelineError::StaleNonce {
                tx: tx.nonce,
                safe: on_chain.nonce,
            });
        }

        let packed = collect_signatures(signatures, &on_chain.owners, on_chain.threshold)?;
        let wallet = create_wallet(self.signer.clone());
        let result = self
            .chain
            .execute(wallet, self.config.safe_address, tx, safe_tx_hash, packed)
            .await?;

        if let Some(reason) = result.failure_reason() {
            return Err(PipelineError::ExecutionFailed {
                tx_hash: result.tx_hash,
                reason,
            });
        }

        info!(
            safe_tx_hash = %safe_tx_hash,
            tx_hash = %result.tx_hash,
            block = result.block_number,
            "Safe transaction executed"
        );
        self.audit.record(
            AuditEvent::new(AuditEventType::TransactionExecuted)
                .with_safe(self.config.safe_address)
                .with_tx_hash(safe_tx_hash)
                .with_details(json!({
                    "tx_hash": &result.tx_hash,
                    "block_number": result.block_number,
                    "explorer_url": &result.explorer_url,
                })),
        );
        Ok(result)
    }

    /// Safe owners, threshold and nonce from the service plus the token balance.
    pub async fn status(&self) -> Result<SafeStatus, PipelineError> {
        let info = self.relay.safe_info().await?;
        let token_decimals = self.chain.token_decimals(self.config.token_address).await?;
        if let Err(e) = check_token_decimals(self.config.token_decimals, token_decimals) {
            warn!(error = %e, "Token decimals do not match the configuration");
        }
        let balance = self
            .chain
            .token_balance(
                self.config.token_address,
                self.config.safe_address,
                self.config.token_decimals,
                &self.config.token_symbol,
            )
            .await?;

        Ok(SafeStatus {
            safe: self.config.safe_address.to_string(),
            network: self.config.network.name.to_string(),
            nonce: info.nonce,
            threshold: info.threshold,
            signer_is_owner: info.is_owner(self.signer.address()),
            owners: info.owners,
            version: info.version,
            signer: self.signer.address().to_string(),
            token_decimals,
            balance,
        })
    }

    fn ensure_owner(&self, info: &SafeInfo) -> Result<(), PipelineError> {
        if info.is_owner(self.signer.address()) {
            Ok(())
        } else {
            Err(PipelineError::NotOwner {
                signer: self.signer.address(),
                safe: self.config.safe_address,
            })
        }
    }

    fn record_failure(&self, safe_tx_hash: Option<B256>, error: &PipelineError) {
        let mut event = AuditEvent::new(AuditEventType::RunFailed)
            .with_safe(self.config.safe_address)
            .failed(error.to_string());
        if let Some(hash) = safe_tx_hash {
            event = event.with_tx_hash(hash);
        }
        self.audit.record(event);
    }
}

/// Build the Safe transaction paying `batch`.
///
/// A single transfer calls the token directly; several are packed into one
/// `multiSend` call on MultiSendCallOnly.
pub fn build_safe_transaction(
    batch: &PayoutBatch,
    token: Address,
    multisend: Address,
    nonce: U256,
) -> SafeTransaction {
    match batch.transfers.as_slice() {
        [only] => SafeTransaction::new(
            token,
            U256::ZERO,
            transfer_calldata(only.recipient, only.units),
            Operation::Call,
            nonce,
        ),
        _ => SafeTransaction::new(
            multisend,
            U256::ZERO,
            multisend_calldata(&batch.multisend_txs(token)),
            Operation::Call,
            nonce,
        ),
    }
}

/// Check a service transaction belongs to `safe`, is still pending, and
/// hashes to `expected`; returns it as a typed transaction.
pub fn verify_transaction(
    pending: &MultisigTransaction,
    expected: B256,
    chain_id: u64,
    safe: Address,
    version: Option<&str>,
) -> Result<SafeTransaction, PipelineError> {
    let pending_safe = Address::from_str(&pending.safe).ok();
    if pending_safe != Some(safe) {
        return Err(PipelineError::WrongSafe {
            expected: safe,
            actual: pending.safe.clone(),
        });
    }
    if pending.is_executed {
        return Err(PipelineError::AlreadyExecuted(expected));
    }

    let tx = pending.to_safe_transaction()?;
    let computed = tx.safe_tx_hash(chain_id, safe, version);
    if computed != expected {
        return Err(PipelineError::HashMismatch {
            reported: expected,
            computed,
        });
    }
    Ok(tx)
}

/// Fail when `TOKEN_DECIMALS` disagrees with the token contract.
pub fn check_token_decimals(configured: u8, on_chain: u8) -> Result<(), PipelineError> {
    if configured != on_chain {
        return Err(PipelineError::DecimalsMismatch {
            configured,
            on_chain,
        });
    }
    Ok(())
}

/// Validate rows for a preview.
///
/// Unlike a run, a preview with every row rejected still succeeds so the
/// rejection reasons can be shown.
pub fn preview_rows(
    rows: &[PayoutRow],
    decimals: u8,
    balance: TokenBalance,
) -> Result<Preview, PipelineError> {
    if rows.is_empty() {
        return Ok(Preview {
            rows: 0,
            batch: None,
            balance,
            sufficient: true,
        });
    }

    let balance_raw = U256::from_str_radix(&balance.balance_raw, 10)
        .map_err(|e| ChainError::ContractError(format!("balanceOf(): {e}")))?;
    let batch = validate_rows(rows, decimals)?;
    let sufficient = match ensure_balance(balance_raw, &batch, decimals) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Safe balance does not cover the batch");
            false
        }
    };

    Ok(Preview {
        rows: rows.len(),
        batch: Some(batch),
        balance,
        sufficient,
    })
}

/// Keep signatures from current owners and pack them for `execTransaction`.
pub fn collect_signatures(
    signatures: &[OwnerSignature],
    owners: &[Address],
    threshold: u64,
) -> Result<Bytes, PipelineError> {
    let mut valid: Vec<OwnerSignature> = signatures
        .iter()
        .filter(|s| owners.contains(&s.owner))
        .cloned()
        .collect();
    valid.sort_by_key(|s| s.owner);
    valid.dedup_by_key(|s| s.owner);

    if (valid.len() as u64) < threshold {
        return Err(PipelineError::ThresholdNotMet {
            confirmations: valid.len(),
            threshold,
        });
    }
    Ok(combine_signatures(&valid))
}

/// JSON view of a Safe transaction for reports.
pub fn transaction_json(tx: &SafeTransaction) -> Value {
    json!({
        "to": tx.to.to_string(),
        "value": tx.value.to_string(),
        "data": alloy::hex::encode_prefixed(&tx.data),
        "operation": tx.operation.to_string(),
        "safeTxGas": tx.safe_tx_gas.to_string(),
        "baseGas": tx.base_gas.to_string(),
        "gasPrice": tx.gas_price.to_string(),
        "gasToken": tx.gas_token.to_string(),
        "refundReceiver": tx.refund_receiver.to_string(),
        "nonce": tx.nonce.to_string(),
    })
}

impl PreparedPayout {
    pub fn report(&self, decimals: u8) -> Value {
        json!({
            "safeTxHash": self.safe_tx_hash.to_string(),
            "sender": self.signature.owner.to_string(),
            "signature": alloy::hex::encode_prefixed(&self.signature.signature),
            "transfers": &self.batch.transfers,
            "rejected": &self.batch.rejected,
            "total": self.batch.total_formatted(decimals),
            "transaction": transaction_json(&self.tx),
        })
    }
}

impl Outcome {
    /// Machine-readable summary printed by the CLI.
    pub fn report(&self, decimals: u8) -> Value {
        match self {
            Self::Empty => json!({ "status": "empty" }),
            Self::DryRun(prepared) => {
                let mut report = prepared.report(decimals);
                report["status"] = json!("dry_run");
                report
            }
            Self::Proposed(prepared) => {
                let mut report = prepared.report(decimals);
                report["status"] = json!("proposed");
                report
            }
            Self::Executed { prepared, result } => {
                let mut report = prepared.report(decimals);
                report["status"] = json!("executed");
                report["txHash"] = json!(result.tx_hash);
                report["blockNumber"] = json!(result.block_number);
                report["explorerUrl"] = json!(result.explorer_url);
                report
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::signer_from_hex;
    use crate::blockchain::ETH_SEPOLIA;
    use alloy::primitives::address;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const SAFE: Address = address!("0x1111111111111111111111111111111111111111");
    const TOKEN: Address = address!("0x7169D38820dfd117C3FA1f22a697dBA58d90BA06");
    const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn row(page_id: &str, address: &str, amount: &str) -> PayoutRow {
        PayoutRow {
            page_id: page_id.to_string(),
            address: address.to_string(),
            amount: amount.to_string(),
            approvers: vec!["BigSong".to_string()],
            month: Some("2025.2".to_string()),
            created_time: None,
        }
    }

    fn batch(rows: &[PayoutRow]) -> PayoutBatch {
        build_batch(rows, 6).unwrap()
    }

    fn balance(raw: &str) -> TokenBalance {
        TokenBalance {
            symbol: "USDT".to_string(),
            balance_raw: raw.to_string(),
            balance_formatted: String::new(),
            decimals: 6,
            contract_address: TOKEN.to_string(),
        }
    }

    /// A pipeline whose RPC and Safe service endpoints refuse connections.
    fn unreachable_pipeline(audit_dir: &TempDir) -> Pipeline {
        let env: HashMap<&str, String> = HashMap::from([
            ("NOTION_API_KEY", "secret_test".to_string()),
            ("NOTION_DATABASE_ID", "db-123".to_string()),
            ("RPC_URL", "http://127.0.0.1:1".to_string()),
            ("SAFE_TX_SERVICE_URL", "http://127.0.0.1:1/api".to_string()),
            ("SAFE_ADDRESS", SAFE.to_string()),
            ("USDT_CONTRACT", TOKEN.to_string()),
            ("PRIVATE_KEY", KEY_0.to_string()),
            ("AUDIT_DIR", audit_dir.path().display().to_string()),
        ]);
        let config = Config::from_lookup(|name| env.get(name).cloned()).unwrap();
        Pipeline::new(config).unwrap()
    }

    fn pending_fixture(
        tx: &SafeTransaction,
        hash: B256,
        confirmations: Value,
    ) -> MultisigTransaction {
        serde_json::from_value(json!({
            "safe": SAFE.to_string(),
            "to": tx.to.to_string(),
            "value": tx.value.to_string(),
            "data": alloy::hex::encode_prefixed(&tx.data),
            "operation": 0,
            "safeTxGas": tx.safe_tx_gas.to_string(),
            "baseGas": "0",
            "gasPrice": "0",
            "gasToken": Address::ZERO.to_string(),
            "refundReceiver": Address::ZERO.to_string(),
            "nonce": tx.nonce.to_string(),
            "safeTxHash": hash.to_string(),
            "isExecuted": false,
            "confirmationsRequired": 2,
            "confirmations": confirmations,
        }))
        .unwrap()
    }

    #[test]
    fn single_transfer_calls_token() {
        let batch = batch(&[row("p1", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "12.5")]);
        let multisend = ETH_SEPOLIA.multisend_call_only;
        let tx = build_safe_transaction(&batch, TOKEN, multisend, U256::from(7));

        assert_eq!(tx.to, TOKEN);
        assert_eq!(tx.operation, Operation::Call);
        assert_eq!(tx.nonce, U256::from(7));
        assert_eq!(&tx.data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn several_transfers_use_multisend() {
        let batch = batch(&[
            row("p1", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "12.5"),
            row("p2", "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC", "100"),
        ]);
        let multisend = ETH_SEPOLIA.multisend_call_only;
        let tx = build_safe_transaction(&batch, TOKEN, multisend, U256::ZERO);

        assert_eq!(tx.to, ETH_SEPOLIA.multisend_call_only);
        assert_eq!(tx.operation, Operation::Call);
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(&tx.data[..4], &[0x8d, 0x80, 0xff, 0x0a]);
        assert_eq!(tx.data, multisend_calldata(&batch.multisend_txs(TOKEN)));
    }

    #[test]
    fn verify_accepts_matching_hash() {
        let batch = batch(&[row("p1", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "1")]);
        let multisend = ETH_SEPOLIA.multisend_call_only;
        let tx = build_safe_transaction(&batch, TOKEN, multisend, U256::from(3));
        let hash = tx.safe_tx_hash(ETH_SEPOLIA.chain_id, SAFE, Some("1.4.1"));
        let pending = pending_fixture(&tx, hash, json!([]));

        let rebuilt =
            verify_transaction(&pending, hash, ETH_SEPOLIA.chain_id, SAFE, Some("1.4.1")).unwrap();
        assert_eq!(rebuilt, tx);
    }

    #[test]
    fn verify_rejects_tampered_or_foreign() {
        let batch = batch(&[row("p1", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "1")]);
        let multisend = ETH_SEPOLIA.multisend_call_only;
        let tx = build_safe_transaction(&batch, TOKEN, multisend, U256::from(3));
        let hash = tx.safe_tx_hash(ETH_SEPOLIA.chain_id, SAFE, Some("1.4.1"));
        let pending = pending_fixture(&tx, hash, json!([]));

        // wrong chain id changes the domain
        assert!(matches!(
            verify_transaction(&pending, hash, 1, SAFE, Some("1.4.1")),
            Err(PipelineError::HashMismatch { .. })
        ));

        let other = address!("0x2222222222222222222222222222222222222222");
        assert!(matches!(
            verify_transaction(&pending, hash, ETH_SEPOLIA.chain_id, other, Some("1.4.1")),
            Err(PipelineError::WrongSafe { .. })
        ));

        let mut executed = pending.clone();
        executed.is_executed = true;
        assert!(matches!(
            verify_transaction(&executed, hash, ETH_SEPOLIA.chain_id, SAFE, Some("1.4.1")),
            Err(PipelineError::AlreadyExecuted(_))
        ));
    }

    #[test]
    fn collect_signatures_enforces_threshold() {
        let hash = B256::repeat_byte(0x42);
        let owner_0 = signer_from_hex(KEY_0).unwrap();
        let owner_1 = signer_from_hex(KEY_1).unwrap();
        let sig_0 = sign_safe_hash(&owner_0, &hash).unwrap();
        let sig_1 = sign_safe_hash(&owner_1, &hash).unwrap();
        let owners = [owner_0.address(), owner_1.address()];

        assert!(matches!(
            collect_signatures(&[sig_0.clone()], &owners, 2),
            Err(PipelineError::ThresholdNotMet {
                confirmations: 1,
                threshold: 2
            })
        ));
        // duplicates count once
        assert!(matches!(
            collect_signatures(&[sig_0.clone(), sig_0.clone()], &owners, 2),
            Err(PipelineError::ThresholdNotMet { confirmations: 1, .. })
        ));

        let packed = collect_signatures(&[sig_0.clone(), sig_1.clone()], &owners, 2).unwrap();
        assert_eq!(packed.len(), 130);
        // 0x7099... sorts before 0xf39F...
        assert_eq!(&packed[..65], &sig_1.signature[..]);
        assert_eq!(&packed[65..], &sig_0.signature[..]);
    }

    #[test]
    fn collect_signatures_ignores_non_owners() {
        let hash = B256::repeat_byte(0x42);
        let owner = signer_from_hex(KEY_0).unwrap();
        let stranger = signer_from_hex(KEY_1).unwrap();
        let signatures = [
            sign_safe_hash(&owner, &hash).unwrap(),
            sign_safe_hash(&stranger, &hash).unwrap(),
        ];

        let packed = collect_signatures(&signatures, &[owner.address()], 1).unwrap();
        assert_eq!(packed.len(), 65);
        assert!(collect_signatures(&signatures, &[owner.address()], 2).is_err());
    }

    #[test]
    fn pending_signatures_round_into_execution() {
        let batch = batch(&[row("p1", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "1")]);
        let multisend = ETH_SEPOLIA.multisend_call_only;
        let tx = build_safe_transaction(&batch, TOKEN, multisend, U256::ZERO);
        let hash = tx.safe_tx_hash(ETH_SEPOLIA.chain_id, SAFE, None);
        let owner = signer_from_hex(KEY_0).unwrap();
        let sig = sign_safe_hash(&owner, &hash).unwrap();

        let pending = pending_fixture(
            &tx,
            hash,
            json!([{
                "owner": owner.address().to_string(),
                "signature": alloy::hex::encode_prefixed(&sig.signature),
                "signatureType": "EOA",
            }]),
        );

        assert!(pending.confirmed_by(owner.address()));
        let signatures = pending.owner_signatures().unwrap();
        let packed = collect_signatures(&signatures, &[owner.address()], 1).unwrap();
        assert_eq!(packed, sig.signature);
    }

    #[test]
    fn outcome_report_shape() {
        let batch = batch(&[
            row("p1", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "12.5"),
            row("p2", "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC", "100"),
        ]);
        let multisend = ETH_SEPOLIA.multisend_call_only;
        let tx = build_safe_transaction(&batch, TOKEN, multisend, U256::from(9));
        let safe_tx_hash = tx.safe_tx_hash(ETH_SEPOLIA.chain_id, SAFE, None);
        let signature = sign_safe_hash(&signer_from_hex(KEY_0).unwrap(), &safe_tx_hash).unwrap();
        let outcome = Outcome::DryRun(PreparedPayout {
            batch,
            tx,
            safe_tx_hash,
            signature,
        });

        let report = outcome.report(6);
        assert_eq!(report["status"], "dry_run");
        assert_eq!(report["total"], "112.5");
        assert_eq!(report["transaction"]["nonce"], "9");
        assert_eq!(report["transaction"]["operation"], "CALL");
        assert_eq!(report["transfers"].as_array().unwrap().len(), 2);
        assert_eq!(Outcome::Empty.report(6)["status"], "empty");
    }

    #[test]
    fn token_decimals_must_match() {
        assert!(check_token_decimals(6, 6).is_ok());
        assert!(matches!(
            check_token_decimals(18, 6),
            Err(PipelineError::DecimalsMismatch {
                configured: 18,
                on_chain: 6
            })
        ));
    }

    #[test]
    fn preview_lists_rejections_when_nothing_is_payable() {
        let rows = [row("p1", "garbage", "1"), row("p2", "0x1234", "5")];
        let preview = preview_rows(&rows, 6, balance("0")).unwrap();

        assert_eq!(preview.rows, 2);
        assert!(preview.sufficient);
        let batch = preview.batch.unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.rejected.len(), 2);
    }

    #[test]
    fn preview_flags_short_balance() {
        let rows = [
            row("p1", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "2"),
            row("p2", "nope", "1"),
        ];
        let preview = preview_rows(&rows, 6, balance("1500000")).unwrap();
        assert!(!preview.sufficient);
        assert_eq!(preview.batch.unwrap().len(), 1);

        let empty = preview_rows(&[], 6, balance("0")).unwrap();
        assert!(empty.batch.is_none());
        assert!(preview_rows(&rows, 6, balance("lots")).is_err());
    }

    #[tokio::test]
    async fn failed_proposal_is_audited_with_hash() {
        let audit_dir = TempDir::new().unwrap();
        let pipeline = unreachable_pipeline(&audit_dir);

        let batch = batch(&[row("p1", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "3")]);
        let multisend = ETH_SEPOLIA.multisend_call_only;
        let tx = build_safe_transaction(&batch, TOKEN, multisend, U256::from(4));
        let safe_tx_hash = tx.safe_tx_hash(ETH_SEPOLIA.chain_id, SAFE, None);
        let signature = sign_safe_hash(&signer_from_hex(KEY_0).unwrap(), &safe_tx_hash).unwrap();
        let prepared = PreparedPayout {
            batch,
            tx,
            safe_tx_hash,
            signature,
        };

        let err = pipeline
            .submit(prepared, 2, RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Relay(_)));

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let events = AuditLog::new(audit_dir.path())
            .events_for_tx(&safe_tx_hash.to_string(), &today)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::RunFailed);
        assert!(!events[0].success);
    }

    #[tokio::test]
    async fn dry_run_submits_nothing() {
        let audit_dir = TempDir::new().unwrap();
        let pipeline = unreachable_pipeline(&audit_dir);

        let batch = batch(&[row("p1", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "3")]);
        let multisend = ETH_SEPOLIA.multisend_call_only;
        let tx = build_safe_transaction(&batch, TOKEN, multisend, U256::ZERO);
        let safe_tx_hash = tx.safe_tx_hash(ETH_SEPOLIA.chain_id, SAFE, None);
        let signature = sign_safe_hash(&signer_from_hex(KEY_0).unwrap(), &safe_tx_hash).unwrap();
        let prepared = PreparedPayout {
            batch,
            tx,
            safe_tx_hash,
            signature,
        };

        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let outcome = pipeline.submit(prepared, 1, options).await.unwrap();
        assert!(matches!(outcome, Outcome::DryRun(_)));
    }
}
