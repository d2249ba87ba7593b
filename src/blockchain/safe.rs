// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Safe multisig transactions.
//!
//! A Safe transaction is identified by its EIP-712 hash (`safeTxHash`), which
//! every owner signs. Once `threshold` owners have signed, the signatures are
//! concatenated in ascending owner order and passed to `execTransaction`.

use std::fmt;

use alloy::{
    primitives::{Address, Bytes, Log, B256, U256},
    sol,
    sol_types::{eip712_domain, Eip712Domain, SolEvent, SolStruct},
};

sol! {
    #[derive(Debug)]
    struct SafeTx {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 safeTxGas;
        uint256 baseGas;
        uint256 gasPrice;
        address gasToken;
        address refundReceiver;
        uint256 nonce;
    }
}

sol! {
    #[sol(rpc)]
    interface ISafe {
        function nonce() external view returns (uint256);
        function getThreshold() external view returns (uint256);
        function getOwners() external view returns (address[] memory);
        function execTransaction(
            address to,
            uint256 value,
            bytes calldata data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address refundReceiver,
            bytes memory signatures
        ) external payable returns (bool success);

        event ExecutionSuccess(bytes32 txHash, uint256 payment);
        event ExecutionFailure(bytes32 txHash, uint256 payment);
    }
}

/// Safe call type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    Call = 0,
    DelegateCall = 1,
}

impl TryFrom<u8> for Operation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Call),
            1 => Ok(Self::DelegateCall),
            other => Err(format!("unknown Safe operation {other}")),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::DelegateCall => write!(f, "DELEGATECALL"),
        }
    }
}

/// A Safe multisig transaction prior to execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: Operation,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub nonce: U256,
}

impl SafeTransaction {
    /// Create a transaction with no gas refund (all gas fields zero).
    pub fn new(to: Address, value: U256, data: Bytes, operation: Operation, nonce: U256) -> Self {
        Self {
            to,
            value,
            data,
            operation,
            safe_tx_gas: U256::ZERO,
            base_gas: U256::ZERO,
            gas_price: U256::ZERO,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
            nonce,
        }
    }

    /// Set `safeTxGas`.
    pub fn with_safe_tx_gas(mut self, safe_tx_gas: U256) -> Self {
        self.safe_tx_gas = safe_tx_gas;
        self
    }

    fn as_typed(&self) -> SafeTx {
        SafeTx {
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            operation: self.operation as u8,
            safeTxGas: self.safe_tx_gas,
            baseGas: self.base_gas,
            gasPrice: self.gas_price,
            gasToken: self.gas_token,
            refundReceiver: self.refund_receiver,
            nonce: self.nonce,
        }
    }

    /// Compute the EIP-712 `safeTxHash` for a Safe at `safe` on `chain_id`.
    ///
    /// `version` is the Safe contract version; deployments older than 1.3.0
    /// omit the chain id from their domain.
    pub fn safe_tx_hash(&self, chain_id: u64, safe: Address, version: Option<&str>) -> B256 {
        let domain = safe_domain(chain_id, safe, version);
        self.as_typed().eip712_signing_hash(&domain)
    }

    /// Build the `execTransaction` call for this transaction.
    pub fn exec_call(&self, signatures: Bytes) -> ISafe::execTransactionCall {
        ISafe::execTransactionCall {
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            operation: self.operation as u8,
            safeTxGas: self.safe_tx_gas,
            baseGas: self.base_gas,
            gasPrice: self.gas_price,
            gasToken: self.gas_token,
            refundReceiver: self.refund_receiver,
            signatures,
        }
    }
}

/// EIP-712 domain of a Safe.
pub fn safe_domain(chain_id: u64, safe: Address, version: Option<&str>) -> Eip712Domain {
    if version.map(is_legacy_version).unwrap_or(false) {
        eip712_domain! {
            verifying_contract: safe,
        }
    } else {
        eip712_domain! {
            chain_id: chain_id,
            verifying_contract: safe,
        }
    }
}

/// Whether a Safe version string predates 1.3.0.
fn is_legacy_version(version: &str) -> bool {
    // strip build metadata such as "1.3.0+L2"
    let core = version.split(['+', '-']).next().unwrap_or(version);
    let mut parts = core.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    (major, minor) < (1, 3)
}

/// A single owner's signature over a `safeTxHash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSignature {
    pub owner: Address,
    pub signature: Bytes,
}

/// Concatenate owner signatures in ascending owner order, as `execTransaction`
/// requires.
pub fn combine_signatures(signatures: &[OwnerSignature]) -> Bytes {
    let mut sorted: Vec<&OwnerSignature> = signatures.iter().collect();
    sorted.sort_by_key(|s| s.owner);
    sorted.dedup_by_key(|s| s.owner);

    let mut out = Vec::with_capacity(sorted.len() * 65);
    for sig in sorted {
        out.extend_from_slice(&sig.signature);
    }
    out.into()
}

/// How the Safe reported the inner call of an `execTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionEvent {
    Success,
    Failure,
}

/// Find the Safe's execution event for `safe_tx_hash` among receipt logs.
///
/// With a non-zero `safeTxGas` or `gasPrice` the Safe does not revert when
/// the inner call fails; it emits `ExecutionFailure` and still consumes the
/// nonce, so the receipt status alone is not enough.
pub fn execution_event(
    logs: &[Log],
    safe: Address,
    safe_tx_hash: B256,
) -> Option<ExecutionEvent> {
    logs.iter()
        .filter(|log| log.address == safe)
        .find_map(|log| {
            let topics = log.data.topics();
            let event = match topics.first()? {
                t if *t == ISafe::ExecutionSuccess::SIGNATURE_HASH => ExecutionEvent::Success,
                t if *t == ISafe::ExecutionFailure::SIGNATURE_HASH => ExecutionEvent::Failure,
                _ => return None,
            };
            // 1.3.0+ emits txHash in data; some deployments index it
            let hash = match topics.get(1) {
                Some(topic) => *topic,
                None => B256::from_slice(log.data.data.get(..32)?),
            };
            (hash == safe_tx_hash).then_some(event)
        })
}
