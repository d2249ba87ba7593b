// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! MultiSend batching.
//!
//! The MultiSend contracts take a single `bytes` argument holding a packed
//! list of calls. Each entry is laid out as:
//!
//! ```text
//! operation (1) | to (20) | value (32) | data length (32) | data (n)
//! ```
//!
//! Batches are always sent to `MultiSendCallOnly` with a plain CALL from the
//! Safe, so every entry must itself be a CALL.

use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};

use super::safe::Operation;

sol! {
    interface IMultiSend {
        function multiSend(bytes memory transactions) external payable;
    }
}

/// One call inside a MultiSend batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSendTx {
    pub operation: Operation,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl MultiSendTx {
    /// A plain CALL with no ether attached.
    pub fn call(to: Address, data: Bytes) -> Self {
        Self {
            operation: Operation::Call,
            to,
            value: U256::ZERO,
            data,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.operation as u8);
        out.extend_from_slice(self.to.as_slice());
        out.extend_from_slice(&self.value.to_be_bytes::<32>());
        out.extend_from_slice(&U256::from(self.data.len()).to_be_bytes::<32>());
        out.extend_from_slice(&self.data);
    }
}

/// Pack a list of calls into the MultiSend `transactions` blob.
pub fn encode_packed(txs: &[MultiSendTx]) -> Bytes {
    let capacity = txs.iter().map(|tx| 85 + tx.data.len()).sum();
    let mut out = Vec::with_capacity(capacity);
    for tx in txs {
        tx.encode_into(&mut out);
    }
    out.into()
}

/// ABI-encode `multiSend(bytes)` for the given calls.
pub fn multisend_calldata(txs: &[MultiSendTx]) -> Bytes {
    IMultiSend::multiSendCall {
        transactions: encode_packed(txs),
    }
    .abi_encode()
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::erc20::transfer_calldata;
    use alloy::primitives::address;

    const USDT: Address = address!("0x7169D38820dfd117C3FA1f22a697dBA58d90BA06");

    fn sample_batch() -> Vec<MultiSendTx> {
        vec![
            MultiSendTx::call(
                USDT,
                transfer_calldata(
                    address!("0xe8dB51eeFd0D9ad2c4f23BD063043cEfCa3cCe77"),
                    U256::from(880_000u64),
                ),
            ),
            MultiSendTx::call(
                USDT,
                transfer_calldata(
                    address!("0x5AFa5a4ff6A6a6e79Ab0D90a300541f69b3De17D"),
                    U256::from(500_000u64),
                ),
            ),
        ]
    }

    #[test]
    fn test_encode_packed_layout() {
        let batch = sample_batch();
        let packed = encode_packed(&batch);

        // 68-byte transfer calldata per entry
        let entry_len = 1 + 20 + 32 + 32 + 68;
        assert_eq!(packed.len(), entry_len * 2);

        // first entry header
        assert_eq!(packed[0], 0);
        assert_eq!(&packed[1..21], USDT.as_slice());
        assert_eq!(U256::from_be_slice(&packed[21..53]), U256::ZERO);
        assert_eq!(U256::from_be_slice(&packed[53..85]), U256::from(68u64));
        assert_eq!(&packed[85..entry_len], batch[0].data.as_ref());

        // second entry starts right after the first
        assert_eq!(packed[entry_len], 0);
        assert_eq!(&packed[entry_len + 1..entry_len + 21], USDT.as_slice());
    }

    #[test]
    fn test_multisend_calldata_wraps_packed_bytes() {
        let batch = sample_batch();
        let calldata = multisend_calldata(&batch);

        // multiSend(bytes)
        assert_eq!(&calldata[..4], &[0x8d, 0x80, 0xff, 0x0a]);

        let decoded = IMultiSend::multiSendCall::abi_decode(&calldata).unwrap();
        assert_eq!(decoded.transactions, encode_packed(&batch));
    }

    #[test]
    fn test_encode_packed_empty() {
        assert!(encode_packed(&[]).is_empty());
    }
}
