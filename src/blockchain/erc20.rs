// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 token contract interactions.

use alloy::{
    primitives::{Address, Bytes, U256},
    providers::Provider,
    sol,
    sol_types::SolCall,
};

use super::client::ChainError;
use super::types::{format_amount, TokenBalance};

// Define the ERC-20 interface using alloy's sol! macro
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// ABI-encode a `transfer(to, amount)` call.
pub fn transfer_calldata(to: Address, amount: U256) -> Bytes {
    IERC20::transferCall { to, amount }.abi_encode().into()
}

/// ERC-20 contract wrapper.
pub struct Erc20Contract<P> {
    contract: IERC20::IERC20Instance<P>,
    address: Address,
}

impl<P: Provider + Clone> Erc20Contract<P> {
    /// Create a new ERC-20 contract instance.
    pub fn new(provider: &P, address: Address) -> Self {
        let contract = IERC20::new(address, provider.clone());
        Self { contract, address }
    }

    /// Get the token symbol.
    pub async fn symbol(&self) -> Result<String, ChainError> {
        self.contract
            .symbol()
            .call()
            .await
            .map_err(|e| ChainError::ContractError(e.to_string()))
    }

    /// Get the token decimals.
    pub async fn decimals(&self) -> Result<u8, ChainError> {
        self.contract
            .decimals()
            .call()
            .await
            .map_err(|e| ChainError::ContractError(e.to_string()))
    }

    /// Get the raw balance of an address.
    pub async fn raw_balance_of(&self, owner: Address) -> Result<U256, ChainError> {
        self.contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| ChainError::ContractError(e.to_string()))
    }

    /// Get the balance of an address with display metadata.
    ///
    /// `fallback_symbol` is used when the token does not implement `symbol()`.
    pub async fn balance_of(
        &self,
        owner: Address,
        decimals: u8,
        fallback_symbol: &str,
    ) -> Result<TokenBalance, ChainError> {
        let symbol: String = self
            .symbol()
            .await
            .unwrap_or_else(|_| fallback_symbol.to_string());
        let balance = self.raw_balance_of(owner).await?;

        Ok(TokenBalance {
            symbol,
            balance_raw: balance.to_string(),
            balance_formatted: format_amount(balance, decimals),
            decimals,
            contract_address: self.address.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_transfer_calldata_layout() {
        let to = address!("0xe8dB51eeFd0D9ad2c4f23BD063043cEfCa3cCe77");
        let data = transfer_calldata(to, U256::from(880_000u64));

        // selector + two 32-byte words
        assert_eq!(data.len(), 4 + 32 + 32);
        // transfer(address,uint256)
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data[4 + 12..4 + 32], to.as_slice());
        assert_eq!(
            U256::from_be_slice(&data[36..68]),
            U256::from(880_000u64)
        );
    }

    #[test]
    fn test_transfer_calldata_decodes() {
        let to = address!("0x5AFa5a4ff6A6a6e79Ab0D90a300541f69b3De17D");
        let data = transfer_calldata(to, U256::from(500_000u64));
        let decoded = IERC20::transferCall::abi_decode(&data).unwrap();
        assert_eq!(decoded.to, to);
        assert_eq!(decoded.amount, U256::from(500_000u64));
    }
}
