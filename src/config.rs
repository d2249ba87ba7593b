// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once at startup from the environment (a `.env` file
//! in the working directory is loaded first when present).
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `NOTION_API_KEY` | Notion integration token | Required |
//! | `NOTION_DATABASE_ID` | Payout database ID | Required |
//! | `NOTION_MONTH` | Month select value to pay (e.g. `2025.2`) | Any |
//! | `NOTION_APPROVER` | Approver display name required on each row | Any approver |
//! | `NOTION_CREATED_AFTER` | Only rows created on/after this date | None |
//! | `NOTION_PROP_ADDRESS` | Address column | `地址` |
//! | `NOTION_PROP_AMOUNT` | Amount column | `USDT` |
//! | `NOTION_PROP_APPROVER` | Approver column | `审核完毕，Signer` |
//! | `NOTION_PROP_MONTH` | Month column | `月份` |
//! | `NETWORK` | `mainnet` or `sepolia` | `sepolia` |
//! | `RPC_URL` | Ethereum JSON-RPC endpoint | Required |
//! | `SAFE_ADDRESS` | Paying Safe | Required |
//! | `USDT_CONTRACT` | Token contract | Required |
//! | `TOKEN_DECIMALS` | Token decimals | `6` |
//! | `TOKEN_SYMBOL` | Token symbol for display | `USDT` |
//! | `MULTISEND_ADDRESS` | MultiSendCallOnly override | Per network |
//! | `SAFE_TX_SERVICE_URL` | Safe Transaction Service base URL | Per network |
//! | `PRIVATE_KEY` | Owner key, hex | One of the two key vars |
//! | `PRIVATE_KEY_PEM_PATH` | Owner key, PEM file | One of the two key vars |
//! | `AUDIT_DIR` | Audit ledger directory | `./audit` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `safe_payouts=info,warn` |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use chrono::{DateTime, NaiveDate};

use crate::blockchain::{self, signing, ChainError, NetworkConfig};
use crate::notion::{PropertyNames, RowFilter};

pub const NOTION_API_KEY_ENV: &str = "NOTION_API_KEY";
pub const NOTION_DATABASE_ID_ENV: &str = "NOTION_DATABASE_ID";
pub const NOTION_MONTH_ENV: &str = "NOTION_MONTH";
pub const NOTION_APPROVER_ENV: &str = "NOTION_APPROVER";
pub const NOTION_CREATED_AFTER_ENV: &str = "NOTION_CREATED_AFTER";
pub const NETWORK_ENV: &str = "NETWORK";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const SAFE_ADDRESS_ENV: &str = "SAFE_ADDRESS";
pub const TOKEN_CONTRACT_ENV: &str = "USDT_CONTRACT";
pub const TOKEN_DECIMALS_ENV: &str = "TOKEN_DECIMALS";
pub const TOKEN_SYMBOL_ENV: &str = "TOKEN_SYMBOL";
pub const MULTISEND_ADDRESS_ENV: &str = "MULTISEND_ADDRESS";
pub const SAFE_TX_SERVICE_URL_ENV: &str = "SAFE_TX_SERVICE_URL";
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";
pub const PRIVATE_KEY_PEM_PATH_ENV: &str = "PRIVATE_KEY_PEM_PATH";
pub const AUDIT_DIR_ENV: &str = "AUDIT_DIR";

const DEFAULT_TOKEN_DECIMALS: u8 = 6;
const DEFAULT_TOKEN_SYMBOL: &str = "USDT";
const DEFAULT_AUDIT_DIR: &str = "./audit";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Where the owner key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum OwnerKey {
    Hex(String),
    PemFile(PathBuf),
}

impl fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(_) => write!(f, "Hex(<redacted>)"),
            Self::PemFile(path) => f.debug_tuple("PemFile").field(path).finish(),
        }
    }
}

impl OwnerKey {
    /// Load the key into a signer.
    pub fn signer(&self) -> Result<PrivateKeySigner, ChainError> {
        match self {
            Self::Hex(hex) => signing::signer_from_hex(hex),
            Self::PemFile(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    ChainError::InvalidPrivateKey(format!("{}: {e}", path.display()))
                })?;
                signing::signer_from_pem(&bytes)
            }
        }
    }
}

/// Notion API credentials are secret too.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub notion_api_key: ApiKey,
    pub notion_database_id: String,
    pub notion_properties: PropertyNames,
    pub row_filter: RowFilter,
    pub network: NetworkConfig,
    pub rpc_url: String,
    pub safe_address: Address,
    pub token_address: Address,
    pub token_decimals: u8,
    pub token_symbol: String,
    pub multisend_address: Address,
    pub tx_service_url: String,
    pub owner_key: OwnerKey,
    pub audit_dir: PathBuf,
}

impl Config {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let network = blockchain::network_by_key(env.optional(NETWORK_ENV).as_deref())
            .map_err(|reason| invalid(NETWORK_ENV, reason))?;

        let rpc_url = env.required(RPC_URL_ENV)?;
        url::Url::parse(&rpc_url).map_err(|e| invalid(RPC_URL_ENV, e.to_string()))?;

        let safe_address = env.address(SAFE_ADDRESS_ENV)?;
        let token_address = env.address(TOKEN_CONTRACT_ENV)?;
        let multisend_address = match env.optional(MULTISEND_ADDRESS_ENV) {
            Some(_) => env.address(MULTISEND_ADDRESS_ENV)?,
            None => network.multisend_call_only,
        };

        let token_decimals = match env.optional(TOKEN_DECIMALS_ENV) {
            Some(raw) => raw
                .parse::<u8>()
                .ok()
                .filter(|d| *d <= 36)
                .ok_or_else(|| invalid(TOKEN_DECIMALS_ENV, format!("`{raw}` is not 0..=36")))?,
            None => DEFAULT_TOKEN_DECIMALS,
        };

        let owner_key = match (
            env.optional(PRIVATE_KEY_ENV),
            env.optional(PRIVATE_KEY_PEM_PATH_ENV),
        ) {
            (Some(hex), _) => OwnerKey::Hex(hex),
            (None, Some(path)) => OwnerKey::PemFile(PathBuf::from(path)),
            (None, None) => return Err(ConfigError::Missing(PRIVATE_KEY_ENV.to_string())),
        };

        let defaults = PropertyNames::default();
        let notion_properties = PropertyNames {
            address: env.or_default("NOTION_PROP_ADDRESS", &defaults.address),
            amount: env.or_default("NOTION_PROP_AMOUNT", &defaults.amount),
            approver: env.or_default("NOTION_PROP_APPROVER", &defaults.approver),
            month: env.or_default("NOTION_PROP_MONTH", &defaults.month),
        };

        let row_filter = RowFilter {
            created_after: env
                .optional(NOTION_CREATED_AFTER_ENV)
                .map(|raw| parse_date(&raw))
                .transpose()
                .map_err(|reason| invalid(NOTION_CREATED_AFTER_ENV, reason))?,
            month: env.optional(NOTION_MONTH_ENV),
            approver: env.optional(NOTION_APPROVER_ENV),
        };

        Ok(Self {
            notion_api_key: ApiKey(env.required(NOTION_API_KEY_ENV)?),
            notion_database_id: env.required(NOTION_DATABASE_ID_ENV)?,
            notion_properties,
            row_filter,
            tx_service_url: env.or_default(SAFE_TX_SERVICE_URL_ENV, network.tx_service_url),
            network,
            rpc_url,
            safe_address,
            token_address,
            token_decimals,
            token_symbol: env.or_default(TOKEN_SYMBOL_ENV, DEFAULT_TOKEN_SYMBOL),
            multisend_address,
            owner_key,
            audit_dir: PathBuf::from(env.or_default(AUDIT_DIR_ENV, DEFAULT_AUDIT_DIR)),
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Trimmed value, treating blank as unset.
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn address(&self, name: &str) -> Result<Address, ConfigError> {
        let raw = self.required(name)?;
        Address::from_str(&raw).map_err(|e| invalid(name, e.to_string()))
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Accept `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|e| format!("`{raw}` is not a date: {e}"))
}
