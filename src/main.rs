// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::str::FromStr;

use alloy::primitives::B256;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};

use safe_payouts::config::{Config, ConfigError};
use safe_payouts::error::PipelineError;
use safe_payouts::logging::{self, LogFormat};
use safe_payouts::pipeline::{ConfirmOutcome, Pipeline, RunOptions};

#[derive(Parser)]
#[command(name = "safe-payouts")]
#[command(about = "Pay approved Notion rows in USDT from a Safe multisig", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch approved rows, sign the batch and propose it to the Safe service
    Run {
        /// Build and sign the transaction without sending it
        #[arg(long)]
        dry_run: bool,
        /// Execute on chain directly when the Safe threshold is 1
        #[arg(long, conflicts_with = "dry_run")]
        execute: bool,
        /// Override the Safe nonce
        #[arg(long)]
        nonce: Option<u64>,
    },
    /// Validate rows and check the Safe balance without signing
    Preview,
    /// Add this owner's confirmation to a proposed transaction
    Confirm {
        /// safeTxHash of the proposal
        #[arg(value_parser = parse_hash)]
        safe_tx_hash: B256,
    },
    /// Execute a proposal that has enough confirmations
    Execute {
        /// safeTxHash of the proposal
        #[arg(value_parser = parse_hash)]
        safe_tx_hash: B256,
    },
    /// Show Safe owners, threshold, nonce and token balance
    Status,
}

fn to_report<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| json!({ "error": e.to_string() }))
}

fn parse_hash(raw: &str) -> Result<B256, String> {
    B256::from_str(raw.trim()).map_err(|e| format!("invalid safeTxHash: {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // loads `.env`, so LOG_FORMAT is visible to the subscriber
    let config = Config::from_env();
    logging::init(LogFormat::from_env());

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "safe-payouts failed");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli, config: Result<Config, ConfigError>) -> Result<(), PipelineError> {
    let config = config?;
    let decimals = config.token_decimals;
    let pipeline = Pipeline::new(config)?;

    let command = cli.command.unwrap_or(Commands::Run {
        dry_run: false,
        execute: false,
        nonce: None,
    });

    let report = match command {
        Commands::Run {
            dry_run,
            execute,
            nonce,
        } => pipeline
            .run(RunOptions {
                dry_run,
                execute,
                nonce,
            })
            .await?
            .report(decimals),
        Commands::Preview => to_report(&pipeline.preview().await?),
        Commands::Confirm { safe_tx_hash } => match pipeline.confirm(safe_tx_hash).await? {
            ConfirmOutcome::Confirmed {
                confirmations,
                required,
            } => json!({
                "status": "confirmed",
                "safeTxHash": safe_tx_hash.to_string(),
                "confirmations": confirmations,
                "required": required,
            }),
            ConfirmOutcome::AlreadyConfirmed => json!({
                "status": "already_confirmed",
                "safeTxHash": safe_tx_hash.to_string(),
            }),
        },
        Commands::Execute { safe_tx_hash } => {
            let result = pipeline.execute(safe_tx_hash).await?;
            json!({
                "status": "executed",
                "safeTxHash": safe_tx_hash.to_string(),
                "txHash": result.tx_hash,
                "blockNumber": result.block_number,
                "explorerUrl": result.explorer_url,
            })
        }
        Commands::Status => to_report(&pipeline.status().await?),
    };

    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{text}"),
        Err(e) => tracing::warn!(error = %e, "Failed to render report"),
    }
    Ok(())
}
