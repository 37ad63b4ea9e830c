//! # covenant: Single-Use Key Covenant CLI
//!
//! Commits a wallet-funded PSBT to one pre-signed follow-on transaction and
//! later rebuilds that transaction from the broadcast covenant transaction.
//!
//! ## Flow
//!
//! ```bash
//! # 1. Fund a PSBT paying the placeholder output (or use bitcoin-cli):
//! #    bitcoin-cli walletcreatefundedpsbt '[]' \
//! #      '[{"bcrt1pqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqm3usuw": 0.01}]' \
//! #      0 '{"changePosition": 1}'
//! covenant fund --amount 1000000
//!
//! # 2. Rewrite the placeholder into the covenant output and embed the
//! #    follow-on signature
//! covenant create <psbt>
//!
//! # 3. Sign, finalize with the annex, broadcast
//!
//! # 4. Rebuild and broadcast the follow-on transaction
//! covenant spend <covenant-tx-hex>
//! covenant broadcast <follow-on-hex>
//! ```
//!
//! Each command prints exactly one artifact on stdout. Logs go to stderr and
//! are controlled with `RUST_LOG`.

use anyhow::{Context, Result};
use bitcoin::{
    consensus::encode::{deserialize, serialize_hex},
    Amount, Transaction, Txid,
};
use clap::{Parser, Subcommand};
use ephemeral_covenant::{
    config::{covenant as covenant_config, CovenantConfig},
    covenant::{self, verify_spend},
    services::NodeClient,
};
use std::{path::PathBuf, str::FromStr};

#[derive(Parser)]
#[command(name = "covenant")]
#[command(about = "Single-use key covenants with the follow-on signature carried in the annex")]
struct Cli {
    /// JSON configuration file; defaults and environment are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a covenant transaction spending to the fixed destination address
    Create {
        /// Base64 PSBT with the placeholder output
        psbt: String,
    },
    /// Spend a covenant transaction to the pre-defined destination address
    Spend {
        /// Hex-encoded covenant transaction as broadcast
        tx_hex: String,
    },
    /// Check a follow-on transaction against its covenant transaction
    Verify {
        /// Hex-encoded covenant transaction
        commitment_hex: String,
        /// Hex-encoded follow-on transaction
        follow_on_hex: String,
    },
    /// Ask the node wallet for a PSBT paying the placeholder output
    Fund {
        /// Amount for the covenant output in satoshis
        #[arg(short, long, default_value_t = covenant_config::DEFAULT_FUNDING_SATS)]
        amount: u64,
    },
    /// Fetch a raw transaction from the node
    Fetch {
        /// Transaction id
        txid: String,
    },
    /// Broadcast a raw transaction through the node
    Broadcast {
        /// Hex-encoded transaction
        tx_hex: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => CovenantConfig::load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => CovenantConfig::from_env()?,
    };

    let artifact = run(cli.command, &config)?;
    println!("{}", artifact);
    Ok(())
}

fn run(command: Commands, config: &CovenantConfig) -> Result<String> {
    match command {
        Commands::Create { psbt } => Ok(covenant::commit_base64(&psbt, config)?),
        Commands::Spend { tx_hex } => Ok(covenant::reconstruct_spend_hex(&tx_hex, config)?),
        Commands::Verify {
            commitment_hex,
            follow_on_hex,
        } => {
            let commitment_tx = decode_tx(&commitment_hex).context("covenant transaction")?;
            let follow_on = decode_tx(&follow_on_hex).context("follow-on transaction")?;
            verify_spend(&commitment_tx, &follow_on, config.output_index)?;
            Ok("valid".to_string())
        }
        Commands::Fund { amount } => {
            let rpc = NodeClient::new()?;
            let psbt = rpc.fund_placeholder(config, Amount::from_sat(amount))?;
            Ok(psbt.to_string())
        }
        Commands::Fetch { txid } => {
            let txid = Txid::from_str(txid.trim()).context("invalid txid")?;
            let tx = NodeClient::new()?.get_raw_transaction(&txid)?;
            Ok(serialize_hex(&tx))
        }
        Commands::Broadcast { tx_hex } => {
            let tx = decode_tx(&tx_hex)?;
            let txid = NodeClient::new()?.send_raw_transaction(&tx)?;
            Ok(txid.to_string())
        }
    }
}

fn decode_tx(tx_hex: &str) -> Result<Transaction> {
    let raw = hex::decode(tx_hex.trim()).context("invalid transaction hex")?;
    deserialize(&raw).context("invalid transaction encoding")
}
