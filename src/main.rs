//! Ruster Trace CLI - trace one wallet and print the JSON report
//!
//! Usage:
//!   ruster_trace 0xabc... --chain bsc --max-hops 1 --min-usd 100
//!
//! Environment: ETHERSCAN_API_KEY / BSCSCAN_API_KEY, RUSTER_TRACE_CHAINS, RUST_LOG

use chrono::{DateTime, Utc};
use clap::Parser;
use eyre::{eyre, Result, WrapErr};
use std::time::Duration;
use tracing::{info, warn};

use ruster_trace::utils::telemetry::init_logging;
use ruster_trace::{TraceOptions, TracerConfig, WalletTracer};

#[derive(Debug, Parser)]
#[command(name = "ruster_trace", version, about = "Trace wallet transfers and score the risk")]
struct Cli {
    /// Wallet address (0x + 40 hex)
    address: String,

    /// Chain id or label from the chain list ("ethereum", "bsc", ...)
    #[arg(long)]
    chain: Option<String>,

    /// Numeric EVM chain id (takes precedence over --chain)
    #[arg(long)]
    chain_id: Option<u64>,

    /// Hops to expand from the seed (capped at 2)
    #[arg(long)]
    max_hops: Option<u32>,

    /// Transfers kept per address (min 10)
    #[arg(long)]
    max_transfers: Option<usize>,

    /// Counterparties expanded per address (min 2)
    #[arg(long)]
    max_counterparties: Option<usize>,

    /// Drop transfers below this USD value (unpriced ones are dropped too)
    #[arg(long)]
    min_usd: Option<f64>,

    /// USD price of the chain's native asset
    #[arg(long)]
    native_usd_price: Option<f64>,

    /// Comma-separated stablecoin symbols valued 1:1
    #[arg(long, value_delimiter = ',')]
    stablecoins: Option<Vec<String>>,

    /// Window start (RFC 3339)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Window end (RFC 3339)
    #[arg(long)]
    end: Option<DateTime<Utc>>,

    /// Keep transfers whose counterparty is a contract
    #[arg(long)]
    include_contracts: bool,

    /// Abort the trace after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn trace_options(&self) -> TraceOptions {
        TraceOptions {
            chain_id: self.chain_id,
            chain: self.chain.clone(),
            max_hops: self.max_hops,
            max_transfers: self.max_transfers,
            max_counterparties: self.max_counterparties,
            min_usd: self.min_usd,
            native_usd_price: self.native_usd_price,
            stablecoin_symbols: self.stablecoins.clone(),
            start_time: self.start,
            end_time: self.end,
            ignore_contract_addresses: Some(!self.include_contracts),
            deadline: self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("info");

    let config = TracerConfig::from_env();
    let tracer = WalletTracer::from_config(config).wrap_err("failed to build explorer client")?;

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("⚠️ Ctrl+C handler unavailable; trace cannot be interrupted");
            std::future::pending::<()>().await;
        }
        info!("🛑 Ctrl+C received, cancelling trace");
    };

    let report = tracer
        .trace_wallet_until(&cli.address, &cli.trace_options(), cancel)
        .await
        .map_err(|e| eyre!("{}", e))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
