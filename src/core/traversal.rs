//! Hop Traversal Engine
//!
//! Breadth-first walk over the transfer graph starting at one address:
//! - FIFO frontier seeded with (hop 0, seed)
//! - global visited set, so every address is fetched at most once
//! - hop ceiling of 2 whatever the caller asks for
//! - per node, only the top counterparties are enqueued
//!
//! Nodes are processed one at a time in queue order; each node's own
//! network work (lists, contract lookups) runs concurrently.
//!
//! Any fetch failure aborts the whole trace. Cancellation and deadlines
//! drop the in-flight future and return an error, never a partial report.

use alloy_primitives::Address;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::core::chain::ChainResolver;
use crate::core::fetcher::{FetchParams, TransferFetcher};
use crate::core::risk_score::{build_trace_report, TraceStats};
use crate::models::config::TracerConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    Direction, Hop, NativeBalance, SourceLink, TraceOptions, Transfer, WalletTraceReport,
};
use crate::providers::explorer::{address_url, EtherscanClient, ExplorerApi};
use crate::utils::constants::TOP_TRANSFERS_PER_DIRECTION;

/// Lowercased address after basic EVM format validation
pub fn normalize_address(address: &str) -> AppResult<String> {
    let lower = address.trim().to_lowercase();
    let well_formed = lower.len() == 42 && lower.starts_with("0x") && Address::from_str(&lower).is_ok();
    if !well_formed {
        return Err(AppError::invalid_address(address.trim()));
    }
    Ok(lower)
}

/// FIFO queue plus global visited set
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<(u32, String)>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new(seed: &str) -> Self {
        let mut frontier = Self::default();
        frontier.queue.push_back((0, seed.to_string()));
        frontier
    }

    /// Next unvisited node, marked visited on the way out
    pub fn next(&mut self) -> Option<(u32, String)> {
        while let Some((hop, address)) = self.queue.pop_front() {
            if self.visited.insert(address.clone()) {
                return Some((hop, address));
            }
        }
        None
    }

    pub fn enqueue(&mut self, hop: u32, address: &str) {
        if !self.visited.contains(address) {
            self.queue.push_back((hop, address.to_string()));
        }
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }
}

/// Insertion-ordered, deduplicated explorer links
#[derive(Debug, Default)]
struct SourceRegistry {
    seen: HashSet<String>,
    links: Vec<SourceLink>,
}

impl SourceRegistry {
    fn add(&mut self, key: String, title: String, url: String) {
        if self.seen.insert(key) {
            self.links.push(SourceLink { title, url });
        }
    }

    fn record_hop(&mut self, site: &str, address: &str, transfers: &[Transfer]) {
        self.add(
            format!("address:{}", address),
            format!("Explorer address {}", address),
            address_url(site, address),
        );
        for transfer in transfers {
            self.add(
                format!("tx:{}", transfer.hash),
                format!("Transaction {}", transfer.hash),
                transfer.explorer_url.clone(),
            );
        }
    }
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Distinct counterparties ranked by their single largest transfer
/// (USD value, else decimal amount). Ties keep first-seen order.
pub fn rank_counterparties(transfers: &[Transfer], limit: usize) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut best: HashMap<&str, f64> = HashMap::new();
    for transfer in transfers {
        let cp = transfer.counterparty.as_str();
        let score = transfer.ranking_score();
        let current = best.entry(cp).or_insert_with(|| {
            order.push(cp);
            score
        });
        if score > *current {
            *current = score;
        }
    }
    let mut ranked: Vec<(&str, f64)> = order.into_iter().map(|cp| (cp, best[cp])).collect();
    ranked.sort_by(|a, b| by_score_desc(a.1, b.1));
    ranked.into_iter().take(limit).map(|(cp, _)| cp.to_string()).collect()
}

/// Largest transfers in one direction, stable on ties
pub fn top_transfers(transfers: &[Transfer], direction: Direction, limit: usize) -> Vec<Transfer> {
    let mut scored: Vec<(&Transfer, f64)> = transfers
        .iter()
        .filter(|t| t.direction == direction)
        .map(|t| (t, t.ranking_score()))
        .filter(|(_, score)| score.is_finite())
        .collect();
    scored.sort_by(|a, b| by_score_desc(a.1, b.1));
    scored.into_iter().take(limit).map(|(t, _)| t.clone()).collect()
}

fn sum_usd(transfers: &[Transfer], direction: Direction) -> Option<f64> {
    transfers
        .iter()
        .filter(|t| t.direction == direction)
        .filter_map(|t| t.usd_value)
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Entry point for wallet tracing
#[derive(Clone)]
pub struct WalletTracer {
    resolver: ChainResolver,
    fetcher: TransferFetcher,
    explorer: Arc<dyn ExplorerApi>,
}

impl WalletTracer {
    pub fn new(config: TracerConfig, explorer: Arc<dyn ExplorerApi>) -> Self {
        Self {
            resolver: ChainResolver::new(config),
            fetcher: TransferFetcher::new(explorer.clone()),
            explorer,
        }
    }

    /// Tracer over the HTTP explorer client
    pub fn from_config(config: TracerConfig) -> AppResult<Self> {
        let explorer = Arc::new(EtherscanClient::from_config(&config)?);
        Ok(Self::new(config, explorer))
    }

    pub fn resolver(&self) -> &ChainResolver {
        &self.resolver
    }

    pub fn explorer(&self) -> Arc<dyn ExplorerApi> {
        self.explorer.clone()
    }

    pub async fn trace_wallet(&self, address: &str, options: &TraceOptions) -> AppResult<WalletTraceReport> {
        self.trace_wallet_until(address, options, std::future::pending::<()>())
            .await
    }

    /// Like [`trace_wallet`](Self::trace_wallet), aborted when `cancel`
    /// resolves first. Outstanding HTTP calls are dropped with the trace.
    pub async fn trace_wallet_until<F>(
        &self,
        address: &str,
        options: &TraceOptions,
        cancel: F,
    ) -> AppResult<WalletTraceReport>
    where
        F: Future<Output = ()>,
    {
        let bounded = async {
            match options.deadline {
                Some(deadline) => tokio::time::timeout(deadline, self.run(address, options))
                    .await
                    .unwrap_or_else(|_| Err(AppError::deadline_exceeded(deadline.as_secs_f64()))),
                None => self.run(address, options).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel => {
                warn!("🛑 Trace of {} cancelled", address.trim());
                Err(AppError::cancelled())
            }
            result = bounded => result,
        }
    }

    async fn run(&self, address: &str, options: &TraceOptions) -> AppResult<WalletTraceReport> {
        let started = Instant::now();
        let seed = normalize_address(address)?;
        let chain = self
            .resolver
            .resolve(options.chain_id, options.chain.as_deref())
            .cloned()
            .ok_or_else(|| {
                AppError::no_chain(format!(
                    "No configured chain for {}",
                    options
                        .chain_id
                        .map(|id| id.to_string())
                        .or_else(|| options.chain.clone())
                        .unwrap_or_else(|| "default chain".to_string())
                ))
            })?;

        let params = FetchParams::from_options(options, Utc::now());
        let max_hops = options.effective_max_hops();
        let max_counterparties = options.effective_max_counterparties();
        let site = self.explorer.site(&chain);

        info!(
            "🧭 Tracing {} on {} (hops ≤{}, fan-out {}, window {})",
            seed,
            chain.id,
            max_hops,
            max_counterparties,
            params.window.fingerprint()
        );

        let mut frontier = Frontier::new(&seed);
        let mut sources = SourceRegistry::default();
        let mut hops: Vec<Hop> = Vec::new();

        while let Some((hop, address)) = frontier.next() {
            let transfers = self.fetcher.fetch(&chain, &address, &params).await?;
            if transfers.is_empty() {
                debug!("🕳️ Hop {} {}: no qualifying transfers", hop, address);
                continue;
            }

            sources.record_hop(&site, &address, &transfers);
            if hop < max_hops {
                for counterparty in rank_counterparties(&transfers, max_counterparties) {
                    frontier.enqueue(hop + 1, &counterparty);
                }
            }
            info!("🔗 Hop {} {}: {} transfers", hop, address, transfers.len());
            hops.push(Hop {
                hop,
                address,
                transfers,
            });
        }

        let all: Vec<Transfer> = hops.iter().flat_map(|h| h.transfers.iter().cloned()).collect();
        let incoming_count = all.iter().filter(|t| t.direction == Direction::In).count();
        let unique_counterparties = all
            .iter()
            .map(|t| t.counterparty.as_str())
            .collect::<HashSet<_>>()
            .len();
        let stats = TraceStats {
            total_transfers: all.len(),
            unique_counterparties,
            incoming_count,
            outgoing_count: all.len() - incoming_count,
            total_in_usd: sum_usd(&all, Direction::In),
            total_out_usd: sum_usd(&all, Direction::Out),
        };

        let balance = self.fetcher.native_balance(&chain, &seed).await?;
        let native_balance = NativeBalance {
            usd_value: params
                .estimator
                .native_usd_price()
                .map(|price| balance.as_ref().map(|b| b.to_f64()).unwrap_or(0.0) * price),
            amount: balance,
            symbol: chain.native_symbol(),
        };

        let report = build_trace_report(&stats);
        info!(
            "✅ Trace of {} done: {} nodes, {} hops, {} transfers, {} {} in {:?}",
            seed,
            frontier.visited(),
            hops.len(),
            stats.total_transfers,
            report.level.emoji(),
            report.level.as_str(),
            started.elapsed()
        );

        Ok(WalletTraceReport {
            address: seed,
            chain_id: chain.chain_id,
            chain_label: chain.label.clone(),
            native_balance,
            total_in_usd: stats.total_in_usd,
            total_out_usd: stats.total_out_usd,
            top_incoming: top_transfers(&all, Direction::In, TOP_TRANSFERS_PER_DIRECTION),
            top_outgoing: top_transfers(&all, Direction::Out, TOP_TRANSFERS_PER_DIRECTION),
            report,
            hops,
            total_transfers: stats.total_transfers,
            unique_counterparties: stats.unique_counterparties,
            incoming_count: stats.incoming_count,
            outgoing_count: stats.outgoing_count,
            sources: sources.links,
        })
    }
}
