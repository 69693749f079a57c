//! Integration tests for the wallet tracer over an in-memory explorer

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use ruster_trace::providers::explorer::{ExplorerTokenTx, ExplorerTx, SourceCodeRow};
use ruster_trace::{
    AppError, AppResult, ChainConfig, ErrorCode, ExplorerApi, ExplorerConfig, ExplorerKind,
    RiskLevel, TraceOptions, TracerConfig, WalletTracer,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WEI: u128 = 1_000_000_000_000_000_000;

fn addr(n: u32) -> String {
    format!("0x{:040x}", n)
}

enum Edge {
    Native { from: String, to: String, wei: u128, age_secs: i64 },
    Token { from: String, to: String, symbol: &'static str, units: u128, decimals: u8, age_secs: i64 },
}

/// Transfer graph served the way an explorer would: every row touching
/// the queried address, newest first.
#[derive(Default)]
struct GraphExplorer {
    edges: Vec<Edge>,
    contracts: HashSet<String>,
    failing_source: HashSet<String>,
    failing_lists: HashSet<String>,
    balances: HashMap<String, String>,
    list_delay: Option<Duration>,
    source_calls: Mutex<HashMap<String, usize>>,
    list_calls: AtomicUsize,
}

impl GraphExplorer {
    fn native(mut self, from: &str, to: &str, eth: u128, age_secs: i64) -> Self {
        self.edges.push(Edge::Native {
            from: from.to_string(),
            to: to.to_string(),
            wei: eth * WEI,
            age_secs,
        });
        self
    }

    fn token(mut self, from: &str, to: &str, symbol: &'static str, whole: u128, age_secs: i64) -> Self {
        self.edges.push(Edge::Token {
            from: from.to_string(),
            to: to.to_string(),
            symbol,
            units: whole * 1_000_000,
            decimals: 6,
            age_secs,
        });
        self
    }

    fn contract(mut self, address: &str) -> Self {
        self.contracts.insert(address.to_string());
        self
    }

    fn source_calls_for(&self, address: &str) -> usize {
        self.source_calls
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    async fn before_list(&self, address: &str) -> AppResult<()> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_lists.contains(address) {
            return Err(AppError::explorer("NOTOK"));
        }
        Ok(())
    }
}

fn touches(from: &str, to: &str, address: &str) -> bool {
    from == address || to == address
}

#[async_trait]
impl ExplorerApi for GraphExplorer {
    async fn tx_list(&self, _chain: &ChainConfig, address: &str, limit: usize) -> AppResult<Vec<ExplorerTx>> {
        self.before_list(address).await?;
        let now = Utc::now().timestamp();
        Ok(self
            .edges
            .iter()
            .enumerate()
            .filter_map(|(i, edge)| match edge {
                Edge::Native { from, to, wei, age_secs } if touches(from, to, address) => Some(ExplorerTx {
                    hash: Some(format!("0x{:064x}", i + 1)),
                    time_stamp: Some((now - age_secs).to_string()),
                    from: Some(from.clone()),
                    to: Some(to.clone()),
                    value: Some(wei.to_string()),
                    is_error: Some("0".into()),
                    txreceipt_status: Some("1".into()),
                }),
                _ => None,
            })
            .take(limit)
            .collect())
    }

    async fn token_tx_list(&self, _chain: &ChainConfig, address: &str, limit: usize) -> AppResult<Vec<ExplorerTokenTx>> {
        self.before_list(address).await?;
        let now = Utc::now().timestamp();
        Ok(self
            .edges
            .iter()
            .enumerate()
            .filter_map(|(i, edge)| match edge {
                Edge::Token { from, to, symbol, units, decimals, age_secs } if touches(from, to, address) => {
                    Some(ExplorerTokenTx {
                        hash: Some(format!("0x{:064x}", i + 1)),
                        time_stamp: Some((now - age_secs).to_string()),
                        from: Some(from.clone()),
                        to: Some(to.clone()),
                        value: Some(units.to_string()),
                        contract_address: Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".into()),
                        token_name: Some(symbol.to_string()),
                        token_symbol: Some(symbol.to_string()),
                        token_decimal: Some(decimals.to_string()),
                        ..Default::default()
                    })
                }
                _ => None,
            })
            .take(limit)
            .collect())
    }

    async fn native_balance(&self, _chain: &ChainConfig, address: &str) -> AppResult<Option<String>> {
        Ok(self.balances.get(address).cloned())
    }

    async fn source_code(&self, _chain: &ChainConfig, address: &str) -> AppResult<Option<SourceCodeRow>> {
        *self
            .source_calls
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert(0) += 1;
        if self.failing_source.contains(address) {
            return Err(AppError::rate_limited("Max rate limit reached"));
        }
        if self.contracts.contains(address) {
            return Ok(Some(SourceCodeRow {
                contract_name: Some("Router".into()),
                ..Default::default()
            }));
        }
        Ok(Some(SourceCodeRow::default()))
    }

    fn site(&self, _chain: &ChainConfig) -> String {
        "https://etherscan.io".to_string()
    }
}

fn config() -> TracerConfig {
    TracerConfig::default().with_explorer(
        ExplorerKind::Etherscan,
        ExplorerConfig::new("https://api.etherscan.io/v2/api", Some("test-key".into())),
    )
}

fn tracer(explorer: GraphExplorer) -> (WalletTracer, Arc<GraphExplorer>) {
    let explorer = Arc::new(explorer);
    (WalletTracer::new(config(), explorer.clone()), explorer)
}

fn hop_addresses(report: &ruster_trace::WalletTraceReport) -> Vec<(u32, String)> {
    report.hops.iter().map(|h| (h.hop, h.address.clone())).collect()
}

#[tokio::test]
async fn test_cycle_back_to_seed_is_visited_once() {
    let (a, b, c) = (addr(0xa), addr(0xb), addr(0xc));
    let graph = GraphExplorer::default()
        .native(&a, &b, 5, 60)
        .native(&b, &a, 1, 120)
        .native(&b, &c, 2, 180);
    let (tracer, _) = tracer(graph);

    let report = tracer.trace_wallet(&a, &TraceOptions::default()).await.unwrap();

    assert_eq!(hop_addresses(&report), vec![(0, a.clone()), (1, b.clone()), (2, c.clone())]);
    assert_eq!(report.total_transfers, 2 + 3 + 1);
    assert_eq!(report.unique_counterparties, 3);
    assert_eq!(report.sources[0].title, format!("Explorer address {}", a));
    assert_eq!(report.sources[0].url, format!("https://etherscan.io/address/{}", a));
    // three addresses plus three distinct transactions
    assert_eq!(report.sources.len(), 6);
}

#[tokio::test]
async fn test_hop_ceiling_caps_requested_depth() {
    let chain: Vec<String> = (1..=5).map(addr).collect();
    let mut graph = GraphExplorer::default();
    for pair in chain.windows(2) {
        graph = graph.native(&pair[0], &pair[1], 1, 60);
    }
    let (tracer, _) = tracer(graph);

    let options = TraceOptions {
        max_hops: Some(10),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&chain[0], &options).await.unwrap();

    assert!(report.hops.iter().all(|h| h.hop <= 2));
    let visited: Vec<String> = report.hops.iter().map(|h| h.address.clone()).collect();
    assert_eq!(visited, chain[..3].to_vec());
}

#[tokio::test]
async fn test_zero_hops_fetches_only_the_seed() {
    let (a, b) = (addr(1), addr(2));
    let graph = GraphExplorer::default().native(&a, &b, 1, 60).native(&b, &addr(3), 1, 60);
    let (tracer, explorer) = tracer(graph);

    let options = TraceOptions {
        max_hops: Some(0),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&a, &options).await.unwrap();

    assert_eq!(hop_addresses(&report), vec![(0, a)]);
    // tx_list + token_tx_list for one node
    assert_eq!(explorer.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_quiet_wallet_scores_no_activity() {
    let seed = addr(7);
    let mut graph = GraphExplorer::default();
    graph.balances.insert(seed.clone(), (3 * WEI / 2).to_string());
    let (tracer, _) = tracer(graph);

    let options = TraceOptions {
        native_usd_price: Some(2000.0),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&seed, &options).await.unwrap();

    assert!(report.hops.is_empty());
    assert_eq!(report.total_transfers, 0);
    assert_eq!(report.report.level, RiskLevel::Low);
    assert_eq!(report.report.score, 5);
    assert_eq!(report.report.flags.len(), 1);
    assert_eq!(report.report.flags[0].id, "activity:none");
    assert_eq!(report.native_balance.symbol, "ETH");
    assert_eq!(report.native_balance.usd_value, Some(3000.0));
    assert!(report.total_in_usd.is_none());
    assert!(report.sources.is_empty());
}

#[tokio::test]
async fn test_inflow_heavy_concentrated_wallet() {
    let (seed, funder) = (addr(0x5eed), addr(0xf0));
    let mut graph = GraphExplorer::default();
    for i in 0..12 {
        graph = graph.token(&funder, &seed, "USDC", 100 + i as u128, 60 + i);
    }
    let (tracer, _) = tracer(graph);

    let options = TraceOptions {
        max_hops: Some(0),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&seed, &options).await.unwrap();

    assert_eq!(report.incoming_count, 12);
    assert_eq!(report.outgoing_count, 0);
    let ids: Vec<&str> = report.report.flags.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["counterparties:concentrated", "flow:inflow-heavy"]);
    assert_eq!(report.report.score, 30);
    assert_eq!(report.report.level, RiskLevel::Medium);

    // stablecoins are valued 1:1
    let expected: f64 = (0..12).map(|i| 100.0 + i as f64).sum();
    assert_eq!(report.total_in_usd, Some(expected));
    assert_eq!(report.top_incoming.len(), 5);
    assert_eq!(report.top_incoming[0].usd_value, Some(111.0));
    assert!(report.total_out_usd.is_none());
}

#[tokio::test]
async fn test_contract_counterparties_dropped_by_default() {
    let (seed, eoa, router) = (addr(1), addr(2), addr(3));
    let graph = GraphExplorer::default()
        .native(&eoa, &seed, 1, 60)
        .native(&seed, &router, 9, 90)
        .contract(&router);
    let (tracer, _) = tracer(graph);

    let options = TraceOptions {
        max_hops: Some(0),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&seed, &options).await.unwrap();

    let hop = &report.hops[0];
    assert_eq!(hop.transfers.len(), 1);
    assert_eq!(hop.transfers[0].counterparty, eoa);
    assert_eq!(hop.transfers[0].direction, ruster_trace::Direction::In);
    assert_eq!(hop.transfers[0].from, eoa);
}

#[tokio::test]
async fn test_contract_filter_can_be_disabled() {
    let (seed, eoa, router) = (addr(1), addr(2), addr(3));
    let graph = GraphExplorer::default()
        .native(&seed, &eoa, 1, 60)
        .native(&seed, &router, 9, 90)
        .contract(&router);
    let (tracer, explorer) = tracer(graph);

    let options = TraceOptions {
        max_hops: Some(0),
        ignore_contract_addresses: Some(false),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&seed, &options).await.unwrap();

    assert_eq!(report.hops[0].transfers.len(), 2);
    assert_eq!(explorer.source_calls_for(&router), 0);
}

#[tokio::test]
async fn test_all_contract_counterparties_leave_nothing() {
    let (seed, router, pool) = (addr(1), addr(2), addr(3));
    let graph = GraphExplorer::default()
        .native(&seed, &router, 1, 60)
        .native(&pool, &seed, 2, 90)
        .contract(&router)
        .contract(&pool);
    let (tracer, _) = tracer(graph);

    let report = tracer.trace_wallet(&seed, &TraceOptions::default()).await.unwrap();

    assert!(report.hops.is_empty());
    assert_eq!(report.report.flags[0].id, "activity:none");
}

#[tokio::test]
async fn test_classifier_failure_keeps_address_and_is_retried() {
    let (seed, flaky, router) = (addr(1), addr(2), addr(3));
    let mut graph = GraphExplorer::default()
        .native(&seed, &flaky, 1, 60)
        .native(&seed, &router, 2, 90)
        .contract(&router);
    graph.failing_source.insert(flaky.clone());
    let (tracer, explorer) = tracer(graph);

    let options = TraceOptions {
        max_hops: Some(0),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&seed, &options).await.unwrap();
    let counterparties: Vec<&str> = report.hops[0].transfers.iter().map(|t| t.counterparty.as_str()).collect();
    assert_eq!(counterparties, vec![flaky.as_str()]);

    // a different option set misses the transfer cache; only the failed
    // lookup is repeated
    let options = TraceOptions {
        max_transfers: Some(30),
        ..options
    };
    tracer.trace_wallet(&seed, &options).await.unwrap();
    assert_eq!(explorer.source_calls_for(&flaky), 2);
    assert_eq!(explorer.source_calls_for(&router), 1);
}

#[tokio::test]
async fn test_explicit_window_and_default_fallback() {
    let (seed, recent, old) = (addr(1), addr(2), addr(3));
    let day = 24 * 60 * 60;
    let graph = GraphExplorer::default()
        .native(&seed, &recent, 1, 2 * day)
        .native(&seed, &old, 2, 10 * day);
    let (tracer, _) = tracer(graph);

    // nothing in the last 24h: the default window keeps everything
    let default_window = TraceOptions {
        max_hops: Some(0),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&seed, &default_window).await.unwrap();
    assert_eq!(report.hops[0].transfers.len(), 2);

    let explicit = TraceOptions {
        max_hops: Some(0),
        start_time: Some(Utc::now() - ChronoDuration::days(3)),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&seed, &explicit).await.unwrap();
    let counterparties: Vec<&str> = report.hops[0].transfers.iter().map(|t| t.counterparty.as_str()).collect();
    assert_eq!(counterparties, vec![recent.as_str()]);

    let empty = TraceOptions {
        max_hops: Some(0),
        start_time: Some(Utc::now() - ChronoDuration::hours(12)),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&seed, &empty).await.unwrap();
    assert!(report.hops.is_empty());
}

#[tokio::test]
async fn test_min_usd_drops_unpriced_transfers() {
    let (seed, a, b) = (addr(1), addr(2), addr(3));
    let graph = GraphExplorer::default()
        .native(&seed, &a, 1, 60)
        .token(&b, &seed, "USDT", 40, 90);
    let (tracer, _) = tracer(graph);

    let unpriced = TraceOptions {
        max_hops: Some(0),
        min_usd: Some(10.0),
        ..Default::default()
    };
    let report = tracer.trace_wallet(&seed, &unpriced).await.unwrap();
    assert_eq!(report.hops[0].transfers.len(), 1);
    assert_eq!(report.hops[0].transfers[0].asset.symbol, "USDT");

    let priced = TraceOptions {
        native_usd_price: Some(3000.0),
        ..unpriced
    };
    let report = tracer.trace_wallet(&seed, &priced).await.unwrap();
    assert_eq!(report.hops[0].transfers.len(), 2);
    assert_eq!(report.total_out_usd, Some(3000.0));
    assert_eq!(report.top_outgoing[0].counterparty, a);
}

#[tokio::test]
async fn test_invalid_address_and_missing_chain() {
    let (tracer, explorer) = tracer(GraphExplorer::default());

    let err = tracer.trace_wallet("0x1234", &TraceOptions::default()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TraceInvalidAddress);

    let bsc = TraceOptions {
        chain: Some("bsc".into()),
        ..Default::default()
    };
    let err = tracer.trace_wallet(&addr(1), &bsc).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TraceNoChain);

    let unknown_id = TraceOptions {
        chain_id: Some(56),
        ..Default::default()
    };
    let err = tracer.trace_wallet(&addr(1), &unknown_id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TraceNoChain);
    assert_eq!(explorer.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fetch_failure_past_the_seed_aborts_trace() {
    let (seed, bad) = (addr(1), addr(2));
    let mut graph = GraphExplorer::default().native(&seed, &bad, 1, 60);
    graph.failing_lists.insert(bad.clone());
    let (tracer, _) = tracer(graph);

    let err = tracer.trace_wallet(&seed, &TraceOptions::default()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ExplorerError);
}

#[tokio::test]
async fn test_cancellation_returns_no_report() {
    let mut graph = GraphExplorer::default().native(&addr(1), &addr(2), 1, 60);
    graph.list_delay = Some(Duration::from_secs(5));
    let (tracer, _) = tracer(graph);

    let cancel = tokio::time::sleep(Duration::from_millis(20));
    let err = tracer
        .trace_wallet_until(&addr(1), &TraceOptions::default(), cancel)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TraceCancelled);
}

#[tokio::test]
async fn test_deadline_exceeded() {
    let mut graph = GraphExplorer::default().native(&addr(1), &addr(2), 1, 60);
    graph.list_delay = Some(Duration::from_secs(5));
    let (tracer, _) = tracer(graph);

    let options = TraceOptions {
        deadline: Some(Duration::from_millis(20)),
        ..Default::default()
    };
    let err = tracer.trace_wallet(&addr(1), &options).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TraceDeadlineExceeded);
}
