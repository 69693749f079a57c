//! Transfer Fetcher
//!
//! One address, one chain → newest qualifying transfers.
//!
//! Pipeline per node:
//! 1. native + token lists fetched together (page 1, newest first)
//! 2. failed / zero-value / symbol-less rows dropped, rest decoded
//! 3. USD estimate attached
//! 4. time window (default 24h window is advisory, explicit one is not)
//! 5. contract counterparties removed (unless disabled)
//! 6. min-USD floor
//! 7. newest first, truncated to `max_transfers`

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::classifier::ContractClassifier;
use crate::core::pricing::UsdEstimator;
use crate::models::config::ChainConfig;
use crate::models::errors::AppResult;
use crate::models::types::{Asset, Direction, TimeWindow, TraceOptions, Transfer};
use crate::providers::explorer::{tx_url, ExplorerApi, ExplorerTokenTx, ExplorerTx, TransferRow};
use crate::utils::cache::{namespaced_key, TtlCache};
use crate::utils::constants::{MAX_FETCH_LIMIT, MIN_FETCH_LIMIT, NATIVE_DECIMALS, TRANSFER_CACHE_TTL_SECS};
use crate::utils::units::TokenAmount;

/// Per-trace fetch parameters, resolved once and shared by every hop
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub max_transfers: usize,
    pub min_usd: Option<f64>,
    pub estimator: UsdEstimator,
    pub window: TimeWindow,
    pub filter_contracts: bool,
}

impl FetchParams {
    pub fn from_options(options: &TraceOptions, now: DateTime<Utc>) -> Self {
        Self {
            max_transfers: options.effective_max_transfers(),
            min_usd: options.min_usd.filter(|v| v.is_finite()),
            estimator: UsdEstimator::new(options.stablecoin_symbols.as_deref(), options.native_usd_price),
            window: TimeWindow::resolve(options, now),
            filter_contracts: options.filters_contracts(),
        }
    }

    /// Raw rows requested per list endpoint
    pub fn fetch_limit(&self) -> usize {
        self.max_transfers.saturating_mul(2).clamp(MIN_FETCH_LIMIT, MAX_FETCH_LIMIT)
    }

    fn cache_key(&self, chain: &ChainConfig, address: &str) -> String {
        let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_else(|| "none".to_string());
        namespaced_key(
            "trace",
            &[
                &chain.id,
                address,
                &self.max_transfers.to_string(),
                &opt(self.min_usd),
                &opt(self.estimator.native_usd_price()),
                &self.estimator.stablecoin_fingerprint(),
                &self.window.fingerprint(),
                if self.filter_contracts { "no-contracts" } else { "contracts" },
            ],
        )
    }
}

fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Hash, direction and lowercased from/to. `None` on missing fields or a
/// failure indicator.
fn orient(row: &impl TransferRow, owner: &str) -> Option<(String, Direction, String, String)> {
    if row.is_failed() {
        return None;
    }
    let hash = row.hash()?.to_string();
    let from = row.from_addr()?.to_lowercase();
    let to = row.to_addr()?.to_lowercase();
    let direction = if to == owner { Direction::In } else { Direction::Out };
    Some((hash, direction, from, to))
}

fn counterparty_of(direction: Direction, from: &str, to: &str) -> String {
    match direction {
        Direction::In => from.to_string(),
        Direction::Out => to.to_string(),
    }
}

/// Decode a native transaction row. Zero-value rows are dropped.
pub fn decode_native(row: &ExplorerTx, owner: &str, symbol: &str, site: &str) -> Option<Transfer> {
    let (hash, direction, from, to) = orient(row, owner)?;
    let amount = TokenAmount::from_base_units(row.value.as_deref()?, NATIVE_DECIMALS)?;
    if amount.is_zero() {
        return None;
    }
    Some(Transfer {
        explorer_url: tx_url(site, &hash),
        counterparty: counterparty_of(direction, &from, &to),
        timestamp: parse_timestamp(row.time_stamp.as_deref()),
        hash,
        from,
        to,
        direction,
        asset: Asset::native(symbol),
        amount,
        usd_value: None,
    })
}

/// Decode a token transfer row. Rows without a symbol are dropped.
pub fn decode_token(row: &ExplorerTokenTx, owner: &str, site: &str) -> Option<Transfer> {
    let symbol = row.token_symbol.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let (hash, direction, from, to) = orient(row, owner)?;
    let decimals = row
        .token_decimal
        .as_deref()
        .and_then(|d| d.trim().parse::<u8>().ok())
        .unwrap_or(0);
    let amount = TokenAmount::from_base_units(row.value.as_deref().unwrap_or("0"), decimals)?;
    Some(Transfer {
        explorer_url: tx_url(site, &hash),
        counterparty: counterparty_of(direction, &from, &to),
        timestamp: parse_timestamp(row.time_stamp.as_deref()),
        hash,
        from,
        to,
        direction,
        asset: Asset::token(
            symbol,
            row.contract_address.as_deref().map(str::to_lowercase),
            decimals,
        ),
        amount,
        usd_value: None,
    })
}

/// Window filter. With the default window, an empty result over a
/// non-empty input falls back to the input.
pub fn apply_window(transfers: Vec<Transfer>, window: &TimeWindow) -> Vec<Transfer> {
    let any_inside = transfers.iter().any(|t| window.contains(&t.timestamp));
    if !window.explicit && !any_inside {
        return transfers;
    }
    transfers
        .into_iter()
        .filter(|t| window.contains(&t.timestamp))
        .collect()
}

/// A transfer without a USD value never passes a floor
pub fn apply_min_usd(transfers: Vec<Transfer>, min_usd: Option<f64>) -> Vec<Transfer> {
    match min_usd {
        Some(floor) => transfers
            .into_iter()
            .filter(|t| t.usd_value.map(|v| v >= floor).unwrap_or(false))
            .collect(),
        None => transfers,
    }
}

#[derive(Clone)]
pub struct TransferFetcher {
    explorer: Arc<dyn ExplorerApi>,
    classifier: ContractClassifier,
    cache: TtlCache<Vec<Transfer>>,
    balance_cache: TtlCache<Option<TokenAmount>>,
}

impl TransferFetcher {
    pub fn new(explorer: Arc<dyn ExplorerApi>) -> Self {
        Self {
            classifier: ContractClassifier::new(explorer.clone()),
            explorer,
            cache: TtlCache::with_ttl_secs(TRANSFER_CACHE_TTL_SECS),
            balance_cache: TtlCache::with_ttl_secs(TRANSFER_CACHE_TTL_SECS),
        }
    }

    pub async fn fetch(&self, chain: &ChainConfig, address: &str, params: &FetchParams) -> AppResult<Vec<Transfer>> {
        let cache_key = params.cache_key(chain, address);
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached);
        }

        let limit = params.fetch_limit();
        let (txs, token_txs) = tokio::try_join!(
            self.explorer.tx_list(chain, address, limit),
            self.explorer.token_tx_list(chain, address, limit),
        )?;

        let site = self.explorer.site(chain);
        let symbol = chain.native_symbol();
        let mut transfers: Vec<Transfer> = txs
            .iter()
            .filter_map(|row| decode_native(row, address, &symbol, &site))
            .chain(token_txs.iter().filter_map(|row| decode_token(row, address, &site)))
            .collect();
        for transfer in transfers.iter_mut() {
            transfer.usd_value = params.estimator.estimate(transfer);
        }
        let decoded = transfers.len();

        let mut transfers = apply_window(transfers, &params.window);
        if params.filter_contracts && !transfers.is_empty() {
            let counterparties: Vec<String> = transfers.iter().map(|t| t.counterparty.clone()).collect();
            let contracts = self.classifier.contracts_among(chain, &counterparties).await;
            if !contracts.is_empty() {
                transfers.retain(|t| !contracts.contains(&t.counterparty));
            }
        }
        let mut transfers = apply_min_usd(transfers, params.min_usd);
        transfers.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transfers.truncate(params.max_transfers);

        info!(
            "📥 {} on {}: {} raw rows, {} decoded, {} kept",
            address,
            chain.id,
            txs.len() + token_txs.len(),
            decoded,
            transfers.len()
        );
        self.cache.set(cache_key, transfers.clone());
        Ok(transfers)
    }

    /// Native balance, cached separately from transfer lists
    pub async fn native_balance(&self, chain: &ChainConfig, address: &str) -> AppResult<Option<TokenAmount>> {
        let cache_key = namespaced_key("trace:balance", &[&chain.id, address]);
        if let Some(cached) = self.balance_cache.get(&cache_key) {
            return Ok(cached);
        }
        let raw = self.explorer.native_balance(chain, address).await?;
        let balance = raw.and_then(|r| TokenAmount::from_base_units(&r, NATIVE_DECIMALS));
        debug!("💰 Balance of {} on {}: {:?}", address, chain.id, balance.as_ref().map(|b| b.to_decimal_string()));
        self.balance_cache.set(cache_key, balance.clone());
        Ok(balance)
    }
}
