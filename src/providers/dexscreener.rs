//! DexScreener API Client - pair discovery for token risk
//!
//! Used only to locate the most liquid pair for a token query and read its
//! market snapshot (liquidity, volume, FDV, txn counts, socials).
//!
//! API: https://api.dexscreener.com/latest/dex/search?q={query}
//!      https://api.dexscreener.com/latest/dex/pairs/{chainId}/{pairAddress}
//! Free, no API key required

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::cache::{namespaced_key, TtlCache};
use crate::utils::constants::{DEXSCREENER_CACHE_TTL_SECS, USER_AGENT as USER_AGENT_CONST};

/// DexScreener API response
#[derive(Debug, Deserialize)]
pub struct DexScreenerResponse {
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

/// A trading pair from DexScreener
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DexPair {
    /// Chain slug (e.g., "ethereum", "bsc")
    pub chain_id: String,
    pub dex_id: String,
    pub pair_address: String,
    pub url: Option<String>,
    pub base_token: DexToken,
    pub quote_token: DexToken,
    pub price_usd: Option<String>,
    pub price_change: Option<DexPriceChange>,
    pub liquidity: Option<DexLiquidity>,
    pub fdv: Option<f64>,
    pub volume: Option<DexVolume>,
    pub txns: Option<DexTxns>,
    /// Epoch millis
    pub pair_created_at: Option<i64>,
    pub info: Option<DexInfo>,
}

impl DexPair {
    pub fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.as_ref().and_then(|l| l.usd)
    }

    pub fn volume_24h(&self) -> Option<f64> {
        self.volume.as_ref().and_then(|v| v.h24)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DexToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexPriceChange {
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexLiquidity {
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexVolume {
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexTxns {
    pub h24: Option<DexTxnCount>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexTxnCount {
    pub buys: Option<u64>,
    pub sells: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DexInfo {
    pub socials: Vec<DexLink>,
    pub websites: Vec<DexLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DexLink {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub url: String,
}

/// Flattened pair snapshot consumed by the pair risk engine
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPairReport {
    pub chain_id: String,
    pub dex_id: String,
    pub pair_address: String,
    pub url: Option<String>,
    pub base_token: DexToken,
    pub quote_token: DexToken,
    #[serde(rename = "priceUSD")]
    pub price_usd: Option<f64>,
    pub change_24h: Option<f64>,
    #[serde(rename = "liquidityUSD")]
    pub liquidity_usd: Option<f64>,
    #[serde(rename = "volume24hUSD")]
    pub volume_24h_usd: Option<f64>,
    #[serde(rename = "fdvUSD")]
    pub fdv_usd: Option<f64>,
    pub buys_24h: Option<u64>,
    pub sells_24h: Option<u64>,
    pub pair_created_at: Option<i64>,
    pub socials: Vec<DexLink>,
    pub websites: Vec<DexLink>,
}

impl From<&DexPair> for DexPairReport {
    fn from(pair: &DexPair) -> Self {
        let counts = pair.txns.as_ref().and_then(|t| t.h24.as_ref());
        let info = pair.info.clone().unwrap_or_default();
        Self {
            chain_id: pair.chain_id.clone(),
            dex_id: pair.dex_id.clone(),
            pair_address: pair.pair_address.clone(),
            url: pair.url.clone(),
            base_token: pair.base_token.clone(),
            quote_token: pair.quote_token.clone(),
            price_usd: pair
                .price_usd
                .as_deref()
                .and_then(|p| p.trim().parse::<f64>().ok())
                .filter(|p| p.is_finite()),
            change_24h: pair.price_change.as_ref().and_then(|c| c.h24),
            liquidity_usd: pair.liquidity_usd(),
            volume_24h_usd: pair.volume_24h(),
            fdv_usd: pair.fdv,
            buys_24h: counts.and_then(|c| c.buys),
            sells_24h: counts.and_then(|c| c.sells),
            pair_created_at: pair.pair_created_at,
            socials: info.socials,
            websites: info.websites,
        }
    }
}

/// Highest liquidity wins, then highest 24h volume. On a full tie the
/// earlier pair is kept, so the pick is stable for a given input order.
pub fn select_best_pair(pairs: &[DexPair]) -> Option<&DexPair> {
    let key = |p: &DexPair| (p.liquidity_usd().unwrap_or(0.0), p.volume_24h().unwrap_or(0.0));
    pairs.iter().fold(None, |best: Option<&DexPair>, current| match best {
        None => Some(current),
        Some(b) => {
            let (bl, bv) = key(b);
            let (cl, cv) = key(current);
            let better = match cl.partial_cmp(&bl) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => cv > bv,
                _ => false,
            };
            Some(if better { current } else { b })
        }
    })
}

/// Pair lookups the token risk analyzer depends on
#[async_trait]
pub trait DexApi: Send + Sync {
    async fn search(&self, query: &str) -> AppResult<Vec<DexPair>>;

    async fn pair(&self, chain_id: &str, pair_address: &str) -> AppResult<Option<DexPair>>;

    /// Best pair for a query, optionally restricted to one chain. With
    /// `strict_chain` a chain filter that matches nothing yields `None`
    /// instead of falling back to every chain.
    async fn resolve_pair(
        &self,
        query: &str,
        chain_id: Option<&str>,
        strict_chain: bool,
    ) -> AppResult<Option<DexPairReport>> {
        let pairs = self.search(query).await?;
        let filtered: Vec<DexPair> = match chain_id {
            Some(chain) => pairs
                .iter()
                .filter(|p| p.chain_id.eq_ignore_ascii_case(chain))
                .cloned()
                .collect(),
            None => pairs.clone(),
        };
        if chain_id.is_some() && strict_chain && filtered.is_empty() {
            return Ok(None);
        }
        let candidates = if filtered.is_empty() { &pairs } else { &filtered };
        let best = match select_best_pair(candidates) {
            Some(best) => best,
            None => return Ok(None),
        };

        let details = self.pair(&best.chain_id, &best.pair_address).await?;
        Ok(Some(DexPairReport::from(details.as_ref().unwrap_or(best))))
    }
}

/// DexScreener API client
#[derive(Clone)]
pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
    search_cache: TtlCache<Vec<DexPair>>,
    pair_cache: TtlCache<DexPair>,
}

impl DexScreenerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::Unknown, "Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            search_cache: TtlCache::with_ttl_secs(DEXSCREENER_CACHE_TTL_SECS),
            pair_cache: TtlCache::with_ttl_secs(DEXSCREENER_CACHE_TTL_SECS),
        })
    }

    async fn get(&self, url: Url) -> AppResult<DexScreenerResponse> {
        debug!("🌐 DexScreener GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::dexscreener_error(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::dexscreener_error(format!(
                "API error: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::dexscreener_error(format!("failed to parse response: {}", e)))
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::invalid_config(format!("Invalid DexScreener base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::invalid_config("DexScreener base URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl DexApi for DexScreenerClient {
    async fn search(&self, query: &str) -> AppResult<Vec<DexPair>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let cache_key = namespaced_key("dexscreener:search", &[&trimmed.to_lowercase()]);
        if let Some(cached) = self.search_cache.get(&cache_key) {
            return Ok(cached);
        }

        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut().append_pair("q", trimmed);
        let pairs = self.get(url).await?.pairs.unwrap_or_default();

        info!("📊 DexScreener: {} pairs for '{}'", pairs.len(), trimmed);
        self.search_cache.set(cache_key, pairs.clone());
        Ok(pairs)
    }

    async fn pair(&self, chain_id: &str, pair_address: &str) -> AppResult<Option<DexPair>> {
        if chain_id.is_empty() || pair_address.is_empty() {
            return Ok(None);
        }
        let cache_key = namespaced_key("dexscreener:pair", &[chain_id, pair_address]);
        if let Some(cached) = self.pair_cache.get(&cache_key) {
            return Ok(Some(cached));
        }

        let url = self.endpoint(&["pairs", chain_id, pair_address])?;
        let pair = self
            .get(url)
            .await?
            .pairs
            .and_then(|pairs| pairs.into_iter().next());
        if let Some(pair) = &pair {
            self.pair_cache.set(cache_key, pair.clone());
        }
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(address: &str, liquidity: Option<f64>, volume: Option<f64>) -> DexPair {
        DexPair {
            chain_id: "ethereum".into(),
            pair_address: address.into(),
            liquidity: liquidity.map(|usd| DexLiquidity { usd: Some(usd) }),
            volume: volume.map(|h24| DexVolume { h24: Some(h24) }),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_best_pair_by_liquidity_then_volume() {
        let pairs = vec![
            pair("a", Some(10_000.0), Some(1.0)),
            pair("b", Some(50_000.0), Some(5.0)),
            pair("c", Some(50_000.0), Some(9.0)),
        ];
        assert_eq!(select_best_pair(&pairs).unwrap().pair_address, "c");
    }

    #[test]
    fn test_select_best_pair_ties_keep_first() {
        let pairs = vec![pair("a", Some(1.0), Some(2.0)), pair("b", Some(1.0), Some(2.0))];
        for _ in 0..3 {
            assert_eq!(select_best_pair(&pairs).unwrap().pair_address, "a");
        }
        assert!(select_best_pair(&[]).is_none());
    }

    #[test]
    fn test_select_best_pair_without_liquidity_uses_volume() {
        let pairs = vec![pair("a", None, Some(100.0)), pair("b", None, Some(500.0))];
        assert_eq!(select_best_pair(&pairs).unwrap().pair_address, "b");
    }

    #[test]
    fn test_pair_report_mapping() {
        let raw = r#"{
            "chainId": "bsc",
            "dexId": "pancakeswap",
            "pairAddress": "0xpair",
            "url": "https://dexscreener.com/bsc/0xpair",
            "baseToken": {"address": "0xtoken", "name": "Cake", "symbol": "CAKE"},
            "quoteToken": {"address": "0xwbnb", "name": "Wrapped BNB", "symbol": "WBNB"},
            "priceUsd": "2.51",
            "priceChange": {"h24": -3.2},
            "liquidity": {"usd": 125000.5},
            "fdv": 9000000,
            "volume": {"h24": 40000},
            "txns": {"h24": {"buys": 120, "sells": 80}},
            "pairCreatedAt": 1600000000000,
            "info": {"socials": [{"type": "twitter", "url": "https://x.com/cake"}]}
        }"#;
        let pair: DexPair = serde_json::from_str(raw).unwrap();
        let report = DexPairReport::from(&pair);
        assert_eq!(report.price_usd, Some(2.51));
        assert_eq!(report.liquidity_usd, Some(125000.5));
        assert_eq!(report.buys_24h, Some(120));
        assert_eq!(report.socials.len(), 1);
        assert!(report.websites.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["liquidityUSD"], 125000.5);
        assert_eq!(json["change24h"], -3.2);
    }

    #[test]
    fn test_endpoint_building() {
        let client = DexScreenerClient::new("https://api.dexscreener.com/latest/dex/", Duration::from_secs(1)).unwrap();
        let url = client.endpoint(&["pairs", "bsc", "0xpair"]).unwrap();
        assert_eq!(url.as_str(), "https://api.dexscreener.com/latest/dex/pairs/bsc/0xpair");
    }
}
