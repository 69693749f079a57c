//! Contract classification for counterparty filtering.
//!
//! Lookups that fail are logged and treated as "not a contract" (the
//! transfer is kept). Failures are not cached, so the next trace retries.

use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::config::ChainConfig;
use crate::providers::explorer::ExplorerApi;
use crate::utils::cache::{namespaced_key, TtlCache};
use crate::utils::constants::{CLASSIFIER_CONCURRENCY, CONTRACT_CACHE_TTL_SECS};

#[derive(Clone)]
pub struct ContractClassifier {
    explorer: Arc<dyn ExplorerApi>,
    cache: TtlCache<bool>,
}

impl ContractClassifier {
    pub fn new(explorer: Arc<dyn ExplorerApi>) -> Self {
        Self {
            explorer,
            cache: TtlCache::with_ttl_secs(CONTRACT_CACHE_TTL_SECS),
        }
    }

    /// `Some(is_contract)` on a definite answer, `None` when the lookup failed
    pub async fn classify(&self, chain: &ChainConfig, address: &str) -> Option<bool> {
        let cache_key = namespaced_key("contract", &[&chain.id, address]);
        if let Some(cached) = self.cache.get(&cache_key) {
            return Some(cached);
        }

        match self.explorer.source_code(chain, address).await {
            Ok(row) => {
                let is_contract = row.map(|r| r.is_contract()).unwrap_or(false);
                debug!("🔎 {} on {}: contract={}", address, chain.id, is_contract);
                self.cache.set(cache_key, is_contract);
                Some(is_contract)
            }
            Err(e) => {
                warn!("⚠️ Contract lookup failed for {} on {}: {}", address, chain.id, e);
                None
            }
        }
    }

    /// Distinct addresses that resolved to contracts. At most
    /// `CLASSIFIER_CONCURRENCY` lookups run at once.
    pub async fn contracts_among(&self, chain: &ChainConfig, addresses: &[String]) -> HashSet<String> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = addresses
            .iter()
            .filter(|a| seen.insert(a.as_str()))
            .cloned()
            .collect();

        stream::iter(unique)
            .map(|address: String| async move {
                let verdict = self.classify(chain, &address).await;
                (address, verdict)
            })
            .buffer_unordered(CLASSIFIER_CONCURRENCY)
            .filter_map(|(address, verdict)| async move { (verdict == Some(true)).then_some(address) })
            .collect()
            .await
    }
}
