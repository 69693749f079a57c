//! Token Risk Assessment
//!
//! Query → best DexScreener pair → (optional) contract source report → pair
//! risk engine. The contract lookup is best-effort: it only runs when the
//! pair's chain is configured with explorer credentials, and a failure
//! just leaves the contract part out.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::chain::ChainResolver;
use crate::core::risk_score::{build_pair_report, PairRiskInput};
use crate::core::traversal::normalize_address;
use crate::models::config::ChainConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::RiskReport;
use crate::providers::dexscreener::{DexApi, DexPairReport};
use crate::providers::explorer::{ContractReport, ExplorerApi};
use crate::utils::cache::{namespaced_key, TtlCache};
use crate::utils::constants::CONTRACT_REPORT_CACHE_TTL_SECS;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenRiskOptions {
    /// DexScreener chain slug to prefer ("ethereum", "bsc", ...)
    pub chain: Option<String>,
    /// Return "not found" instead of falling back to other chains
    pub strict_chain: bool,
    pub market_cap_usd: Option<f64>,
    /// Skip the contract lookup when `Some(false)`
    pub include_contract: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRiskAssessment {
    pub query: String,
    pub pair: DexPairReport,
    pub contract: Option<ContractReport>,
    pub risk: RiskReport,
}

#[derive(Clone)]
pub struct TokenRiskAnalyzer {
    dex: Arc<dyn DexApi>,
    explorer: Arc<dyn ExplorerApi>,
    resolver: ChainResolver,
    contract_cache: TtlCache<Option<ContractReport>>,
}

impl TokenRiskAnalyzer {
    pub fn new(dex: Arc<dyn DexApi>, explorer: Arc<dyn ExplorerApi>, resolver: ChainResolver) -> Self {
        Self {
            dex,
            explorer,
            resolver,
            contract_cache: TtlCache::with_ttl_secs(CONTRACT_REPORT_CACHE_TTL_SECS),
        }
    }

    pub async fn assess(&self, query: &str, options: &TokenRiskOptions) -> AppResult<TokenRiskAssessment> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::token_not_found(query));
        }

        let pair = self
            .dex
            .resolve_pair(query, options.chain.as_deref(), options.strict_chain)
            .await?
            .ok_or_else(|| AppError::token_not_found(query))?;

        let contract = if options.include_contract != Some(false) {
            self.contract_report(&pair).await
        } else {
            None
        };

        let input = PairRiskInput {
            pair: Some(pair.clone()),
            contract: contract.clone(),
            market_cap_usd: options.market_cap_usd.filter(|m| m.is_finite()),
            now_ms: Utc::now().timestamp_millis(),
        };
        let risk = build_pair_report(&input);

        info!(
            "🛡️ {} → {} {} on {}: {} {} ({} flags)",
            query,
            pair.base_token.symbol.as_deref().unwrap_or("?"),
            pair.pair_address,
            pair.chain_id,
            risk.level.emoji(),
            risk.score,
            risk.flags.len()
        );

        Ok(TokenRiskAssessment {
            query: query.to_string(),
            pair,
            contract,
            risk,
        })
    }

    fn chain_for(&self, pair: &DexPairReport) -> Option<ChainConfig> {
        self.resolver.resolve(None, Some(&pair.chain_id)).cloned()
    }

    async fn contract_report(&self, pair: &DexPairReport) -> Option<ContractReport> {
        let chain = self.chain_for(pair)?;
        let address = normalize_address(&pair.base_token.address).ok()?;

        let cache_key = namespaced_key("etherscan:source", &[&chain.id, &address]);
        if let Some(cached) = self.contract_cache.get(&cache_key) {
            return cached;
        }

        match self.explorer.source_code(&chain, &address).await {
            Ok(row) => {
                let site = self.explorer.site(&chain);
                let report = row.map(|r| ContractReport::from_source(&address, &r, &site));
                self.contract_cache.set(cache_key, report.clone());
                report
            }
            Err(e) => {
                warn!("⚠️ Contract report for {} unavailable: {}", address, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{ExplorerConfig, ExplorerKind, TracerConfig};
    use crate::models::errors::ErrorCode;
    use crate::providers::dexscreener::{DexLiquidity, DexPair, DexToken, DexVolume};
    use crate::providers::explorer::{ExplorerTokenTx, ExplorerTx, SourceCodeRow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOKEN: &str = "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984";

    struct StaticDex(Vec<DexPair>);

    #[async_trait]
    impl DexApi for StaticDex {
        async fn search(&self, _query: &str) -> AppResult<Vec<DexPair>> {
            Ok(self.0.clone())
        }

        async fn pair(&self, _chain_id: &str, _pair_address: &str) -> AppResult<Option<DexPair>> {
            Ok(None)
        }
    }

    struct SourceOnly {
        row: Option<SourceCodeRow>,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExplorerApi for SourceOnly {
        async fn tx_list(&self, _c: &ChainConfig, _a: &str, _l: usize) -> AppResult<Vec<ExplorerTx>> {
            Ok(vec![])
        }
        async fn token_tx_list(&self, _c: &ChainConfig, _a: &str, _l: usize) -> AppResult<Vec<ExplorerTokenTx>> {
            Ok(vec![])
        }
        async fn native_balance(&self, _c: &ChainConfig, _a: &str) -> AppResult<Option<String>> {
            Ok(None)
        }
        async fn source_code(&self, _c: &ChainConfig, _a: &str) -> AppResult<Option<SourceCodeRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::explorer("boom"));
            }
            Ok(self.row.clone())
        }
        fn site(&self, _c: &ChainConfig) -> String {
            "https://etherscan.io".to_string()
        }
    }

    fn pair(chain: &str, liquidity: f64) -> DexPair {
        DexPair {
            chain_id: chain.into(),
            dex_id: "uniswap".into(),
            pair_address: format!("0xpair{}", chain),
            base_token: DexToken {
                address: TOKEN.into(),
                name: Some("Uniswap".into()),
                symbol: Some("UNI".into()),
            },
            liquidity: Some(DexLiquidity { usd: Some(liquidity) }),
            volume: Some(DexVolume { h24: Some(1_000_000.0) }),
            ..Default::default()
        }
    }

    fn analyzer(pairs: Vec<DexPair>, explorer: Arc<SourceOnly>) -> TokenRiskAnalyzer {
        let config = TracerConfig::default().with_explorer(
            ExplorerKind::Etherscan,
            ExplorerConfig::new("https://api.etherscan.io/v2/api", Some("k".into())),
        );
        TokenRiskAnalyzer::new(Arc::new(StaticDex(pairs)), explorer, ChainResolver::new(config))
    }

    fn explorer(row: Option<SourceCodeRow>, fail: bool) -> Arc<SourceOnly> {
        Arc::new(SourceOnly {
            row,
            fail,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_assess_with_unverified_contract() {
        let row = SourceCodeRow {
            abi: Some("Contract source code not verified".into()),
            ..Default::default()
        };
        let explorer = explorer(Some(row), false);
        let analyzer = analyzer(vec![pair("bsc", 900_000.0), pair("ethereum", 2_000_000.0)], explorer.clone());

        let result = analyzer.assess("UNI", &TokenRiskOptions::default()).await.unwrap();
        assert_eq!(result.pair.chain_id, "ethereum");
        assert!(!result.contract.as_ref().unwrap().verified);
        assert!(result.risk.has_flag("contract:unverified"));
        assert!(result.risk.has_flag("socials:missing"));

        analyzer.assess("UNI", &TokenRiskOptions::default()).await.unwrap();
        assert_eq!(explorer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_contract_lookup_failure_is_soft() {
        let analyzer = analyzer(vec![pair("ethereum", 2_000_000.0)], explorer(None, true));
        let result = analyzer.assess("UNI", &TokenRiskOptions::default()).await.unwrap();
        assert!(result.contract.is_none());
        assert!(!result.risk.has_flag("contract:unverified"));
    }

    #[tokio::test]
    async fn test_unconfigured_chain_skips_contract() {
        let explorer = explorer(None, false);
        let analyzer = analyzer(vec![pair("solana", 2_000_000.0)], explorer.clone());
        let result = analyzer.assess("UNI", &TokenRiskOptions::default()).await.unwrap();
        assert!(result.contract.is_none());
        assert_eq!(explorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_strict_chain_and_not_found() {
        let analyzer = analyzer(vec![pair("bsc", 1.0)], explorer(None, false));
        let strict = TokenRiskOptions {
            chain: Some("ethereum".into()),
            strict_chain: true,
            ..Default::default()
        };
        let err = analyzer.assess("UNI", &strict).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenNotFound);

        let loose = TokenRiskOptions {
            chain: Some("ethereum".into()),
            ..Default::default()
        };
        let result = analyzer.assess("UNI", &loose).await.unwrap();
        assert_eq!(result.pair.chain_id, "bsc");
        assert!(result.risk.has_flag("liquidity:very-low"));
    }
}
