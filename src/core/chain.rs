//! Chain resolution: caller hint → configured chain with usable credentials.

use tracing::debug;

use crate::models::config::{ChainConfig, TracerConfig};
use crate::utils::constants::DEFAULT_CHAIN_ID_STR;

/// Resolves chain hints against the configured chain list
#[derive(Debug, Clone)]
pub struct ChainResolver {
    config: TracerConfig,
}

impl ChainResolver {
    pub fn new(config: TracerConfig) -> Self {
        Self { config }
    }

    pub fn chains(&self) -> &[ChainConfig] {
        &self.config.chains
    }

    /// Lookup order:
    /// 1. numeric chain id (only that, when given)
    /// 2. case-insensitive id, then label
    /// 3. with no hint at all, the "ethereum" entry, else the first chain
    ///
    /// A match whose explorer has no API key is treated as unavailable,
    /// the default chain included.
    pub fn resolve(&self, chain_id: Option<u64>, hint: Option<&str>) -> Option<&ChainConfig> {
        let chains = &self.config.chains;
        let hint = hint.map(str::trim).filter(|h| !h.is_empty());

        let found = if let Some(id) = chain_id {
            chains.iter().find(|c| c.chain_id == Some(id))
        } else if let Some(needle) = hint {
            chains
                .iter()
                .find(|c| c.id.eq_ignore_ascii_case(needle))
                .or_else(|| chains.iter().find(|c| c.label.eq_ignore_ascii_case(needle)))
        } else {
            chains
                .iter()
                .find(|c| c.id == DEFAULT_CHAIN_ID_STR)
                .or_else(|| chains.first())
        };

        let chain = found?;
        let has_key = self
            .config
            .explorer(chain.explorer)
            .map(|e| e.has_credentials())
            .unwrap_or(false);
        if !has_key {
            debug!("⛓️ Chain {} has no {} configured", chain.id, chain.explorer.api_key_env());
            return None;
        }
        Some(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{ExplorerConfig, ExplorerKind};

    fn resolver(with_bsc_key: bool) -> ChainResolver {
        let chains = vec![
            ChainConfig::new("base", "Base", ExplorerKind::Etherscan, Some(8453)),
            ChainConfig::ethereum(),
            ChainConfig::new("bsc", "BNB Chain", ExplorerKind::Bscscan, Some(56)),
        ];
        let mut config = TracerConfig::default()
            .with_chains(chains)
            .with_explorer(
                ExplorerKind::Etherscan,
                ExplorerConfig::new("https://api.etherscan.io/v2/api", Some("ekey".into())),
            );
        if with_bsc_key {
            config = config.with_explorer(
                ExplorerKind::Bscscan,
                ExplorerConfig::new("https://api.bscscan.com/api", Some("bkey".into())),
            );
        }
        ChainResolver::new(config)
    }

    #[test]
    fn test_default_prefers_ethereum() {
        let r = resolver(true);
        assert_eq!(r.resolve(None, None).unwrap().id, "ethereum");
        assert_eq!(r.resolve(None, Some("  ")).unwrap().id, "ethereum");
    }

    #[test]
    fn test_numeric_id_wins_over_hint() {
        let r = resolver(true);
        assert_eq!(r.resolve(Some(56), Some("ethereum")).unwrap().id, "bsc");
        assert!(r.resolve(Some(999), Some("ethereum")).is_none());
    }

    #[test]
    fn test_hint_matches_id_then_label() {
        let r = resolver(true);
        assert_eq!(r.resolve(None, Some("BSC")).unwrap().id, "bsc");
        assert_eq!(r.resolve(None, Some("bnb chain")).unwrap().id, "bsc");
        assert!(r.resolve(None, Some("solana")).is_none());
    }

    #[test]
    fn test_missing_credentials_is_unavailable() {
        let r = resolver(false);
        assert!(r.resolve(None, Some("bsc")).is_none());
        assert!(r.resolve(None, Some("base")).is_some());
    }

    #[test]
    fn test_default_chain_without_key_is_unavailable() {
        let config = TracerConfig::default()
            .with_chains(vec![ChainConfig::ethereum()])
            .with_explorer(
                ExplorerKind::Etherscan,
                ExplorerConfig::new("https://api.etherscan.io/v2/api", None),
            );
        let r = ChainResolver::new(config);
        assert!(r.resolve(None, None).is_none());
        assert!(r.resolve(Some(1), None).is_none());
    }

    #[test]
    fn test_first_chain_when_no_ethereum() {
        let config = TracerConfig::default()
            .with_chains(vec![ChainConfig::new("base", "Base", ExplorerKind::Etherscan, Some(8453))])
            .with_explorer(ExplorerKind::Etherscan, ExplorerConfig::new("https://x/api", Some("k".into())));
        let r = ChainResolver::new(config);
        assert_eq!(r.resolve(None, None).unwrap().id, "base");
    }
}
