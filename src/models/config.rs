//! Configuration for the tracing engine
//!
//! Chains are an ordered list (first entry is the default network) loaded
//! from a JSON file; explorer credentials and base URLs come from the
//! environment. API keys are never logged.

use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::utils::constants::{
    known_native_symbol, DEFAULT_BSCSCAN_BASE, DEFAULT_CHAIN_ID_STR, DEFAULT_DEXSCREENER_BASE,
    DEFAULT_ETHERSCAN_BASE, DEFAULT_EXPLORER_TIMEOUT_SECS,
};

/// Env var pointing at the JSON chain list
pub const CHAINS_PATH_ENV: &str = "RUSTER_TRACE_CHAINS";

/// Supported block-explorer families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplorerKind {
    Etherscan,
    Bscscan,
}

impl ExplorerKind {
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Etherscan => "ETHERSCAN_API_KEY",
            Self::Bscscan => "BSCSCAN_API_KEY",
        }
    }

    pub fn base_url_env(&self) -> &'static str {
        match self {
            Self::Etherscan => "ETHERSCAN_BASE",
            Self::Bscscan => "BSCSCAN_BASE",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Etherscan => DEFAULT_ETHERSCAN_BASE,
            Self::Bscscan => DEFAULT_BSCSCAN_BASE,
        }
    }

    pub fn all() -> [ExplorerKind; 2] {
        [Self::Etherscan, Self::Bscscan]
    }
}

/// One traceable network. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub id: String,
    pub label: String,
    pub explorer: ExplorerKind,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub native_symbol: Option<String>,
}

impl ChainConfig {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        explorer: ExplorerKind,
        chain_id: Option<u64>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            explorer,
            chain_id,
            native_symbol: None,
        }
    }

    pub fn ethereum() -> Self {
        Self::new(DEFAULT_CHAIN_ID_STR, "Ethereum", ExplorerKind::Etherscan, Some(1))
    }

    /// Explicit symbol, else a known table, else the uppercased label
    pub fn native_symbol(&self) -> String {
        if let Some(symbol) = self.native_symbol.as_deref().filter(|s| !s.trim().is_empty()) {
            return symbol.trim().to_string();
        }
        known_native_symbol(&self.id)
            .map(String::from)
            .unwrap_or_else(|| self.label.to_uppercase())
    }
}

/// Base URL and credentials for one explorer family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ExplorerConfig {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false)
    }

    fn from_env(kind: ExplorerKind) -> Self {
        let api_key = get_env(kind.api_key_env());
        if api_key.is_some() {
            info!("🔑 {} configured (key hidden)", kind.api_key_env());
        }
        Self {
            base_url: get_env(kind.base_url_env())
                .unwrap_or_else(|| kind.default_base_url().to_string()),
            api_key,
        }
    }
}

/// Everything the engine needs from the outside world
#[derive(Debug, Clone)]
pub struct TracerConfig {
    /// Ordered chain list; the first entry is the fallback default
    pub chains: Vec<ChainConfig>,
    pub explorers: HashMap<ExplorerKind, ExplorerConfig>,
    pub dexscreener_base: String,
    pub explorer_timeout: Duration,
}

impl Default for TracerConfig {
    fn default() -> Self {
        let explorers = ExplorerKind::all()
            .into_iter()
            .map(|kind| (kind, ExplorerConfig::new(kind.default_base_url(), None)))
            .collect();

        Self {
            chains: vec![ChainConfig::ethereum()],
            explorers,
            dexscreener_base: DEFAULT_DEXSCREENER_BASE.to_string(),
            explorer_timeout: Duration::from_secs(DEFAULT_EXPLORER_TIMEOUT_SECS),
        }
    }
}

impl TracerConfig {
    /// Load from environment. A broken chain file falls back to the default
    /// chain list with a warning rather than failing startup.
    pub fn from_env() -> Self {
        let chains = match get_env(CHAINS_PATH_ENV) {
            Some(path) => match Self::load_chains(Path::new(&path)) {
                Ok(chains) => {
                    info!("⛓️ Loaded {} chain(s) from {}", chains.len(), path);
                    chains
                }
                Err(e) => {
                    warn!("⚠️ Ignoring chain config {}: {:#}", path, e);
                    vec![ChainConfig::ethereum()]
                }
            },
            None => vec![ChainConfig::ethereum()],
        };

        let explorers = ExplorerKind::all()
            .into_iter()
            .map(|kind| (kind, ExplorerConfig::from_env(kind)))
            .collect();

        let explorer_timeout = get_env("EXPLORER_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_EXPLORER_TIMEOUT_SECS));

        Self {
            chains,
            explorers,
            dexscreener_base: get_env("DEXSCREENER_BASE")
                .unwrap_or_else(|| DEFAULT_DEXSCREENER_BASE.to_string()),
            explorer_timeout,
        }
    }

    pub fn load_chains(path: &Path) -> Result<Vec<ChainConfig>> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        Self::parse_chains(&raw)
    }

    pub fn parse_chains(raw: &str) -> Result<Vec<ChainConfig>> {
        let chains: Vec<ChainConfig> =
            serde_json::from_str(raw).wrap_err("chain config is not a valid chain array")?;
        if chains.is_empty() {
            return Err(eyre!("chain config contains no chains"));
        }
        if let Some(bad) = chains.iter().find(|c| c.id.trim().is_empty()) {
            return Err(eyre!("chain with label '{}' has an empty id", bad.label));
        }
        Ok(chains)
    }

    pub fn explorer(&self, kind: ExplorerKind) -> Option<&ExplorerConfig> {
        self.explorers.get(&kind)
    }

    pub fn with_chains(mut self, chains: Vec<ChainConfig>) -> Self {
        self.chains = chains;
        self
    }

    pub fn with_explorer(mut self, kind: ExplorerKind, explorer: ExplorerConfig) -> Self {
        self.explorers.insert(kind, explorer);
        self
    }
}

fn get_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "YOUR_API_KEY")
}
