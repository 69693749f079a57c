//! Block Explorer Client - Etherscan-family HTTP API
//!
//! Endpoints used:
//! - `account/txlist`, `account/tokentx` (page 1, newest first)
//! - `account/balance`
//! - `contract/getsourcecode`
//!
//! Multi-chain "v2" bases take a `chainid` parameter; older per-chain bases
//! don't. Responses use the `{status, message, result}` envelope where
//! `result` is either a row list or a message string. Rows are typed at this
//! boundary and never leave the crate as raw JSON.
//!
//! Rate limits (HTTP 429 or "rate limit" messages), timeouts and refused
//! connections are retried with exponential backoff and jitter. Everything
//! else fails fast.

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::config::{ChainConfig, ExplorerConfig, ExplorerKind, TracerConfig};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{
    EXPLORER_BASE_RETRY_MS, EXPLORER_MAX_ATTEMPTS, EXPLORER_MAX_RETRY_MS, RETRY_JITTER_PERCENT,
    UNVERIFIED_CONTRACT_MARKER, USER_AGENT as USER_AGENT_CONST,
};
use crate::utils::telemetry::mask_api_key;

// ============================================
// WIRE TYPES
// ============================================

/// `{status, message, result}` envelope shared by every endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerEnvelope<T> {
    pub status: Option<String>,
    pub message: Option<String>,
    pub result: Option<ExplorerResult<T>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExplorerResult<T> {
    Rows(Vec<T>),
    Text(String),
}

/// Row of `account/txlist`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExplorerTx {
    pub hash: Option<String>,
    pub time_stamp: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub is_error: Option<String>,
    #[serde(rename = "txreceipt_status")]
    pub txreceipt_status: Option<String>,
}

/// Row of `account/tokentx`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExplorerTokenTx {
    pub hash: Option<String>,
    pub time_stamp: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub contract_address: Option<String>,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_decimal: Option<String>,
    pub is_error: Option<String>,
    #[serde(rename = "txreceipt_status")]
    pub txreceipt_status: Option<String>,
}

/// Row of `contract/getsourcecode`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SourceCodeRow {
    pub source_code: Option<String>,
    #[serde(rename = "ABI")]
    pub abi: Option<String>,
    pub contract_name: Option<String>,
    pub compiler_version: Option<String>,
    pub optimization_used: Option<String>,
    pub runs: Option<String>,
    pub proxy: Option<String>,
    pub implementation: Option<String>,
}

impl SourceCodeRow {
    /// EOAs come back with every field empty. Source, a contract name, or
    /// the unverified marker in the ABI field all mean "contract".
    pub fn is_contract(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        filled(&self.source_code)
            || filled(&self.contract_name)
            || self
                .abi
                .as_deref()
                .map(|abi| abi.to_lowercase().contains(UNVERIFIED_CONTRACT_MARKER))
                .unwrap_or(false)
    }
}

/// Common shape of the two transfer list rows
pub trait TransferRow {
    fn hash(&self) -> Option<&str>;
    fn from_addr(&self) -> Option<&str>;
    fn to_addr(&self) -> Option<&str>;
    fn is_error(&self) -> Option<&str>;
    fn receipt_status(&self) -> Option<&str>;

    /// Explicit failure indicator on either field
    fn is_failed(&self) -> bool {
        self.is_error() == Some("1") || self.receipt_status() == Some("0")
    }
}

macro_rules! impl_transfer_row {
    ($ty:ty) => {
        impl TransferRow for $ty {
            fn hash(&self) -> Option<&str> {
                self.hash.as_deref().filter(|s| !s.is_empty())
            }
            fn from_addr(&self) -> Option<&str> {
                self.from.as_deref().filter(|s| !s.is_empty())
            }
            fn to_addr(&self) -> Option<&str> {
                self.to.as_deref().filter(|s| !s.is_empty())
            }
            fn is_error(&self) -> Option<&str> {
                self.is_error.as_deref()
            }
            fn receipt_status(&self) -> Option<&str> {
                self.txreceipt_status.as_deref()
            }
        }
    };
}

impl_transfer_row!(ExplorerTx);
impl_transfer_row!(ExplorerTokenTx);

// ============================================
// ENVELOPE INTERPRETATION
// ============================================

fn is_rate_limit_message(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests")
}

fn is_empty_message(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.is_empty() || lower.contains("no transactions found") || lower.contains("no records found")
}

/// Turn a string result (or a missing one) into an error, or `None` when the
/// explorer is only saying "nothing here".
fn classify_text(status: Option<&str>, message: Option<&str>, text: &str) -> Option<AppError> {
    let detail = if text.trim().is_empty() {
        message.unwrap_or_default()
    } else {
        text
    };
    if is_rate_limit_message(detail) {
        return Some(AppError::rate_limited(detail.to_string()));
    }
    if is_empty_message(detail)
        || message
            .map(|m| !m.trim().is_empty() && is_empty_message(m))
            .unwrap_or(false)
    {
        return None;
    }
    if status == Some("0") {
        return Some(AppError::explorer(detail.to_string()));
    }
    None
}

/// Interpret a list endpoint envelope
pub fn rows_from_envelope<T>(envelope: ExplorerEnvelope<T>) -> AppResult<Vec<T>> {
    match envelope.result {
        Some(ExplorerResult::Rows(rows)) => Ok(rows),
        Some(ExplorerResult::Text(text)) => {
            match classify_text(envelope.status.as_deref(), envelope.message.as_deref(), &text) {
                Some(err) => Err(err),
                None => Ok(Vec::new()),
            }
        }
        None => match classify_text(envelope.status.as_deref(), envelope.message.as_deref(), "") {
            Some(err) => Err(err),
            None => Ok(Vec::new()),
        },
    }
}

/// Interpret the `account/balance` envelope (result is a base-unit string)
pub fn balance_from_envelope(envelope: ExplorerEnvelope<serde_json::Value>) -> AppResult<Option<String>> {
    match envelope.result {
        Some(ExplorerResult::Text(text)) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(Some(trimmed.to_string()));
            }
            match classify_text(envelope.status.as_deref(), envelope.message.as_deref(), trimmed) {
                Some(err) => Err(err),
                None if trimmed.is_empty() => Ok(None),
                None => Err(AppError::invalid_response(format!(
                    "Unexpected balance value: {}",
                    trimmed
                ))),
            }
        }
        Some(ExplorerResult::Rows(_)) => Err(AppError::invalid_response(
            "Balance result was a list",
        )),
        None => Ok(None),
    }
}

// ============================================
// URL HELPERS
// ============================================

pub fn normalize_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// Multi-chain endpoints carry `/v2/` in their path
pub fn is_v2_base(base_url: &str) -> bool {
    match Url::parse(base_url) {
        Ok(url) => url.path().contains("/v2/"),
        Err(_) => base_url.contains("/v2/"),
    }
}

/// Build an explorer API URL. Empty values are left out.
pub fn build_api_url(
    base_url: &str,
    chain: &ChainConfig,
    params: &[(&str, &str)],
    api_key: Option<&str>,
) -> AppResult<Url> {
    let base = normalize_base(base_url);
    let mut url = Url::parse(base)
        .map_err(|e| AppError::invalid_config(format!("Invalid explorer base URL {}: {}", base, e)))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
            query.append_pair(key, value);
        }
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            query.append_pair("apikey", key);
        }
        if is_v2_base(base) {
            if let Some(chain_id) = chain.chain_id {
                query.append_pair("chainid", &chain_id.to_string());
            }
        }
    }
    Ok(url)
}

/// Public website behind an explorer API base (`api.etherscan.io` → `etherscan.io`)
pub fn explorer_site(base_url: &str) -> String {
    match Url::parse(normalize_base(base_url)) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default();
            let host = host.strip_prefix("api.").unwrap_or(host);
            match url.port() {
                Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
                None => format!("{}://{}", url.scheme(), host),
            }
        }
        Err(_) => normalize_base(base_url)
            .trim_end_matches("/v2/api")
            .trim_end_matches("/api")
            .to_string(),
    }
}

pub fn address_url(site: &str, address: &str) -> String {
    format!("{}/address/{}", site, address)
}

pub fn tx_url(site: &str, hash: &str) -> String {
    format!("{}/tx/{}", site, hash)
}

// ============================================
// EXPLORER SEAM
// ============================================

/// What the tracing engine needs from a block explorer. Implemented over
/// HTTP by [`EtherscanClient`] and in memory by tests.
#[async_trait]
pub trait ExplorerApi: Send + Sync {
    /// Native transactions, newest first, at most `limit` rows
    async fn tx_list(&self, chain: &ChainConfig, address: &str, limit: usize) -> AppResult<Vec<ExplorerTx>>;

    /// Token transfers, newest first, at most `limit` rows
    async fn token_tx_list(
        &self,
        chain: &ChainConfig,
        address: &str,
        limit: usize,
    ) -> AppResult<Vec<ExplorerTokenTx>>;

    /// Native balance in base units, `None` when the explorer returns nothing
    async fn native_balance(&self, chain: &ChainConfig, address: &str) -> AppResult<Option<String>>;

    /// First `getsourcecode` row, `None` when the result is empty
    async fn source_code(&self, chain: &ChainConfig, address: &str) -> AppResult<Option<SourceCodeRow>>;

    /// Website used for address and transaction links
    fn site(&self, chain: &ChainConfig) -> String;
}

/// Etherscan-family client over reqwest (Etherscan, BscScan and clones)
#[derive(Clone)]
pub struct EtherscanClient {
    client: reqwest::Client,
    explorers: HashMap<ExplorerKind, ExplorerConfig>,
}

impl EtherscanClient {
    pub fn new(explorers: HashMap<ExplorerKind, ExplorerConfig>, timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::Unknown, "Failed to build HTTP client", e))?;

        Ok(Self { client, explorers })
    }

    pub fn from_config(config: &TracerConfig) -> AppResult<Self> {
        Self::new(config.explorers.clone(), config.explorer_timeout)
    }

    fn explorer_for(&self, chain: &ChainConfig) -> AppResult<&ExplorerConfig> {
        self.explorers
            .get(&chain.explorer)
            .ok_or_else(|| AppError::missing_api_key(chain.explorer.api_key_env()))
    }

    fn url_for(&self, chain: &ChainConfig, params: &[(&str, &str)]) -> AppResult<Url> {
        let explorer = self.explorer_for(chain)?;
        build_api_url(&explorer.base_url, chain, params, explorer.api_key.as_deref())
    }

    /// GET with exponential backoff on retryable failures
    async fn retrying<T: DeserializeOwned, R>(
        &self,
        url: &Url,
        interpret: impl Fn(ExplorerEnvelope<T>) -> AppResult<R>,
    ) -> AppResult<R> {
        let masked = mask_api_key(url.as_str());
        let mut last_error = None;

        for attempt in 0..EXPLORER_MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                debug!(
                    "⏳ Explorer retry {}/{} after {}ms",
                    attempt + 1,
                    EXPLORER_MAX_ATTEMPTS,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            debug!("🌐 Explorer GET {}", masked);
            let result = self
                .fetch_envelope::<T>(url)
                .await
                .and_then(|envelope| interpret(envelope));

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.code.is_retryable() => {
                    warn!(
                        "⏳ Explorer {} (attempt {}/{}): {}",
                        e.code.as_str(),
                        attempt + 1,
                        EXPLORER_MAX_ATTEMPTS,
                        e.message
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    debug!("❌ Explorer call failed: {}", e);
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::rate_limited("Explorer retries exhausted")))
    }

    async fn fetch_envelope<T: DeserializeOwned>(&self, url: &Url) -> AppResult<ExplorerEnvelope<T>> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::explorer_http(status.as_u16()));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            AppError::with_source(
                ErrorCode::ExplorerInvalidResponse,
                "Failed to parse explorer response",
                e,
            )
        })
    }

    async fn list<T: DeserializeOwned>(
        &self,
        chain: &ChainConfig,
        action: &str,
        address: &str,
        limit: usize,
    ) -> AppResult<Vec<T>> {
        let offset = limit.to_string();
        let url = self.url_for(
            chain,
            &[
                ("module", "account"),
                ("action", action),
                ("address", address),
                ("page", "1"),
                ("offset", &offset),
                ("sort", "desc"),
            ],
        )?;
        self.retrying(&url, rows_from_envelope).await
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base_delay = EXPLORER_BASE_RETRY_MS * 2_u64.pow(attempt.saturating_sub(1));
    let capped_delay = base_delay.min(EXPLORER_MAX_RETRY_MS);
    let jitter_range = (capped_delay * RETRY_JITTER_PERCENT) / 100;
    let jitter: i64 = rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
    Duration::from_millis((capped_delay as i64 + jitter).max(100) as u64)
}

#[async_trait]
impl ExplorerApi for EtherscanClient {
    async fn tx_list(&self, chain: &ChainConfig, address: &str, limit: usize) -> AppResult<Vec<ExplorerTx>> {
        self.list(chain, "txlist", address, limit).await
    }

    async fn token_tx_list(
        &self,
        chain: &ChainConfig,
        address: &str,
        limit: usize,
    ) -> AppResult<Vec<ExplorerTokenTx>> {
        self.list(chain, "tokentx", address, limit).await
    }

    async fn native_balance(&self, chain: &ChainConfig, address: &str) -> AppResult<Option<String>> {
        let url = self.url_for(
            chain,
            &[
                ("module", "account"),
                ("action", "balance"),
                ("address", address),
                ("tag", "latest"),
            ],
        )?;
        self.retrying(&url, balance_from_envelope).await
    }

    async fn source_code(&self, chain: &ChainConfig, address: &str) -> AppResult<Option<SourceCodeRow>> {
        let url = self.url_for(
            chain,
            &[
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address),
            ],
        )?;
        let rows: Vec<SourceCodeRow> = self.retrying(&url, rows_from_envelope).await?;
        Ok(rows.into_iter().next())
    }

    fn site(&self, chain: &ChainConfig) -> String {
        self.explorers
            .get(&chain.explorer)
            .map(|e| explorer_site(&e.base_url))
            .unwrap_or_else(|| explorer_site(chain.explorer.default_base_url()))
    }
}

// ============================================
// CONTRACT REPORT
// ============================================

/// Risky capability found in a contract ABI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbiRisk {
    pub keyword: &'static str,
    pub matches: Vec<String>,
    pub rationale: &'static str,
}

/// Function-name keywords worth flagging, in reporting order
pub const ABI_RISK_KEYWORDS: [(&str, &str); 10] = [
    ("mint", "Minting ability can dilute supply."),
    ("blacklist", "Blacklist controls can freeze holders."),
    ("pause", "Pause controls can halt transfers."),
    ("settax", "Tax setters can change transfer costs."),
    ("setfee", "Fee setters can change transfer costs."),
    ("setmax", "Max tx/wallet setters can restrict trading."),
    ("setrouter", "Router setters can redirect liquidity."),
    ("setpair", "Pair setters can affect trading routes."),
    ("whitelist", "Whitelist controls can gate transfers."),
    ("ownership", "Ownership transfers can change control."),
];

#[derive(Deserialize)]
struct AbiEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Match ABI function names against [`ABI_RISK_KEYWORDS`]. Text that is not
/// a JSON ABI falls back to substring matching on the raw text.
pub fn scan_abi_for_risks(abi: &str) -> Vec<AbiRisk> {
    let trimmed = abi.trim();
    if trimmed.is_empty() || trimmed.to_lowercase().contains(UNVERIFIED_CONTRACT_MARKER) {
        return Vec::new();
    }

    let entries: Vec<AbiEntry> = match serde_json::from_str(trimmed) {
        Ok(entries) => entries,
        Err(_) => {
            let lower = trimmed.to_lowercase();
            return ABI_RISK_KEYWORDS
                .iter()
                .filter(|(keyword, _)| lower.contains(*keyword))
                .map(|&(keyword, rationale)| AbiRisk {
                    keyword,
                    matches: vec![keyword.to_string()],
                    rationale,
                })
                .collect();
        }
    };

    let function_names: Vec<String> = entries
        .into_iter()
        .filter(|e| e.kind.as_deref() == Some("function"))
        .filter_map(|e| e.name)
        .filter(|name| !name.is_empty())
        .map(|name| name.to_lowercase())
        .collect();

    ABI_RISK_KEYWORDS
        .iter()
        .filter_map(|&(keyword, rationale)| {
            let matches: Vec<String> = function_names
                .iter()
                .filter(|name| name.contains(keyword))
                .cloned()
                .collect();
            (!matches.is_empty()).then(|| AbiRisk {
                keyword,
                matches,
                rationale,
            })
        })
        .collect()
}

/// Verification and capability summary of a token contract
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReport {
    pub address: String,
    pub verified: bool,
    pub proxy: bool,
    pub implementation: Option<String>,
    pub contract_name: Option<String>,
    pub compiler_version: Option<String>,
    pub optimization_used: Option<bool>,
    pub runs: Option<u64>,
    pub abi_risks: Vec<AbiRisk>,
    pub source_url: String,
}

impl ContractReport {
    pub fn from_source(address: &str, row: &SourceCodeRow, site: &str) -> Self {
        let text = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        let source = row.source_code.as_deref().map(str::trim).unwrap_or_default();
        let verified = !source.is_empty() && !source.to_lowercase().contains(UNVERIFIED_CONTRACT_MARKER);

        Self {
            address: address.to_string(),
            verified,
            proxy: row.proxy.as_deref() == Some("1"),
            implementation: text(&row.implementation),
            contract_name: text(&row.contract_name),
            compiler_version: text(&row.compiler_version),
            optimization_used: match row.optimization_used.as_deref() {
                Some("1") => Some(true),
                Some("0") => Some(false),
                _ => None,
            },
            runs: row.runs.as_deref().and_then(|r| r.trim().parse().ok()),
            abi_risks: scan_abi_for_risks(row.abi.as_deref().unwrap_or_default()),
            source_url: format!("{}#code", address_url(site, address)),
        }
    }
}
