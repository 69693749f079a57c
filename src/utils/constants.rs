//! Constants Module - Single Source of Truth
//!
//! Every tunable of the tracing engine lives here: explorer defaults, TTLs,
//! fetch caps and the risk thresholds shared by tests.

// ============================================
// APPLICATION CONSTANTS
// ============================================

pub const APP_NAME: &str = "RusterTrace";

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = "RusterTrace/0.1.0";

// ============================================
// EXPLORER DEFAULTS
// ============================================

pub const DEFAULT_ETHERSCAN_BASE: &str = "https://api.etherscan.io/v2/api";
pub const DEFAULT_BSCSCAN_BASE: &str = "https://api.bscscan.com/v2/api";
pub const DEFAULT_DEXSCREENER_BASE: &str = "https://api.dexscreener.com/latest/dex";

/// Timeout for every outbound explorer call (seconds)
pub const DEFAULT_EXPLORER_TIMEOUT_SECS: u64 = 8;

/// Marker explorers put in the ABI field of unverified contracts.
/// EOAs return an empty row instead, so the marker itself means "contract".
pub const UNVERIFIED_CONTRACT_MARKER: &str = "contract source code not verified";

// Rate-limit retry policy (explorers throttle at ~5 req/s on free keys)
pub const EXPLORER_MAX_ATTEMPTS: u32 = 3;
pub const EXPLORER_BASE_RETRY_MS: u64 = 500;
pub const EXPLORER_MAX_RETRY_MS: u64 = 4_000;
pub const RETRY_JITTER_PERCENT: u64 = 20;

// ============================================
// CACHE TTLs (seconds)
// ============================================

/// Per-address transfer lists and balances
pub const TRANSFER_CACHE_TTL_SECS: u64 = 20;
/// Contract classification results
pub const CONTRACT_CACHE_TTL_SECS: u64 = 60;
/// DexScreener search and pair lookups
pub const DEXSCREENER_CACHE_TTL_SECS: u64 = 15;
/// Contract source reports used by token risk
pub const CONTRACT_REPORT_CACHE_TTL_SECS: u64 = 15;

// ============================================
// TRAVERSAL LIMITS
// ============================================

/// Hard hop ceiling regardless of caller request
pub const MAX_HOPS_CEILING: u32 = 2;
pub const DEFAULT_MAX_TRANSFERS: usize = 25;
pub const MIN_MAX_TRANSFERS: usize = 10;
pub const DEFAULT_MAX_COUNTERPARTIES: usize = 5;
pub const MIN_MAX_COUNTERPARTIES: usize = 2;

/// Raw rows requested per list endpoint: min(100, max(20, 2 * maxTransfers))
pub const MIN_FETCH_LIMIT: usize = 20;
pub const MAX_FETCH_LIMIT: usize = 100;

/// Upper bound on simultaneous contract lookups per node
pub const CLASSIFIER_CONCURRENCY: usize = 8;

/// Top transfers reported per direction
pub const TOP_TRANSFERS_PER_DIRECTION: usize = 5;

/// Default time window when the caller gives none
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Deadline for REST trace requests that do not set `timeoutSecs`
pub const DEFAULT_API_TRACE_TIMEOUT_SECS: u64 = 45;
pub const MAX_API_TRACE_TIMEOUT_SECS: f64 = 300.0;

/// Decimals of every EVM native asset
pub const NATIVE_DECIMALS: u8 = 18;

// ============================================
// PRICING
// ============================================

pub const DEFAULT_STABLECOINS: [&str; 7] = ["USDT", "USDC", "DAI", "BUSD", "TUSD", "USDP", "FRAX"];

// ============================================
// CHAINS
// ============================================

pub const DEFAULT_CHAIN_ID_STR: &str = "ethereum";

/// Native symbol for well-known chain ids (falls back to the uppercased label)
pub fn known_native_symbol(chain_id: &str) -> Option<&'static str> {
    match chain_id.to_ascii_lowercase().as_str() {
        "ethereum" => Some("ETH"),
        "bsc" => Some("BNB"),
        "polygon" => Some("POL"),
        "avalanche" => Some("AVAX"),
        _ => None,
    }
}
