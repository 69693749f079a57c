//! Type definitions for wallet tracing
//! Core data structures: transfers, hops, flags and the final report.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::utils::constants::{
    DEFAULT_MAX_COUNTERPARTIES, DEFAULT_MAX_TRANSFERS, DEFAULT_WINDOW_HOURS, MAX_HOPS_CEILING,
    MIN_MAX_COUNTERPARTIES, MIN_MAX_TRANSFERS,
};
use crate::utils::units::TokenAmount;

/// Transfer direction relative to the address that owns the hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Native,
    Token,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Asset {
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

impl Asset {
    pub fn native(symbol: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Native,
            symbol: symbol.into(),
            address: None,
            decimals: None,
        }
    }

    pub fn token(symbol: impl Into<String>, address: Option<String>, decimals: u8) -> Self {
        Self {
            kind: AssetKind::Token,
            symbol: symbol.into(),
            address,
            decimals: Some(decimals),
        }
    }
}

/// One decoded value movement. `counterparty` is always the side of
/// {from, to} that is not the hop's owning address.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub direction: Direction,
    pub counterparty: String,
    pub asset: Asset,
    pub amount: TokenAmount,
    pub usd_value: Option<f64>,
    pub explorer_url: String,
}

impl Transfer {
    /// USD value when known, otherwise the raw decimal amount
    pub fn ranking_score(&self) -> f64 {
        self.usd_value.unwrap_or_else(|| self.amount.to_f64())
    }
}

/// Transfers recorded for one visited address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hop {
    pub hop: u32,
    pub address: String,
    pub transfers: Vec<Transfer>,
}

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟡",
            RiskLevel::Medium => "🟠",
            RiskLevel::High => "🔴",
        }
    }
}

/// A triggered rule. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskFlag {
    pub id: String,
    pub severity: RiskLevel,
    pub score: u32,
    pub label: String,
    pub rationale: String,
}

/// Flags ordered by descending score, aggregate clamped to [0, 100]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskReport {
    pub level: RiskLevel,
    pub score: u8,
    pub flags: Vec<RiskFlag>,
}

impl RiskReport {
    pub fn has_flag(&self, id: &str) -> bool {
        self.flags.iter().any(|f| f.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeBalance {
    pub amount: Option<TokenAmount>,
    pub usd_value: Option<f64>,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLink {
    pub title: String,
    pub url: String,
}

/// Top-level trace result. Built once per invocation, never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTraceReport {
    pub address: String,
    pub chain_id: Option<u64>,
    pub chain_label: String,
    pub native_balance: NativeBalance,
    pub total_in_usd: Option<f64>,
    pub total_out_usd: Option<f64>,
    pub top_incoming: Vec<Transfer>,
    pub top_outgoing: Vec<Transfer>,
    pub report: RiskReport,
    pub hops: Vec<Hop>,
    pub total_transfers: usize,
    pub unique_counterparties: usize,
    pub incoming_count: usize,
    pub outgoing_count: usize,
    pub sources: Vec<SourceLink>,
}

/// Caller options for `trace_wallet`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceOptions {
    pub chain_id: Option<u64>,
    pub chain: Option<String>,
    pub max_hops: Option<u32>,
    pub max_transfers: Option<usize>,
    pub max_counterparties: Option<usize>,
    pub min_usd: Option<f64>,
    pub native_usd_price: Option<f64>,
    pub stablecoin_symbols: Option<Vec<String>>,
    #[serde(deserialize_with = "deserialize_time_input")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "deserialize_time_input")]
    pub end_time: Option<DateTime<Utc>>,
    /// Drop transfers whose counterparty is a contract (default true)
    pub ignore_contract_addresses: Option<bool>,
    /// Upper bound on the whole trace
    #[serde(skip)]
    pub deadline: Option<Duration>,
}

impl TraceOptions {
    /// Requested hops clamped to the hard ceiling
    pub fn effective_max_hops(&self) -> u32 {
        self.max_hops.unwrap_or(MAX_HOPS_CEILING).min(MAX_HOPS_CEILING)
    }

    pub fn effective_max_transfers(&self) -> usize {
        self.max_transfers
            .unwrap_or(DEFAULT_MAX_TRANSFERS)
            .max(MIN_MAX_TRANSFERS)
    }

    pub fn effective_max_counterparties(&self) -> usize {
        self.max_counterparties
            .unwrap_or(DEFAULT_MAX_COUNTERPARTIES)
            .max(MIN_MAX_COUNTERPARTIES)
    }

    pub fn filters_contracts(&self) -> bool {
        self.ignore_contract_addresses != Some(false)
    }

    pub fn has_explicit_window(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds
fn deserialize_time_input<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TimeInput {
        Millis(i64),
        Text(String),
    }

    match Option::<TimeInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(TimeInput::Millis(ms)) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid epoch millis {}", ms))),
        Some(TimeInput::Text(text)) => DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

/// Inclusive time window applied to transfer timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Whether the caller supplied either bound
    pub explicit: bool,
}

impl TimeWindow {
    /// Default: the last 24h ending `now`. With only one explicit bound the
    /// other is derived (end defaults to now, start to end - 24h, not before epoch).
    pub fn resolve(options: &TraceOptions, now: DateTime<Utc>) -> Self {
        let span = ChronoDuration::hours(DEFAULT_WINDOW_HOURS);
        if options.has_explicit_window() {
            let end = options.end_time.unwrap_or(now);
            let start = options.start_time.unwrap_or_else(|| {
                end.checked_sub_signed(span)
                    .filter(|derived| derived.timestamp_millis() >= 0)
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            });
            return Self {
                start,
                end,
                explicit: true,
            };
        }
        Self {
            start: now - span,
            end: now,
            explicit: false,
        }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts <= self.end
    }

    /// Cache fingerprint. The default window is keyed as a rolling window so
    /// consecutive calls within the cache TTL can share results.
    pub fn fingerprint(&self) -> String {
        if self.explicit {
            format!(
                "{}-{}",
                self.start.timestamp_millis(),
                self.end.timestamp_millis()
            )
        } else {
            format!("last{}h", DEFAULT_WINDOW_HOURS)
        }
    }
}
