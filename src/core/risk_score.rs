//! Risk Scoring Module
//! Flag tables → aggregate score (0-100) → level.
//!
//! Two engines share the same shape:
//! - wallet trace scoring over transfer counts and USD flow
//! - DEX pair / contract scoring over market snapshot and contract metadata
//!
//! Rules are plain data (`Rule` rows with a predicate), so thresholds can be
//! tuned and tested one row at a time.

use crate::models::types::{RiskFlag, RiskLevel, RiskReport};
use crate::providers::dexscreener::DexPairReport;
use crate::providers::explorer::ContractReport;

const MAX_SCORE: u32 = 100;

/// One row of a flag table
pub struct Rule<I> {
    pub id: &'static str,
    pub severity: RiskLevel,
    pub score: u32,
    pub label: &'static str,
    pub rationale: &'static str,
    pub when: fn(&I) -> bool,
}

impl<I> Rule<I> {
    fn to_flag(&self) -> RiskFlag {
        RiskFlag {
            id: self.id.to_string(),
            severity: self.severity,
            score: self.score,
            label: self.label.to_string(),
            rationale: self.rationale.to_string(),
        }
    }
}

/// Minimum aggregate score for each level above LOW
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelBands {
    pub medium: u32,
    pub high: u32,
}

impl LevelBands {
    pub fn level(&self, score: u32) -> RiskLevel {
        if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Sum, clamp and order a flag set. The sort is stable, so equal scores
/// keep table order.
pub fn finalize(mut flags: Vec<RiskFlag>, bands: LevelBands) -> RiskReport {
    let score = flags.iter().map(|f| f.score).sum::<u32>().min(MAX_SCORE);
    flags.sort_by(|a, b| b.score.cmp(&a.score));
    RiskReport {
        level: bands.level(score),
        score: score as u8,
        flags,
    }
}

/// A flag table plus its level bands
pub struct ScoringEngine<I: 'static> {
    pub rules: &'static [Rule<I>],
    pub bands: LevelBands,
}

impl<I: 'static> ScoringEngine<I> {
    pub fn triggered(&self, input: &I) -> Vec<RiskFlag> {
        self.rules
            .iter()
            .filter(|rule| (rule.when)(input))
            .map(Rule::to_flag)
            .collect()
    }

    pub fn evaluate(&self, input: &I) -> RiskReport {
        finalize(self.triggered(input), self.bands)
    }
}

// ============================================
// WALLET TRACE ENGINE
// ============================================

/// Aggregates a finished traversal feeds into scoring
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TraceStats {
    pub total_transfers: usize,
    pub unique_counterparties: usize,
    pub incoming_count: usize,
    pub outgoing_count: usize,
    pub total_in_usd: Option<f64>,
    pub total_out_usd: Option<f64>,
}

const LARGE_FLOW_USD: f64 = 1_000_000.0;

pub static TRACE_RULES: [Rule<TraceStats>; 7] = [
    Rule {
        id: "activity:none",
        severity: RiskLevel::Low,
        score: 5,
        label: "No recent activity",
        rationale: "No transfers were found for the selected window.",
        when: |s| s.total_transfers == 0,
    },
    Rule {
        id: "activity:high",
        severity: RiskLevel::Low,
        score: 10,
        label: "High activity",
        rationale: "Large number of transfers can indicate active routing.",
        when: |s| s.total_transfers >= 50,
    },
    Rule {
        id: "counterparties:concentrated",
        severity: RiskLevel::Medium,
        score: 15,
        label: "Concentrated counterparties",
        rationale: "Most activity is with a small set of addresses.",
        when: |s| s.unique_counterparties <= 2 && s.total_transfers >= 10,
    },
    Rule {
        id: "flow:inflow-heavy",
        severity: RiskLevel::Medium,
        score: 15,
        label: "Inflow-heavy wallet",
        rationale: "Incoming transfers significantly outweigh outgoing.",
        when: |s| s.incoming_count >= 10 && s.incoming_count >= s.outgoing_count * 2,
    },
    Rule {
        id: "flow:outflow-heavy",
        severity: RiskLevel::Medium,
        score: 15,
        label: "Outflow-heavy wallet",
        rationale: "Outgoing transfers significantly outweigh incoming.",
        when: |s| s.outgoing_count >= 10 && s.outgoing_count >= s.incoming_count * 2,
    },
    Rule {
        id: "flow:large-out",
        severity: RiskLevel::Medium,
        score: 15,
        label: "Large outflows",
        rationale: "Significant value moved out in the observed window.",
        when: |s| s.total_out_usd.map(|v| v >= LARGE_FLOW_USD).unwrap_or(false),
    },
    Rule {
        id: "flow:large-in",
        severity: RiskLevel::Low,
        score: 10,
        label: "Large inflows",
        rationale: "Significant value moved in during the observed window.",
        when: |s| s.total_in_usd.map(|v| v >= LARGE_FLOW_USD).unwrap_or(false),
    },
];

pub const TRACE_BANDS: LevelBands = LevelBands { medium: 30, high: 60 };

pub fn trace_engine() -> ScoringEngine<TraceStats> {
    ScoringEngine {
        rules: &TRACE_RULES,
        bands: TRACE_BANDS,
    }
}

/// Score a finished trace
pub fn build_trace_report(stats: &TraceStats) -> RiskReport {
    trace_engine().evaluate(stats)
}

// ============================================
// PAIR / CONTRACT ENGINE
// ============================================

/// Everything the pair engine looks at. Each part is optional; rules over a
/// missing part never fire.
#[derive(Debug, Clone, Default)]
pub struct PairRiskInput {
    pub pair: Option<DexPairReport>,
    pub contract: Option<ContractReport>,
    /// Caller-supplied market cap
    pub market_cap_usd: Option<f64>,
    /// Reference clock for pair age (epoch millis)
    pub now_ms: i64,
}

const SEVEN_DAYS_MS: i64 = 7 * 24 * 60 * 60 * 1000;

fn pair_field<T>(input: &PairRiskInput, f: impl Fn(&DexPairReport) -> Option<T>) -> Option<T> {
    input.pair.as_ref().and_then(f)
}

fn liquidity_in(input: &PairRiskInput, lo: f64, hi: f64) -> bool {
    pair_field(input, |p| p.liquidity_usd)
        .map(|l| l >= lo && l < hi)
        .unwrap_or(false)
}

fn volume_in(input: &PairRiskInput, lo: f64, hi: f64) -> bool {
    pair_field(input, |p| p.volume_24h_usd)
        .map(|v| v >= lo && v < hi)
        .unwrap_or(false)
}

fn mcap_in(input: &PairRiskInput, lo: f64, hi: f64) -> bool {
    input
        .market_cap_usd
        .map(|m| m >= lo && m < hi)
        .unwrap_or(false)
}

fn txn_counts(input: &PairRiskInput) -> Option<(u64, u64)> {
    pair_field(input, |p| Some((p.buys_24h?, p.sells_24h?)))
}

pub static PAIR_RULES: [Rule<PairRiskInput>; 15] = [
    Rule {
        id: "liquidity:very-low",
        severity: RiskLevel::High,
        score: 45,
        label: "Very low liquidity",
        rationale: "Liquidity below $10k can signal fragility and slippage.",
        when: |i| liquidity_in(i, f64::NEG_INFINITY, 10_000.0),
    },
    Rule {
        id: "liquidity:low",
        severity: RiskLevel::Medium,
        score: 25,
        label: "Low liquidity",
        rationale: "Liquidity below $50k can make exits difficult.",
        when: |i| liquidity_in(i, 10_000.0, 50_000.0),
    },
    Rule {
        id: "liquidity:missing",
        severity: RiskLevel::High,
        score: 35,
        label: "Liquidity data unavailable",
        rationale: "Missing liquidity data makes it hard to assess exit risk.",
        when: |i| i.pair.as_ref().map(|p| p.liquidity_usd.is_none()).unwrap_or(false),
    },
    Rule {
        id: "fdv:liquidity",
        severity: RiskLevel::Medium,
        score: 20,
        label: "High FDV-to-liquidity ratio",
        rationale: "FDV vs liquidity suggests heavy dilution risk.",
        when: |i| {
            pair_field(i, |p| {
                let liquidity = p.liquidity_usd.filter(|l| *l != 0.0)?;
                let fdv = p.fdv_usd.filter(|f| *f != 0.0)?;
                Some(fdv / liquidity)
            })
            .map(|ratio| ratio.is_finite() && ratio > 200.0)
            .unwrap_or(false)
        },
    },
    Rule {
        id: "volume:very-low",
        severity: RiskLevel::Medium,
        score: 20,
        label: "Very low 24h volume",
        rationale: "Low trading volume can indicate limited liquidity and exit risk.",
        when: |i| volume_in(i, f64::NEG_INFINITY, 5_000.0),
    },
    Rule {
        id: "volume:low",
        severity: RiskLevel::Low,
        score: 10,
        label: "Low 24h volume",
        rationale: "Low volume can make price discovery unreliable.",
        when: |i| volume_in(i, 5_000.0, 25_000.0),
    },
    Rule {
        id: "price:volatile",
        severity: RiskLevel::Medium,
        score: 20,
        label: "High 24h volatility",
        rationale: "Large 24h swings can signal unstable liquidity or heavy speculation.",
        when: |i| pair_field(i, |p| p.change_24h).map(|c| c.abs() >= 50.0).unwrap_or(false),
    },
    Rule {
        id: "pair:new",
        severity: RiskLevel::Medium,
        score: 15,
        label: "New pair",
        rationale: "Very recent pairs have limited trading history.",
        when: |i| {
            pair_field(i, |p| p.pair_created_at.filter(|c| *c != 0))
                .map(|created| {
                    let age = i.now_ms - created;
                    age > 0 && age < SEVEN_DAYS_MS
                })
                .unwrap_or(false)
        },
    },
    Rule {
        id: "flow:buys-sells",
        severity: RiskLevel::High,
        score: 25,
        label: "Buys heavily outweigh sells",
        rationale: "Large buy/sell imbalance can indicate honeypot behavior.",
        when: |i| txn_counts(i).map(|(b, s)| s < 5 && b > 100).unwrap_or(false),
    },
    Rule {
        id: "socials:missing",
        severity: RiskLevel::Low,
        score: 10,
        label: "No socials or website",
        rationale: "Missing public links can make vetting harder.",
        when: |i| {
            i.pair
                .as_ref()
                .map(|p| p.socials.is_empty() && p.websites.is_empty())
                .unwrap_or(false)
        },
    },
    Rule {
        id: "flow:thin",
        severity: RiskLevel::Low,
        score: 10,
        label: "Very thin trading activity",
        rationale: "Low transaction counts can indicate weak market interest.",
        when: |i| txn_counts(i).map(|(b, s)| b + s < 10).unwrap_or(false),
    },
    Rule {
        id: "mcap:very-low",
        severity: RiskLevel::High,
        score: 40,
        label: "Very low market cap",
        rationale: "Market cap below $10k can signal extreme fragility.",
        when: |i| mcap_in(i, f64::NEG_INFINITY, 10_000.0),
    },
    Rule {
        id: "mcap:low",
        severity: RiskLevel::Medium,
        score: 20,
        label: "Low market cap",
        rationale: "Low market cap can make price action more volatile.",
        when: |i| mcap_in(i, 10_000.0, 50_000.0),
    },
    Rule {
        id: "contract:unverified",
        severity: RiskLevel::High,
        score: 25,
        label: "Unverified contract",
        rationale: "Unverified source code reduces transparency.",
        when: |i| i.contract.as_ref().map(|c| !c.verified).unwrap_or(false),
    },
    Rule {
        id: "contract:proxy",
        severity: RiskLevel::Medium,
        score: 10,
        label: "Proxy contract",
        rationale: "Proxy patterns can allow upgrades and hidden changes.",
        when: |i| i.contract.as_ref().map(|c| c.proxy).unwrap_or(false),
    },
];

/// Score, severity and label per ABI keyword
pub const ABI_RISK_TABLE: [(&str, u32, RiskLevel, &str); 10] = [
    ("mint", 35, RiskLevel::High, "Minting functions"),
    ("blacklist", 35, RiskLevel::High, "Blacklist control"),
    ("pause", 25, RiskLevel::Medium, "Pause control"),
    ("settax", 25, RiskLevel::Medium, "Transfer tax controls"),
    ("setfee", 25, RiskLevel::Medium, "Transfer fee controls"),
    ("setmax", 20, RiskLevel::Medium, "Max transaction controls"),
    ("setrouter", 20, RiskLevel::Medium, "Router control"),
    ("setpair", 20, RiskLevel::Medium, "Pair control"),
    ("whitelist", 15, RiskLevel::Low, "Whitelist control"),
    ("ownership", 10, RiskLevel::Low, "Ownership control"),
];

pub const PAIR_BANDS: LevelBands = LevelBands { medium: 40, high: 70 };

pub fn pair_engine() -> ScoringEngine<PairRiskInput> {
    ScoringEngine {
        rules: &PAIR_RULES,
        bands: PAIR_BANDS,
    }
}

fn abi_flags(contract: &ContractReport) -> Vec<RiskFlag> {
    contract
        .abi_risks
        .iter()
        .filter_map(|risk| {
            let keyword = risk.keyword.to_lowercase();
            ABI_RISK_TABLE
                .iter()
                .find(|(k, ..)| *k == keyword)
                .map(|&(_, score, severity, label)| RiskFlag {
                    id: format!("abi:{}", keyword),
                    severity,
                    score,
                    label: label.to_string(),
                    rationale: risk.rationale.to_string(),
                })
        })
        .collect()
}

/// Score a pair snapshot plus optional contract report
pub fn build_pair_report(input: &PairRiskInput) -> RiskReport {
    let engine = pair_engine();
    let mut flags = engine.triggered(input);
    if let Some(contract) = &input.contract {
        flags.extend(abi_flags(contract));
    }
    finalize(flags, engine.bands)
}
