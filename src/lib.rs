//! Ruster Trace Library
//!
//! Wallet transfer tracing and risk scoring over block-explorer APIs:
//! - Bounded breadth-first traversal of native and token transfers
//! - Contract counterparty filtering, USD estimation and time windows
//! - Rule-table risk scoring for traced wallets and DEX token pairs

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::chain::ChainResolver;
pub use crate::core::token_risk::{TokenRiskAnalyzer, TokenRiskAssessment, TokenRiskOptions};
pub use crate::core::traversal::WalletTracer;
pub use models::config::{ChainConfig, ExplorerConfig, ExplorerKind, TracerConfig};
pub use models::errors::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::types::{
    Asset, AssetKind, Direction, Hop, RiskFlag, RiskLevel, RiskReport, TraceOptions, Transfer,
    WalletTraceReport,
};
pub use providers::dexscreener::{DexApi, DexScreenerClient};
pub use providers::explorer::{EtherscanClient, ExplorerApi};
pub use utils::units::TokenAmount;
