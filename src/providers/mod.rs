//! Providers Module - External Data Sources
//!
//! Block explorer (transfers, balances, contract source) and DexScreener.

pub mod dexscreener;
pub mod explorer;

pub use dexscreener::*;
pub use explorer::*;
