//! Core Module - Tracing Engine & Risk Scoring
//!
//! Chain resolution, transfer fetching and filtering, BFS traversal, and the
//! two scoring engines (wallet trace, token pair).

pub mod chain;
pub mod classifier;
pub mod fetcher;
pub mod pricing;
pub mod risk_score;
pub mod token_risk;
pub mod traversal;

pub use chain::*;
pub use classifier::*;
pub use fetcher::*;
pub use pricing::*;
pub use risk_score::*;
pub use token_risk::*;
pub use traversal::*;
