//! Utils Module - Helper Functions & Shared Utilities
//!
//! Cache, constants, amount decoding and logging bootstrap used across the crate.

pub mod cache;
pub mod constants;
pub mod telemetry;
pub mod units;

pub use cache::*;
pub use constants::*;
pub use telemetry::*;
pub use units::*;
