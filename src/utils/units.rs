//! Base-unit amount decoding
//!
//! Explorers report values as integer strings in the asset's smallest unit.
//! Conversion to a decimal string is done by string slicing so that values
//! beyond f64 precision (e.g. 10^30 wei) survive exactly; `f64` is only
//! produced for ranking and USD arithmetic.

use alloy_primitives::U256;
use serde::{Serialize, Serializer};
use std::fmt;

/// An exact amount: integer base units plus the asset's decimal precision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenAmount {
    /// Normalized digits, no leading zeros ("0" for zero)
    base_units: String,
    decimals: u8,
}

impl TokenAmount {
    /// Parse an explorer base-unit string. Rejects anything that is not an
    /// unsigned decimal integer fitting in 256 bits.
    pub fn from_base_units(raw: &str, decimals: u8) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        U256::from_str_radix(trimmed, 10).ok()?;

        Some(Self {
            base_units: strip_leading_zeros(trimmed).to_string(),
            decimals,
        })
    }

    /// Parse a human decimal string ("1.25") into base units
    pub fn parse_decimal(decimal: &str, decimals: u8) -> Option<Self> {
        let raw = parse_units(decimal, decimals)?;
        Self::from_base_units(&raw, decimals)
    }

    pub fn is_zero(&self) -> bool {
        self.base_units == "0"
    }

    pub fn base_units(&self) -> &str {
        &self.base_units
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn to_decimal_string(&self) -> String {
        format_units(&self.base_units, self.decimals)
    }

    /// Lossy view for ranking and USD math
    pub fn to_f64(&self) -> f64 {
        self.to_decimal_string().parse().unwrap_or(0.0)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

fn strip_leading_zeros(digits: &str) -> &str {
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        "0"
    } else {
        stripped
    }
}

/// Render integer base units as a decimal string with `decimals` precision.
/// Trailing fractional zeros are trimmed; no float is involved.
pub fn format_units(base_units: &str, decimals: u8) -> String {
    let digits = strip_leading_zeros(base_units);
    let d = decimals as usize;
    if d == 0 {
        return digits.to_string();
    }

    let padded = format!("{:0>width$}", digits, width = d + 1);
    let (integer, fraction) = padded.split_at(padded.len() - d);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{}.{}", integer, fraction)
    }
}

/// Inverse of [`format_units`]. Returns None for malformed input or when the
/// fraction carries more digits than `decimals` allows.
pub fn parse_units(decimal: &str, decimals: u8) -> Option<String> {
    let decimal = decimal.trim();
    let (integer, fraction) = decimal.split_once('.').unwrap_or((decimal, ""));
    if integer.is_empty() && fraction.is_empty() {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer) || !all_digits(fraction) {
        return None;
    }
    let d = decimals as usize;
    if fraction.len() > d {
        return None;
    }

    let mut raw = String::with_capacity(integer.len() + d);
    raw.push_str(integer);
    raw.push_str(fraction);
    raw.extend(std::iter::repeat('0').take(d - fraction.len()));
    Some(strip_leading_zeros(&raw).to_string())
}
