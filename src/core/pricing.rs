//! USD estimation for decoded transfers.

use std::collections::HashSet;

use crate::models::types::{AssetKind, Transfer};
use crate::utils::constants::DEFAULT_STABLECOINS;

/// Values stablecoins 1:1 and native transfers at a caller-supplied price.
/// Other tokens get no USD value.
#[derive(Debug, Clone)]
pub struct UsdEstimator {
    stablecoins: HashSet<String>,
    native_usd_price: Option<f64>,
}

impl UsdEstimator {
    pub fn new(stablecoins: Option<&[String]>, native_usd_price: Option<f64>) -> Self {
        let stablecoins = match stablecoins {
            Some(symbols) => symbols.iter().map(|s| s.trim().to_uppercase()).collect(),
            None => DEFAULT_STABLECOINS.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            stablecoins,
            native_usd_price: native_usd_price.filter(|p| p.is_finite()),
        }
    }

    /// Sorted, comma-joined symbol set (stable cache fingerprint)
    pub fn stablecoin_fingerprint(&self) -> String {
        let mut symbols: Vec<&str> = self.stablecoins.iter().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols.join(",")
    }

    pub fn native_usd_price(&self) -> Option<f64> {
        self.native_usd_price
    }

    pub fn estimate(&self, transfer: &Transfer) -> Option<f64> {
        match transfer.asset.kind {
            AssetKind::Token => self
                .stablecoins
                .contains(&transfer.asset.symbol.to_uppercase())
                .then(|| transfer.amount.to_f64()),
            AssetKind::Native => self.native_usd_price.map(|price| transfer.amount.to_f64() * price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::{Asset, Direction};
    use crate::utils::units::TokenAmount;
    use chrono::Utc;

    fn transfer(asset: Asset, base_units: &str, decimals: u8) -> Transfer {
        Transfer {
            hash: "0x1".into(),
            timestamp: Utc::now(),
            from: "0xa".into(),
            to: "0xb".into(),
            direction: Direction::Out,
            counterparty: "0xb".into(),
            asset,
            amount: TokenAmount::from_base_units(base_units, decimals).unwrap(),
            usd_value: None,
            explorer_url: String::new(),
        }
    }

    #[test]
    fn test_stablecoin_is_one_to_one() {
        let est = UsdEstimator::new(None, None);
        let usdc = transfer(Asset::token("usdc", None, 6), "2500000", 6);
        assert_eq!(est.estimate(&usdc), Some(2.5));
        let pepe = transfer(Asset::token("PEPE", None, 18), "1000000000000000000", 18);
        assert_eq!(est.estimate(&pepe), None);
    }

    #[test]
    fn test_native_needs_price() {
        let eth = transfer(Asset::native("ETH"), "1500000000000000000", 18);
        assert_eq!(UsdEstimator::new(None, None).estimate(&eth), None);
        assert_eq!(UsdEstimator::new(None, Some(2000.0)).estimate(&eth), Some(3000.0));
    }

    #[test]
    fn test_stablecoin_override() {
        let symbols = vec!["pyusd".to_string(), "USDT".to_string()];
        let est = UsdEstimator::new(Some(&symbols), None);
        assert_eq!(est.stablecoin_fingerprint(), "PYUSD,USDT");
        let usdc = transfer(Asset::token("USDC", None, 6), "1000000", 6);
        assert_eq!(est.estimate(&usdc), None);
    }
}
