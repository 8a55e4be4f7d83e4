//! Storefront configuration.

use crate::money::Currency;
use serde::{Deserialize, Serialize};

/// Tunables for the storefront core.
///
/// Every field has a default, so an empty `[shop]` table is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    /// Prefix of generated order numbers (`ORD-20250101120000-K7Q2XZ`).
    #[serde(default = "default_order_number_prefix")]
    pub order_number_prefix: String,

    /// Maximum quantity of one game on a single cart line.
    #[serde(default = "default_max_quantity")]
    pub max_quantity_per_item: i64,

    /// Currency used when rendering amounts.
    #[serde(default)]
    pub currency: Currency,
}

fn default_order_number_prefix() -> String {
    "ORD".to_string()
}

fn default_max_quantity() -> i64 {
    99
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            order_number_prefix: default_order_number_prefix(),
            max_quantity_per_item: default_max_quantity(),
            currency: Currency::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: ShopConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ShopConfig::default());
        assert_eq!(config.max_quantity_per_item, 99);
    }

    #[test]
    fn test_partial_override() {
        let config: ShopConfig =
            serde_json::from_str(r#"{"order_number_prefix":"KD","currency":"USD"}"#).unwrap();
        assert_eq!(config.order_number_prefix, "KD");
        assert_eq!(config.currency, Currency::USD);
        assert_eq!(config.max_quantity_per_item, 99);
    }
}
