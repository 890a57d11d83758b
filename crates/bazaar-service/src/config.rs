//! Service configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                            | Default                          |
//! |-------------------------------------|----------------------------------|
//! | `BAZAAR_DB_PATH`                    | `./bazaar.db`                    |
//! | `BAZAAR_DB_MAX_CONNECTIONS`         | `5`                              |
//! | `BAZAAR_CURRENCY`                   | `usd`                            |
//! | `BAZAAR_REPEAT_ADD`                 | `replace` (or `increment`)       |
//! | `BAZAAR_REVALIDATE_COUPON_EXPIRY`   | `false`                          |
//! | `BAZAAR_CHECKOUT_SUCCESS_URL`       | `http://localhost:3000/orders`   |
//! | `BAZAAR_CHECKOUT_CANCEL_URL`        | `http://localhost:3000/cart`     |

use std::env;

use bazaar_core::RepeatAddPolicy;
use bazaar_db::DbConfig;

/// Shop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopConfig {
    /// SQLite database file
    pub db_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Currency passed to payment sessions
    pub currency: String,

    /// What adding an already-present line does
    pub repeat_add: RepeatAddPolicy,

    /// Drop expired coupons from carts on every read and mutation
    pub revalidate_coupon_expiry: bool,

    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
}

impl Default for ShopConfig {
    fn default() -> Self {
        ShopConfig {
            db_path: "./bazaar.db".to_string(),
            db_max_connections: 5,
            currency: "usd".to_string(),
            repeat_add: RepeatAddPolicy::Replace,
            revalidate_coupon_expiry: false,
            checkout_success_url: "http://localhost:3000/orders".to_string(),
            checkout_cancel_url: "http://localhost:3000/cart".to_string(),
        }
    }
}

impl ShopConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ShopConfig::default();

        let db_max_connections = match lookup("BAZAAR_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidValue("BAZAAR_DB_MAX_CONNECTIONS".to_string()))?,
            None => defaults.db_max_connections,
        };

        let repeat_add = match lookup("BAZAAR_REPEAT_ADD").as_deref().map(str::trim) {
            None => defaults.repeat_add,
            Some(raw) if raw.eq_ignore_ascii_case("replace") => RepeatAddPolicy::Replace,
            Some(raw) if raw.eq_ignore_ascii_case("increment") => RepeatAddPolicy::Increment,
            Some(_) => return Err(ConfigError::InvalidValue("BAZAAR_REPEAT_ADD".to_string())),
        };

        let revalidate_coupon_expiry = match lookup("BAZAAR_REVALIDATE_COUPON_EXPIRY") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidValue("BAZAAR_REVALIDATE_COUPON_EXPIRY".to_string())
            })?,
            None => defaults.revalidate_coupon_expiry,
        };

        let currency = lookup("BAZAAR_CURRENCY")
            .map(|c| c.trim().to_lowercase())
            .unwrap_or(defaults.currency);
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidValue("BAZAAR_CURRENCY".to_string()));
        }

        Ok(ShopConfig {
            db_path: lookup("BAZAAR_DB_PATH").unwrap_or(defaults.db_path),
            db_max_connections,
            currency,
            repeat_add,
            revalidate_coupon_expiry,
            checkout_success_url: lookup("BAZAAR_CHECKOUT_SUCCESS_URL")
                .unwrap_or(defaults.checkout_success_url),
            checkout_cancel_url: lookup("BAZAAR_CHECKOUT_CANCEL_URL")
                .unwrap_or(defaults.checkout_cancel_url),
        })
    }

    /// Pool configuration for [`bazaar_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.db_path).max_connections(self.db_max_connections)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ShopConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ShopConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ShopConfig::from_lookup(lookup(&[
            ("BAZAAR_DB_PATH", "/tmp/shop.db"),
            ("BAZAAR_DB_MAX_CONNECTIONS", "12"),
            ("BAZAAR_CURRENCY", "EUR"),
            ("BAZAAR_REPEAT_ADD", "Increment"),
            ("BAZAAR_REVALIDATE_COUPON_EXPIRY", "yes"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, "/tmp/shop.db");
        assert_eq!(config.db_max_connections, 12);
        assert_eq!(config.currency, "eur");
        assert_eq!(config.repeat_add, RepeatAddPolicy::Increment);
        assert!(config.revalidate_coupon_expiry);
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [
            ("BAZAAR_DB_MAX_CONNECTIONS", "0"),
            ("BAZAAR_DB_MAX_CONNECTIONS", "many"),
            ("BAZAAR_REPEAT_ADD", "merge"),
            ("BAZAAR_REVALIDATE_COUPON_EXPIRY", "maybe"),
            ("BAZAAR_CURRENCY", "dollars"),
        ] {
            let err = ShopConfig::from_lookup(lookup(&[(name, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref n) if n == name));
        }
    }
}
