//! Configuration for the lead engine.

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

/// Default database location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/homni.db?mode=rwc";

/// Smallest remaining budget a company needs to be offered a lead (NOK 100).
pub const DEFAULT_MIN_BUDGET_CENTS: i64 = 10_000;

/// Lifetime of a new bid.
pub const DEFAULT_BID_EXPIRY_HOURS: i64 = 24;

/// Region used when no address provider is registered for a code.
pub const DEFAULT_REGION: &str = "NO";

const DEFAULT_POOL_SIZE: u32 = 10;

/// Configuration for the lead engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// SQLite connection URL.
    pub database_url: String,

    /// Maximum pooled connections.
    pub db_pool_size: u32,

    /// Least remaining budget a company needs to be matched or distributed to.
    pub min_budget_cents: i64,

    /// Hours until a placed bid expires.
    pub bid_expiry_hours: i64,

    /// Fallback region for address lookups.
    pub default_region: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_pool_size: DEFAULT_POOL_SIZE,
            min_budget_cents: DEFAULT_MIN_BUDGET_CENTS,
            bid_expiry_hours: DEFAULT_BID_EXPIRY_HOURS,
            default_region: DEFAULT_REGION.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `HOMNI_DATABASE_URL` - SQLite URL (default: sqlite:data/homni.db?mode=rwc)
    /// - `HOMNI_DB_POOL_SIZE` - Pool size (default: 10)
    /// - `HOMNI_MIN_BUDGET_CENTS` - Budget floor for matching and distribution (default: 10000)
    /// - `HOMNI_BID_EXPIRY_HOURS` - Bid lifetime (default: 24)
    /// - `HOMNI_DEFAULT_REGION` - Address lookup region (default: NO)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            database_url: lookup("HOMNI_DATABASE_URL").unwrap_or(defaults.database_url),
            db_pool_size: parse_var(&lookup, "HOMNI_DB_POOL_SIZE", defaults.db_pool_size)?,
            min_budget_cents: parse_var(&lookup, "HOMNI_MIN_BUDGET_CENTS", defaults.min_budget_cents)?,
            bid_expiry_hours: parse_var(&lookup, "HOMNI_BID_EXPIRY_HOURS", defaults.bid_expiry_hours)?,
            default_region: lookup("HOMNI_DEFAULT_REGION")
                .map(|r| r.trim().to_uppercase())
                .unwrap_or(defaults.default_region),
        };

        if config.db_pool_size == 0 {
            return Err(invalid("HOMNI_DB_POOL_SIZE", "0", "must be at least 1"));
        }
        if config.min_budget_cents < 0 {
            return Err(invalid(
                "HOMNI_MIN_BUDGET_CENTS",
                config.min_budget_cents.to_string(),
                "cannot be negative",
            ));
        }
        if config.bid_expiry_hours <= 0 {
            return Err(invalid(
                "HOMNI_BID_EXPIRY_HOURS",
                config.bid_expiry_hours.to_string(),
                "must be positive",
            ));
        }

        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, value.clone(), e.to_string())),
        None => Ok(default),
    }
}

fn invalid(var: &'static str, value: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.min_budget_cents, 10_000);
        assert_eq!(config.bid_expiry_hours, 24);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HOMNI_DATABASE_URL", "sqlite::memory:"),
            ("HOMNI_MIN_BUDGET_CENTS", "5000"),
            ("HOMNI_BID_EXPIRY_HOURS", " 48 "),
            ("HOMNI_DEFAULT_REGION", "se"),
        ])
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.min_budget_cents, 5000);
        assert_eq!(config.bid_expiry_hours, 48);
        assert_eq!(config.default_region, "SE");
    }

    #[test]
    fn test_invalid_values() {
        let err = config_from(&[("HOMNI_DB_POOL_SIZE", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "HOMNI_DB_POOL_SIZE", .. }));

        assert!(config_from(&[("HOMNI_BID_EXPIRY_HOURS", "0")]).is_err());
        assert!(config_from(&[("HOMNI_MIN_BUDGET_CENTS", "-1")]).is_err());
    }
}
