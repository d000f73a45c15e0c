//! Commerce configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                     | Default    |
//! |------------------------------|------------|
//! | `GUILD_DATABASE_PATH`        | `guild.db` |
//! | `PLATFORM_FEE_PERCENT`       | `10`       |
//! | `GUILD_CURRENCY`             | `usd`      |
//! | `JWT_SECRET`                 | required   |
//! | `PAYMENT_INTENT_TIMEOUT_MS`  | `10000`    |
//! | `RECEIPT_TIMEOUT_MS`         | `5000`     |
//! | `RECEIPT_POLL_INTERVAL_SECS` | `5`        |
//! | `RECEIPT_MAX_ATTEMPTS`       | `3`        |
//! | `RECEIPT_BATCH_SIZE`         | `50`       |
//!
//! The three `RECEIPT_*` dispatcher settings must be at least 1.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use guild_core::validation::validate_percent;
use guild_core::{Rate, DEFAULT_PLATFORM_FEE_BPS};

/// Commerce configuration.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Platform fee taken from every settled line
    pub platform_fee: Rate,

    /// Currency requested on payment intents
    pub currency: String,

    /// HS256 secret for bearer tokens
    pub jwt_secret: String,

    /// Bound on a single payment-intent call
    pub payment_intent_timeout: Duration,

    /// Bound on a single notary call
    pub receipt_timeout: Duration,

    /// How often the dispatcher polls the outbox without being nudged
    pub receipt_poll_interval: Duration,

    /// Delivery attempts before a receipt is given up on
    pub receipt_max_attempts: u32,

    /// Outbox rows handled per dispatcher pass
    pub receipt_batch_size: u32,
}

impl CommerceConfig {
    /// Defaults for everything but the secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        CommerceConfig {
            database_path: PathBuf::from("guild.db"),
            platform_fee: Rate::from_bps(DEFAULT_PLATFORM_FEE_BPS),
            currency: "usd".to_string(),
            jwt_secret: jwt_secret.into(),
            payment_intent_timeout: Duration::from_millis(10_000),
            receipt_timeout: Duration::from_millis(5_000),
            receipt_poll_interval: Duration::from_secs(5),
            receipt_max_attempts: 3,
            receipt_batch_size: 50,
        }
    }

    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired("JWT_SECRET".to_string()))?;

        let fee_percent: f64 = parse_or(&lookup, "PLATFORM_FEE_PERCENT", 10.0)?;
        let platform_fee = validate_percent("PLATFORM_FEE_PERCENT", fee_percent)
            .map_err(|_| ConfigError::InvalidValue("PLATFORM_FEE_PERCENT".to_string()))?;

        Ok(CommerceConfig {
            database_path: lookup("GUILD_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("guild.db")),
            platform_fee,
            currency: lookup("GUILD_CURRENCY").unwrap_or_else(|| "usd".to_string()),
            jwt_secret,
            payment_intent_timeout: Duration::from_millis(parse_or(
                &lookup,
                "PAYMENT_INTENT_TIMEOUT_MS",
                10_000,
            )?),
            receipt_timeout: Duration::from_millis(parse_or(&lookup, "RECEIPT_TIMEOUT_MS", 5_000)?),
            receipt_poll_interval: Duration::from_secs(parse_nonzero(
                &lookup,
                "RECEIPT_POLL_INTERVAL_SECS",
                5,
            )?),
            receipt_max_attempts: parse_nonzero(&lookup, "RECEIPT_MAX_ATTEMPTS", 3)?,
            receipt_batch_size: parse_nonzero(&lookup, "RECEIPT_BATCH_SIZE", 50)?,
        })
    }

    /// Sets the platform fee.
    pub fn platform_fee(mut self, fee: Rate) -> Self {
        self.platform_fee = fee;
        self
    }

    /// Sets the database path.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Sets the payment-intent timeout.
    pub fn payment_intent_timeout(mut self, timeout: Duration) -> Self {
        self.payment_intent_timeout = timeout;
        self
    }

    /// Sets the notary timeout.
    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    /// Sets the receipt attempt cap.
    pub fn receipt_max_attempts(mut self, attempts: u32) -> Self {
        self.receipt_max_attempts = attempts;
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn parse_nonzero<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Default + PartialEq,
{
    let value = parse_or(lookup, key, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CommerceConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.platform_fee.bps(), 1000);
        assert_eq!(config.currency, "usd");
        assert_eq!(config.database_path, PathBuf::from("guild.db"));
        assert_eq!(config.payment_intent_timeout, Duration::from_millis(10_000));
        assert_eq!(config.receipt_max_attempts, 3);
        assert_eq!(config.receipt_batch_size, 50);
    }

    #[test]
    fn test_fee_percent_is_converted_to_bps() {
        let config = CommerceConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("PLATFORM_FEE_PERCENT", "12.5"),
        ]))
        .unwrap();
        assert_eq!(config.platform_fee.bps(), 1250);
    }

    #[test]
    fn test_secret_is_required() {
        let err = CommerceConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(key) if key == "JWT_SECRET"));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let err = CommerceConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("PLATFORM_FEE_PERCENT", "150"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        let err = CommerceConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("RECEIPT_TIMEOUT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "RECEIPT_TIMEOUT_MS"));
    }

    #[test]
    fn test_dispatcher_settings_must_be_positive() {
        for key in ["RECEIPT_POLL_INTERVAL_SECS", "RECEIPT_MAX_ATTEMPTS", "RECEIPT_BATCH_SIZE"] {
            let err = CommerceConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret"), (key, "0")])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref k) if k == key), "{key}");
        }

        let config = CommerceConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("RECEIPT_POLL_INTERVAL_SECS", "1"),
        ]))
        .unwrap();
        assert_eq!(config.receipt_poll_interval, Duration::from_secs(1));
    }
}
