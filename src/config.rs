//! Configuration types for volume-bot
//!
//! Loaded from a TOML file; `${ENV_VAR}` placeholders inside string
//! values are substituted from the process environment after parsing,
//! so credentials never have to live in the file itself.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration-level failures: fatal at startup, before any trading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Config file is not valid TOML or misses required fields
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// Exchange name has no registered adapter
    #[error("Unsupported exchange: {0}")]
    UnsupportedExchange(String),
    /// Adapter requires credentials that were not provided
    #[error("{exchange} API key/secret are required")]
    MissingCredentials { exchange: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub bybit: ApiCredentials,
    #[serde(default)]
    pub binance: ApiCredentials,
    pub logging: LoggingConfig,
}

/// Trading loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Exchange to trade on ("bybit" or "binance")
    pub exchange: String,
    /// Trading pair symbol (e.g. "BTCUSDT")
    pub symbol: String,
    /// Product category (e.g. "linear")
    pub category: String,
    /// Wallet account type for balance lookups (e.g. "UNIFIED")
    pub account_type: String,
    /// Per-leg order quantity, kept as a decimal string
    pub order_qty: String,
    /// Pacing delay between cycles (seconds)
    pub interval_sec: u64,
    /// Signed-request receive window (milliseconds)
    pub recv_window: u64,
    /// Delay between fill polls and between the two legs (milliseconds)
    pub fill_delay_ms: u64,
    /// Volume ceiling in USDT, "0" disables the limit
    pub max_volume_usdt: String,
    /// Log intended orders instead of placing them
    pub dry_run: bool,
    /// In dry-run mode, also accrue the estimated cycle volume so the
    /// ceiling terminates a simulation
    #[serde(default)]
    pub dry_run_accrues: bool,
    /// Fill-confirmation polls per leg before abandoning the cycle
    #[serde(default = "default_fill_poll_attempts")]
    pub fill_poll_attempts: u32,
    /// Use the exchange testnet
    pub testnet: bool,
}

fn default_fill_poll_attempts() -> u32 {
    crate::engine::DEFAULT_FILL_POLL_ATTEMPTS
}

/// API key pair for one exchange
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCredentials {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info")
    pub level: String,
    /// Optional log file appended to alongside stdout
    pub file: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file, substituting `${ENV_VAR}`
    /// placeholders in string values from the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let raw: toml::Value = toml::from_str(content)?;
        resolve_env(raw).try_into()
    }
}

/// Recursively substitute `${NAME}` placeholders in string values.
fn resolve_env(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::String(s) => toml::Value::String(resolve_env_str(&s)),
        toml::Value::Array(items) => {
            toml::Value::Array(items.into_iter().map(resolve_env).collect())
        }
        toml::Value::Table(table) => {
            toml::Value::Table(table.into_iter().map(|(k, v)| (k, resolve_env(v))).collect())
        }
        other => other,
    }
}

/// Replace each `${NAME}` (NAME in [A-Z0-9_]+) with the environment
/// variable's value, or the empty string when unset. Placeholders that
/// do not match the pattern are left as-is.
fn resolve_env_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let name_end = after.find('}').filter(|&end| {
            end > 0
                && after[..end]
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
        });
        match name_end {
            Some(end) => {
                out.push_str(&std::env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        [bot]
        exchange = "bybit"
        symbol = "BTCUSDT"
        category = "linear"
        account_type = "UNIFIED"
        order_qty = "0.01"
        interval_sec = 10
        recv_window = 5000
        fill_delay_ms = 500
        max_volume_usdt = "10000"
        dry_run = true
        testnet = true

        [bybit]
        key = "test-key"
        secret = "test-secret"

        [logging]
        level = "info"
    "#;

    #[test]
    fn test_config_deserialize() {
        let config = AppConfig::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.bot.exchange, "bybit");
        assert_eq!(config.bot.order_qty, "0.01");
        assert_eq!(config.bot.max_volume_usdt, "10000");
        assert_eq!(config.bybit.key, "test-key");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::from_toml_str(EXAMPLE).unwrap();
        // Omitted [binance] section defaults to empty credentials
        assert!(config.binance.key.is_empty());
        assert!(!config.bot.dry_run_accrues);
        assert_eq!(config.bot.fill_poll_attempts, 5);
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("VOLUME_BOT_TEST_KEY", "k-from-env");
        let toml = EXAMPLE.replace("test-key", "${VOLUME_BOT_TEST_KEY}");
        let config = AppConfig::from_toml_str(&toml).unwrap();
        assert_eq!(config.bybit.key, "k-from-env");
    }

    #[test]
    fn test_env_substitution_unset_is_empty() {
        std::env::remove_var("VOLUME_BOT_UNSET_VAR");
        assert_eq!(resolve_env_str("${VOLUME_BOT_UNSET_VAR}"), "");
    }

    #[test]
    fn test_env_substitution_embedded() {
        std::env::set_var("VOLUME_BOT_TEST_MID", "MID");
        assert_eq!(resolve_env_str("a-${VOLUME_BOT_TEST_MID}-z"), "a-MID-z");
    }

    #[test]
    fn test_non_placeholder_left_alone() {
        assert_eq!(resolve_env_str("${lower}"), "${lower}");
        assert_eq!(resolve_env_str("${}"), "${}");
        assert_eq!(resolve_env_str("no placeholder"), "no placeholder");
        assert_eq!(resolve_env_str("${UNTERMINATED"), "${UNTERMINATED");
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = AppConfig::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let toml = r#"
            [bot]
            exchange = "bybit"
        "#;
        assert!(AppConfig::from_toml_str(toml).is_err());
    }
}
