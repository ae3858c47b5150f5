//! Adapter registry: exchange name → client factory
//!
//! Built explicitly once during startup, before the engine is
//! constructed. No global mutable state; the engine never sees the
//! registry, it receives an already-built adapter.

use super::{BinanceFuturesClient, BybitClient, ExchangeAdapter};
use crate::config::{AppConfig, ConfigError};
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor taking the resolved configuration and returning a
/// ready-to-use adapter. Fails when credentials are missing.
pub type AdapterFactory = fn(&AppConfig) -> Result<Arc<dyn ExchangeAdapter>, ConfigError>;

/// Case-insensitive mapping from exchange name to adapter factory.
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with all built-in exchanges registered
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("bybit", bybit_factory);
        registry.register("binance", binance_factory);
        registry
    }

    /// Register a factory under a name. Idempotent per name: a later
    /// registration under the same name replaces the earlier one.
    pub fn register(&mut self, name: &str, factory: AdapterFactory) {
        self.factories.insert(name.to_lowercase(), factory);
    }

    /// Registered exchange names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build an adapter for the named exchange from the configuration.
    ///
    /// Fails with `ConfigError::UnsupportedExchange` for an unknown
    /// name, leaving all registrations untouched.
    pub fn build(
        &self,
        name: &str,
        config: &AppConfig,
    ) -> Result<Arc<dyn ExchangeAdapter>, ConfigError> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| ConfigError::UnsupportedExchange(name.to_string()))?;
        factory(config)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn bybit_factory(config: &AppConfig) -> Result<Arc<dyn ExchangeAdapter>, ConfigError> {
    Ok(Arc::new(BybitClient::from_config(config)?))
}

fn binance_factory(config: &AppConfig) -> Result<Arc<dyn ExchangeAdapter>, ConfigError> {
    Ok(Arc::new(BinanceFuturesClient::from_config(config)?))
}
