//! Exchange abstraction layer
//!
//! One capability trait hides exchange-specific REST semantics so the
//! execution engine and the operational CLI commands share a single
//! exchange-agnostic call path.

mod binance;
mod bybit;
mod registry;

pub use binance::BinanceFuturesClient;
pub use bybit::BybitClient;
pub use registry::{AdapterFactory, AdapterRegistry};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Raw order-placement response as returned by the exchange.
///
/// The engine only extracts an order identifier from it, tolerating
/// both the Bybit (`result.orderId`) and Binance (bare `orderId`)
/// nesting shapes.
pub type OrderResponse = Value;

/// Raw order-status payload. Carries at least an exchange status field
/// (`orderStatus` or `status`) and a filled-notional field.
pub type OrderStatus = Value;

/// Adapter-level failures: transport, API rejection, signing, or an
/// unexpected response shape. Always caught at the per-cycle boundary.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network/transport failure (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// HTTP or API-level rejection
    #[error("API error: {0}")]
    Api(String),
    /// HMAC signing failure
    #[error("Signing error: {0}")]
    Signing(String),
    /// Expected field absent from the response
    #[error("Missing field in response: {0}")]
    MissingField(&'static str),
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

/// A market order to be submitted, one instance per side per cycle.
///
/// Serializes to the Bybit v5 wire shape; other adapters remap the
/// fields to their own parameter names.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Product category (e.g. "linear")
    pub category: String,
    /// Trading pair symbol (e.g. "BTCUSDT")
    pub symbol: String,
    /// Trade side
    pub side: Side,
    /// Always "Market"
    pub order_type: String,
    /// Base quantity as a decimal string
    pub qty: String,
    /// Always "GTC"
    pub time_in_force: String,
    /// Reduce-only flag, only serialized when set
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reduce_only: bool,
}

impl OrderRequest {
    /// Build a market order for the given side
    pub fn market(category: &str, symbol: &str, side: Side, qty: &str, reduce_only: bool) -> Self {
        Self {
            category: category.to_string(),
            symbol: symbol.to_string(),
            side,
            order_type: "Market".to_string(),
            qty: qty.to_string(),
            time_in_force: "GTC".to_string(),
            reduce_only,
        }
    }
}

/// Capability contract every exchange backend must implement.
///
/// Failure/zero-fallback conventions:
/// - `place_order`: any error means "order not placed"
/// - `last_price`: errors when the response carries no price; never
///   returns an empty or zero price
/// - `available_balance`: returns "0" when the coin balance is absent
///   on some backends, errors on others; callers normalize either way
/// - `filled_quote`: returns "0" when the notional is not computable
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Whether this client talks to the exchange testnet
    fn is_testnet(&self) -> bool;

    /// Submit a market order
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, AdapterError>;

    /// Last traded price for a symbol, as a decimal string
    async fn last_price(&self, symbol: &str, category: &str) -> Result<String, AdapterError>;

    /// Available balance for a coin, as a decimal string
    async fn available_balance(&self, account_type: &str, coin: &str)
        -> Result<String, AdapterError>;

    /// Current status of a previously placed order
    async fn order_status(&self, symbol: &str, order_id: &str)
        -> Result<OrderStatus, AdapterError>;

    /// Filled quote-currency notional from an order status, "0" when
    /// not computable
    fn filled_quote(&self, status: &OrderStatus) -> String;

    /// Cancel all open orders, optionally scoped to one symbol
    async fn cancel_all_orders(&self, symbol: Option<&str>, category: &str)
        -> Result<Value, AdapterError>;

    /// List currently open orders, optionally scoped to one symbol
    async fn list_open_orders(&self, symbol: Option<&str>, category: &str)
        -> Result<Value, AdapterError>;

    /// Signed position size for a symbol, "0" when flat
    async fn position_size(&self, symbol: &str, category: &str) -> Result<String, AdapterError>;

    /// Close an open position with a reduce-only market order
    async fn close_position(&self, symbol: &str, category: &str, size: &str)
        -> Result<Value, AdapterError>;
}

/// Render a response field as a string, falling back when absent or null.
/// Numeric and boolean fields are stringified as-is.
pub(crate) fn field_str(value: &Value, key: &str, default: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_str_variants() {
        let value = json!({"a": "1.5", "b": 7, "c": null});
        assert_eq!(field_str(&value, "a", "0"), "1.5");
        assert_eq!(field_str(&value, "b", "0"), "7");
        assert_eq!(field_str(&value, "c", "0"), "0");
        assert_eq!(field_str(&value, "missing", "0"), "0");
    }

    #[test]
    fn test_market_buy_wire_shape() {
        let order = OrderRequest::market("linear", "BTCUSDT", Side::Buy, "0.01", false);
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["category"], "linear");
        assert_eq!(json["symbol"], "BTCUSDT");
        assert_eq!(json["side"], "Buy");
        assert_eq!(json["orderType"], "Market");
        assert_eq!(json["qty"], "0.01");
        assert_eq!(json["timeInForce"], "GTC");
        // reduceOnly is omitted entirely when false
        assert!(json.get("reduceOnly").is_none());
    }

    #[test]
    fn test_market_sell_reduce_only() {
        let order = OrderRequest::market("linear", "BTCUSDT", Side::Sell, "0.01", true);
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["side"], "Sell");
        assert_eq!(json["reduceOnly"], true);
    }

    #[test]
    fn test_side_serialization() {
        assert_eq!(serde_json::to_value(Side::Buy).unwrap(), "Buy");
        assert_eq!(serde_json::to_value(Side::Sell).unwrap(), "Sell");
    }

    #[test]
    fn test_order_request_clone() {
        let order = OrderRequest::market("linear", "ETHUSDT", Side::Buy, "1", false);
        let cloned = order.clone();
        assert_eq!(order.symbol, cloned.symbol);
        assert_eq!(order.qty, cloned.qty);
    }
}
