//! Binance USDⓈ-M futures REST client
//!
//! Signed endpoints take an HMAC-SHA256 hex signature of the urlencoded
//! query string, appended as a `signature` parameter. The category
//! concept does not exist here; the engine's Bybit-shaped order request
//! is remapped to Binance parameter names.

use super::{field_str, AdapterError, ExchangeAdapter, OrderRequest, OrderResponse, OrderStatus, Side};
use crate::config::{AppConfig, ConfigError};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeSet;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const MAINNET_URL: &str = "https://fapi.binance.com";
const TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// Binance futures ignores the configured recv_window; 5000 ms is the
/// documented default for signed requests
const RECV_WINDOW_MS: u64 = 5000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Binance USDⓈ-M futures client
pub struct BinanceFuturesClient {
    client: Client,
    api_key: String,
    api_secret: String,
    testnet: bool,
    base_url: String,
}

impl BinanceFuturesClient {
    /// Create a new client for mainnet or testnet
    pub fn new(api_key: &str, api_secret: &str, testnet: bool) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        let base_url = if testnet { TESTNET_URL } else { MAINNET_URL };

        Self {
            client,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            testnet,
            base_url: base_url.to_string(),
        }
    }

    /// Build a client from the resolved configuration, validating that
    /// credentials are present.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        if config.binance.key.is_empty() || config.binance.secret.is_empty() {
            return Err(ConfigError::MissingCredentials {
                exchange: "Binance".to_string(),
            });
        }
        Ok(Self::new(
            &config.binance.key,
            &config.binance.secret,
            config.bot.testnet,
        ))
    }

    /// Append timestamp, recvWindow, and the HMAC signature to a query.
    fn sign_query(&self, params: &[(&str, String)]) -> Result<String, AdapterError> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>();
        query.push(format!("timestamp={}", timestamp));
        query.push(format!("recvWindow={}", RECV_WINDOW_MS));
        let query = query.join("&");

        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| AdapterError::Signing(e.to_string()))?;
        mac.update(query.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}&signature={}", query, signature))
    }

    async fn get_public(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, AdapterError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(params).send().await?;
        self.handle_response(response).await
    }

    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, AdapterError> {
        let query = self.sign_query(params)?;
        let url = format!("{}{}?{}", self.base_url, path, query);
        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Value, AdapterError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %text, "Binance HTTP error");
            return Err(AdapterError::Api(format!(
                "Binance HTTP error {}: {}",
                status, text
            )));
        }

        let data: Value = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(_) => {
                tracing::error!(body = %text, "Binance response is not JSON");
                return Ok(Value::Object(Default::default()));
            }
        };

        if let Some(code) = data.get("code").and_then(Value::as_i64) {
            if code != 0 {
                let msg = field_str(&data, "msg", "");
                tracing::error!(code, msg = %msg, "Binance API error");
            }
        }

        Ok(data)
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceFuturesClient {
    fn is_testnet(&self) -> bool {
        self.testnet
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, AdapterError> {
        let params = map_order_params(order);
        self.signed_request(Method::POST, "/fapi/v1/order", &params)
            .await
    }

    async fn last_price(&self, symbol: &str, _category: &str) -> Result<String, AdapterError> {
        let data = self
            .get_public("/fapi/v1/ticker/price", &[("symbol", symbol)])
            .await?;
        let price = field_str(&data, "price", "");
        if price.is_empty() {
            return Err(AdapterError::MissingField("price"));
        }
        Ok(price)
    }

    async fn available_balance(
        &self,
        _account_type: &str,
        coin: &str,
    ) -> Result<String, AdapterError> {
        let data = self
            .signed_request(Method::GET, "/fapi/v2/account", &[])
            .await?;
        Ok(parse_available_balance(&data, coin))
    }

    async fn order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderStatus, AdapterError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        self.signed_request(Method::GET, "/fapi/v1/order", &params)
            .await
    }

    fn filled_quote(&self, status: &OrderStatus) -> String {
        field_str(status, "cumQuote", "0")
    }

    async fn cancel_all_orders(
        &self,
        symbol: Option<&str>,
        _category: &str,
    ) -> Result<Value, AdapterError> {
        if let Some(symbol) = symbol {
            return self
                .signed_request(
                    Method::DELETE,
                    "/fapi/v1/allOpenOrders",
                    &[("symbol", symbol.to_string())],
                )
                .await;
        }

        // No symbol given: enumerate symbols with open orders and
        // cancel each one
        let open_orders = self
            .signed_request(Method::GET, "/fapi/v1/openOrders", &[])
            .await?;
        let orders = open_orders
            .as_array()
            .ok_or(AdapterError::MissingField("open orders list"))?;

        let symbols: BTreeSet<String> = orders
            .iter()
            .map(|order| field_str(order, "symbol", ""))
            .filter(|symbol| !symbol.is_empty())
            .collect();

        let mut results = serde_json::Map::new();
        for symbol in &symbols {
            let result = self
                .signed_request(
                    Method::DELETE,
                    "/fapi/v1/allOpenOrders",
                    &[("symbol", symbol.clone())],
                )
                .await?;
            results.insert(symbol.clone(), result);
        }

        Ok(serde_json::json!({
            "symbols": symbols.iter().collect::<Vec<_>>(),
            "results": results,
        }))
    }

    async fn list_open_orders(
        &self,
        symbol: Option<&str>,
        _category: &str,
    ) -> Result<Value, AdapterError> {
        let mut params = Vec::new();
        if let Some(symbol) = symbol {
            params.push(("symbol", symbol.to_string()));
        }
        self.signed_request(Method::GET, "/fapi/v1/openOrders", &params)
            .await
    }

    async fn position_size(&self, symbol: &str, _category: &str) -> Result<String, AdapterError> {
        let data = self
            .signed_request(Method::GET, "/fapi/v2/positionRisk", &[])
            .await?;
        Ok(parse_position_size(&data, symbol))
    }

    async fn close_position(
        &self,
        symbol: &str,
        _category: &str,
        size: &str,
    ) -> Result<Value, AdapterError> {
        // A negative position is short; closing it means buying back
        let (side, qty) = close_side_and_qty(size);
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", qty),
            ("reduceOnly", "true".to_string()),
        ];
        self.signed_request(Method::POST, "/fapi/v1/order", &params)
            .await
    }
}

/// Remap the Bybit-shaped order request to Binance parameter names.
fn map_order_params(order: &OrderRequest) -> Vec<(&'static str, String)> {
    let side = match order.side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    };
    let mut params = vec![
        ("symbol", order.symbol.clone()),
        ("side", side.to_string()),
        ("type", order.order_type.to_uppercase()),
        ("quantity", order.qty.clone()),
    ];
    if order.reduce_only {
        params.push(("reduceOnly", "true".to_string()));
    }
    params
}

fn parse_available_balance(data: &Value, coin: &str) -> String {
    let assets = match data.get("assets").and_then(Value::as_array) {
        Some(assets) => assets,
        None => return "0".to_string(),
    };
    for item in assets {
        if field_str(item, "asset", "") == coin {
            return field_str(item, "availableBalance", "0");
        }
    }
    "0".to_string()
}

fn parse_position_size(data: &Value, symbol: &str) -> String {
    let positions = match data.as_array() {
        Some(positions) => positions,
        None => return "0".to_string(),
    };
    for item in positions {
        if field_str(item, "symbol", "") == symbol {
            return field_str(item, "positionAmt", "0");
        }
    }
    "0".to_string()
}

fn close_side_and_qty(size: &str) -> (&'static str, String) {
    if let Some(short_qty) = size.strip_prefix('-') {
        ("BUY", short_qty.to_string())
    } else {
        ("SELL", size.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_client() -> BinanceFuturesClient {
        BinanceFuturesClient::new("test-key", "test-secret", true)
    }

    #[test]
    fn test_base_url_selection() {
        assert_eq!(test_client().base_url, TESTNET_URL);
        let mainnet = BinanceFuturesClient::new("k", "s", false);
        assert_eq!(mainnet.base_url, MAINNET_URL);
    }

    #[test]
    fn test_sign_query_shape() {
        let client = test_client();
        let query = client
            .sign_query(&[("symbol", "BTCUSDT".to_string())])
            .unwrap();
        assert!(query.starts_with("symbol=BTCUSDT&timestamp="));
        assert!(query.contains(&format!("recvWindow={}", RECV_WINDOW_MS)));

        let signature = query.rsplit("signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_map_order_params() {
        let order = OrderRequest::market("linear", "BTCUSDT", Side::Buy, "0.01", false);
        let params = map_order_params(&order);
        assert_eq!(
            params,
            vec![
                ("symbol", "BTCUSDT".to_string()),
                ("side", "BUY".to_string()),
                ("type", "MARKET".to_string()),
                ("quantity", "0.01".to_string()),
            ]
        );
    }

    #[test]
    fn test_map_order_params_reduce_only() {
        let order = OrderRequest::market("linear", "BTCUSDT", Side::Sell, "0.01", true);
        let params = map_order_params(&order);
        assert_eq!(params[1], ("side", "SELL".to_string()));
        assert_eq!(params[4], ("reduceOnly", "true".to_string()));
    }

    #[test]
    fn test_parse_available_balance() {
        let data = json!({
            "assets": [
                { "asset": "BTC", "availableBalance": "0.5" },
                { "asset": "USDT", "availableBalance": "1234.56" },
            ]
        });
        assert_eq!(parse_available_balance(&data, "USDT"), "1234.56");
        assert_eq!(parse_available_balance(&data, "BUSD"), "0");
        assert_eq!(parse_available_balance(&json!({}), "USDT"), "0");
    }

    #[test]
    fn test_parse_position_size() {
        let data = json!([
            { "symbol": "ETHUSDT", "positionAmt": "1.2" },
            { "symbol": "BTCUSDT", "positionAmt": "-0.05" },
        ]);
        assert_eq!(parse_position_size(&data, "BTCUSDT"), "-0.05");
        assert_eq!(parse_position_size(&data, "SOLUSDT"), "0");
        assert_eq!(parse_position_size(&json!({}), "BTCUSDT"), "0");
    }

    #[test]
    fn test_close_side_and_qty() {
        assert_eq!(close_side_and_qty("0.05"), ("SELL", "0.05".to_string()));
        assert_eq!(close_side_and_qty("-0.05"), ("BUY", "0.05".to_string()));
    }

    #[test]
    fn test_filled_quote_reads_cum_quote() {
        let client = test_client();
        let status = json!({ "status": "FILLED", "cumQuote": "649.95" });
        assert_eq!(client.filled_quote(&status), "649.95");
        assert_eq!(client.filled_quote(&json!({})), "0");
    }
}
