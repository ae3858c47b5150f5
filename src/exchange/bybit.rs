//! Bybit v5 REST client
//!
//! Signs private requests with HMAC-SHA256 over
//! `timestamp + api_key + recv_window + payload`, where payload is the
//! compact JSON body for POST and the urlencoded query for GET.

use super::{field_str, AdapterError, ExchangeAdapter, OrderRequest, OrderResponse, OrderStatus};
use crate::config::{AppConfig, ConfigError};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const MAINNET_URL: &str = "https://api.bybit.com";
const TESTNET_URL: &str = "https://api-testnet.bybit.com";

/// A stalled request must never block the loop indefinitely
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bybit v5 client for the linear (USDT perpetual) category
pub struct BybitClient {
    client: Client,
    api_key: String,
    api_secret: String,
    recv_window: u64,
    testnet: bool,
    base_url: String,
}

impl BybitClient {
    /// Create a new client for mainnet or testnet
    pub fn new(api_key: &str, api_secret: &str, testnet: bool, recv_window: u64) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        let base_url = if testnet { TESTNET_URL } else { MAINNET_URL };

        Self {
            client,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            recv_window,
            testnet,
            base_url: base_url.to_string(),
        }
    }

    /// Build a client from the resolved configuration, validating that
    /// credentials are present.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        if config.bybit.key.is_empty() || config.bybit.secret.is_empty() {
            return Err(ConfigError::MissingCredentials {
                exchange: "Bybit".to_string(),
            });
        }
        Ok(Self::new(
            &config.bybit.key,
            &config.bybit.secret,
            config.bot.testnet,
            config.bot.recv_window,
        ))
    }

    /// Raw wallet-balance payload for all coins, used by the balances
    /// CLI command.
    pub async fn wallet_balances(&self, account_type: &str) -> Result<Value, AdapterError> {
        self.get_signed(
            "/v5/account/wallet-balance",
            &[("accountType", account_type)],
        )
        .await
    }

    fn sign(&self, timestamp: &str, payload: &str) -> Result<String, AdapterError> {
        let message = format!("{}{}{}{}", timestamp, self.api_key, self.recv_window, payload);
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| AdapterError::Signing(e.to_string()))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<Value, AdapterError> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let body = serde_json::to_string(payload)
            .map_err(|e| AdapterError::Api(format!("Failed to encode payload: {}", e)))?;
        let signature = self.sign(&timestamp, &body)?;

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-SIGN-TYPE", "2")
            .header("X-BAPI-TIMESTAMP", timestamp)
            .header("X-BAPI-RECV-WINDOW", self.recv_window.to_string())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn get_public(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, AdapterError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(params).send().await?;
        self.handle_response(response).await
    }

    async fn get_signed(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, AdapterError> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        // The signed string and the sent query must match byte for byte
        let query = encode_query(params);
        let signature = self.sign(&timestamp, &query)?;

        let url = format!("{}{}?{}", self.base_url, path, query);
        let response = self
            .client
            .get(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-SIGN-TYPE", "2")
            .header("X-BAPI-TIMESTAMP", timestamp)
            .header("X-BAPI-RECV-WINDOW", self.recv_window.to_string())
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Value, AdapterError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %text, "Bybit HTTP error");
            return Err(AdapterError::Api(format!(
                "Bybit HTTP error {}: {}",
                status, text
            )));
        }

        let data: Value = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(_) => {
                tracing::error!(body = %text, "Bybit response is not JSON");
                return Ok(Value::Object(Default::default()));
            }
        };

        // Non-zero retCode is surfaced in logs; the caller detects the
        // failure through the missing result fields
        let ret_code = data.get("retCode").and_then(Value::as_i64).unwrap_or(0);
        if ret_code != 0 {
            let ret_msg = field_str(&data, "retMsg", "");
            tracing::error!(ret_code, ret_msg = %ret_msg, "Bybit API error");
        }

        Ok(data)
    }
}

#[async_trait]
impl ExchangeAdapter for BybitClient {
    fn is_testnet(&self) -> bool {
        self.testnet
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, AdapterError> {
        let payload = serde_json::to_value(order)
            .map_err(|e| AdapterError::Api(format!("Failed to encode order: {}", e)))?;
        self.post("/v5/order/create", &payload).await
    }

    async fn last_price(&self, symbol: &str, category: &str) -> Result<String, AdapterError> {
        let data = self
            .get_public(
                "/v5/market/tickers",
                &[("category", category), ("symbol", symbol)],
            )
            .await?;
        parse_last_price(&data)
    }

    async fn available_balance(
        &self,
        account_type: &str,
        coin: &str,
    ) -> Result<String, AdapterError> {
        let data = self
            .get_signed(
                "/v5/account/wallet-balance",
                &[("accountType", account_type), ("coin", coin)],
            )
            .await?;
        parse_available_balance(&data, coin)
    }

    async fn order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderStatus, AdapterError> {
        let data = self
            .get_signed(
                "/v5/order/realtime",
                &[
                    ("category", "linear"),
                    ("symbol", symbol),
                    ("orderId", order_id),
                ],
            )
            .await?;
        first_list_item(&data).ok_or(AdapterError::MissingField("order status list"))
    }

    fn filled_quote(&self, status: &OrderStatus) -> String {
        field_str(status, "cumExecValue", "0")
    }

    async fn cancel_all_orders(
        &self,
        symbol: Option<&str>,
        category: &str,
    ) -> Result<Value, AdapterError> {
        let mut payload = serde_json::json!({ "category": category });
        if let Some(symbol) = symbol {
            payload["symbol"] = Value::String(symbol.to_string());
        }
        self.post("/v5/order/cancel-all", &payload).await
    }

    async fn list_open_orders(
        &self,
        symbol: Option<&str>,
        category: &str,
    ) -> Result<Value, AdapterError> {
        let mut params = vec![("category", category)];
        if let Some(symbol) = symbol {
            params.push(("symbol", symbol));
        }
        self.get_signed("/v5/order/realtime", &params).await
    }

    async fn position_size(&self, symbol: &str, category: &str) -> Result<String, AdapterError> {
        let data = self
            .get_signed(
                "/v5/position/list",
                &[("category", category), ("symbol", symbol)],
            )
            .await?;
        Ok(match first_list_item(&data) {
            Some(position) => field_str(&position, "size", "0"),
            None => "0".to_string(),
        })
    }

    async fn close_position(
        &self,
        symbol: &str,
        category: &str,
        size: &str,
    ) -> Result<Value, AdapterError> {
        let payload = serde_json::json!({
            "category": category,
            "symbol": symbol,
            "side": "Sell",
            "orderType": "Market",
            "qty": size,
            "reduceOnly": true,
        });
        self.post("/v5/order/create", &payload).await
    }
}

/// Percent-free query encoding; Bybit v5 parameter values are plain
/// alphanumerics so no escaping is needed.
fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn first_list_item(data: &Value) -> Option<Value> {
    data.get("result")?.get("list")?.get(0).cloned()
}

fn parse_last_price(data: &Value) -> Result<String, AdapterError> {
    let ticker = first_list_item(data).ok_or(AdapterError::MissingField("ticker list"))?;
    let last_price = field_str(&ticker, "lastPrice", "");
    if last_price.is_empty() {
        return Err(AdapterError::MissingField("lastPrice"));
    }
    Ok(last_price)
}

/// Walk the per-coin balance entry preferring the most conservative
/// figure: availableToWithdraw, then walletBalance, then equity.
fn parse_available_balance(data: &Value, coin: &str) -> Result<String, AdapterError> {
    let account = first_list_item(data).ok_or(AdapterError::MissingField("wallet balance list"))?;
    let coins = account
        .get("coin")
        .and_then(Value::as_array)
        .ok_or(AdapterError::MissingField("coin list"))?;

    for item in coins {
        if field_str(item, "coin", "") != coin {
            continue;
        }
        for key in ["availableToWithdraw", "walletBalance", "equity"] {
            let value = field_str(item, key, "");
            if !value.is_empty() {
                return Ok(value);
            }
        }
        return Ok("0".to_string());
    }
    Err(AdapterError::MissingField("coin balance"))
}
