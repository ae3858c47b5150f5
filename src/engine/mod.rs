//! Execution engine
//!
//! Drives the volume-generation loop: limit check, price/balance
//! lookup, buy, fill wait, sell, fill wait, volume accounting, pacing
//! delay. Strictly sequential; one cycle runs to completion before the
//! next begins, and no error inside a cycle terminates the process.

mod accounting;

pub use accounting::{
    cycle_volume, parse_balance, parse_decimal, required_notional, round_trip_notional,
    ValidationError,
};

use crate::config::BotConfig;
use crate::exchange::{AdapterError, ExchangeAdapter, OrderRequest, OrderStatus, Side};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Fill-confirmation polls per leg before the cycle is abandoned.
/// Overridable through `fill_poll_attempts` in the bot configuration.
pub const DEFAULT_FILL_POLL_ATTEMPTS: u32 = 5;

/// Failures inside a single cycle; caught at the iteration boundary,
/// never fatal.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Pure configuration values the engine runs on. The engine never reads
/// config files or environment variables itself.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub symbol: String,
    pub category: String,
    pub order_qty: String,
    pub interval_sec: u64,
    pub fill_delay_ms: u64,
    pub max_volume_usdt: String,
    pub account_type: String,
    pub dry_run: bool,
    pub dry_run_accrues: bool,
    pub fill_poll_attempts: u32,
}

impl From<&BotConfig> for EngineSettings {
    fn from(config: &BotConfig) -> Self {
        Self {
            symbol: config.symbol.clone(),
            category: config.category.clone(),
            order_qty: config.order_qty.clone(),
            interval_sec: config.interval_sec,
            fill_delay_ms: config.fill_delay_ms,
            max_volume_usdt: config.max_volume_usdt.clone(),
            account_type: config.account_type.clone(),
            dry_run: config.dry_run,
            dry_run_accrues: config.dry_run_accrues,
            fill_poll_attempts: config.fill_poll_attempts,
        }
    }
}

/// How a cycle ended. Abstain and abandonment are control flow,
/// not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Both legs confirmed filled, volume accrued
    Accrued,
    /// Dry-run: intended orders logged, nothing placed
    Simulated,
    /// Insufficient balance, no order placed
    Abstained,
    /// A leg was not accepted or not confirmed filled
    Abandoned,
}

/// The volume-generation loop around one exchange adapter.
///
/// Holds the cumulative volume total for the process lifetime; a
/// restart resets it to zero, which is accepted.
pub struct VolumeEngine {
    exchange: Arc<dyn ExchangeAdapter>,
    settings: EngineSettings,
    max_volume: Decimal,
    total_volume: Decimal,
}

impl VolumeEngine {
    /// Create an engine from an already-built adapter and settings.
    /// Fails only on a malformed volume ceiling, before the loop starts.
    pub fn new(
        exchange: Arc<dyn ExchangeAdapter>,
        settings: EngineSettings,
    ) -> Result<Self, ValidationError> {
        let max_volume = parse_decimal(&settings.max_volume_usdt)?;
        Ok(Self {
            exchange,
            settings,
            max_volume,
            total_volume: Decimal::ZERO,
        })
    }

    /// Cumulative volume in USDT, monotonically non-decreasing.
    pub fn total_volume(&self) -> Decimal {
        self.total_volume
    }

    /// Whether the configured ceiling has been reached. A ceiling of
    /// zero disables the limit.
    pub fn limit_reached(&self) -> bool {
        self.max_volume > Decimal::ZERO && self.total_volume >= self.max_volume
    }

    /// Run cycles until the volume ceiling is reached. Errors inside a
    /// cycle are logged and absorbed; the pacing delay applies to every
    /// branch.
    pub async fn run(&mut self) {
        tracing::info!(
            symbol = %self.settings.symbol,
            qty = %self.settings.order_qty,
            dry_run = self.settings.dry_run,
            "Starting volume engine"
        );
        loop {
            if self.limit_reached() {
                tracing::info!(
                    total = %self.total_volume,
                    limit = %self.max_volume,
                    "Reached max volume in USDT, stopping"
                );
                break;
            }

            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Cycle error");
            }

            tokio::time::sleep(Duration::from_secs(self.settings.interval_sec)).await;
        }
    }

    /// One buy-then-sell attempt, without the pacing delay.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, EngineError> {
        let settings = self.settings.clone();

        let last_price = self
            .exchange
            .last_price(&settings.symbol, &settings.category)
            .await?;
        let available = self.available_usdt().await?;
        let required = required_notional(&settings.order_qty, &last_price)?;
        if available < required {
            tracing::warn!(
                available = %available,
                required = %required,
                "Insufficient USDT for the cycle, abstaining"
            );
            return Ok(CycleOutcome::Abstained);
        }

        let buy = OrderRequest::market(
            &settings.category,
            &settings.symbol,
            Side::Buy,
            &settings.order_qty,
            false,
        );
        let sell = OrderRequest::market(
            &settings.category,
            &settings.symbol,
            Side::Sell,
            &settings.order_qty,
            true,
        );

        if settings.dry_run {
            return self.simulate_cycle(&buy, &sell, &last_price);
        }

        tracing::info!("Placing BUY order");
        let buy_response = self.exchange.place_order(&buy).await?;
        tracing::debug!(response = %buy_response, "BUY response");
        let buy_order_id = extract_order_id(&buy_response);
        if buy_order_id.is_empty() {
            tracing::warn!("BUY not accepted, skipping SELL");
            return Ok(CycleOutcome::Abandoned);
        }
        let Some(buy_status) = self.wait_filled(&buy_order_id).await? else {
            tracing::warn!(order_id = %buy_order_id, "BUY not filled, skipping SELL");
            return Ok(CycleOutcome::Abandoned);
        };

        // Let the buy settle before the opposite leg
        self.fill_delay().await;

        tracing::info!("Placing SELL order");
        let sell_response = self.exchange.place_order(&sell).await?;
        tracing::debug!(response = %sell_response, "SELL response");
        let sell_order_id = extract_order_id(&sell_response);
        if sell_order_id.is_empty() {
            tracing::warn!("SELL not accepted, volume not counted");
            return Ok(CycleOutcome::Abandoned);
        }
        let Some(sell_status) = self.wait_filled(&sell_order_id).await? else {
            tracing::warn!(order_id = %sell_order_id, "SELL not filled, volume not counted");
            return Ok(CycleOutcome::Abandoned);
        };

        let buy_quote = self.exchange.filled_quote(&buy_status);
        let sell_quote = self.exchange.filled_quote(&sell_status);
        let volume = cycle_volume(&buy_quote, &sell_quote, &settings.order_qty, &last_price)?;
        self.total_volume += volume;
        tracing::info!(
            cycle = %volume,
            total = %self.total_volume,
            "Total volume USDT"
        );
        Ok(CycleOutcome::Accrued)
    }

    /// Log the intended orders and the estimated cycle volume without
    /// placing anything. The estimate only advances the total when
    /// `dry_run_accrues` is set.
    fn simulate_cycle(
        &mut self,
        buy: &OrderRequest,
        sell: &OrderRequest,
        last_price: &str,
    ) -> Result<CycleOutcome, EngineError> {
        let estimate = round_trip_notional(&self.settings.order_qty, last_price)?;
        tracing::info!(order = ?buy, "DRY RUN buy");
        tracing::info!(order = ?sell, "DRY RUN sell");
        tracing::info!(estimate = %estimate, "DRY RUN cycle volume USDT");
        if self.settings.dry_run_accrues {
            self.total_volume += estimate;
            tracing::info!(total = %self.total_volume, "Total volume USDT");
        }
        Ok(CycleOutcome::Simulated)
    }

    /// Poll the order status until a fill is confirmed, a terminal
    /// status aborts the wait, or the attempts are exhausted.
    async fn wait_filled(&self, order_id: &str) -> Result<Option<OrderStatus>, EngineError> {
        for _ in 0..self.settings.fill_poll_attempts {
            let status = self
                .exchange
                .order_status(&self.settings.symbol, order_id)
                .await?;
            match normalize_status(&status).as_str() {
                "FILLED" | "PARTIALLY_FILLED" => return Ok(Some(status)),
                "CANCELED" | "REJECTED" | "EXPIRED" => return Ok(None),
                _ => self.fill_delay().await,
            }
        }
        Ok(None)
    }

    /// Available USDT, with an empty or absent balance normalized to
    /// zero rather than treated as unknown.
    async fn available_usdt(&self) -> Result<Decimal, EngineError> {
        let raw = self
            .exchange
            .available_balance(&self.settings.account_type, "USDT")
            .await?;
        if raw.trim().is_empty() {
            tracing::warn!("USDT balance not reported, treating as zero");
        }
        Ok(parse_balance(&raw)?)
    }

    async fn fill_delay(&self) {
        tokio::time::sleep(Duration::from_millis(self.settings.fill_delay_ms)).await;
    }
}

/// Extract the order identifier from a placement response, tolerating
/// both the nested (`result.orderId`) and flat (`orderId`) shapes.
/// Returns "" when neither is present, meaning the order was not placed.
pub fn extract_order_id(response: &Value) -> String {
    if let Some(result) = response.get("result") {
        if result.is_object() {
            let id = value_string(result.get("orderId"));
            if !id.is_empty() {
                return id;
            }
        }
    }
    value_string(response.get("orderId"))
}

/// Map an exchange status payload onto the normalized status set:
/// FILLED, PARTIALLY_FILLED, CANCELED, REJECTED, EXPIRED, or the raw
/// uppercased value for anything else (treated as "keep polling").
pub fn normalize_status(status: &Value) -> String {
    let raw = {
        let order_status = value_string(status.get("orderStatus"));
        if order_status.is_empty() {
            value_string(status.get("status"))
        } else {
            order_status
        }
    };
    let upper = raw.to_uppercase();
    match upper.as_str() {
        // Bybit spells these PartiallyFilled / Cancelled
        "PARTIALLYFILLED" => "PARTIALLY_FILLED".to_string(),
        "CANCELLED" => "CANCELED".to_string(),
        _ => upper,
    }
}

fn value_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
