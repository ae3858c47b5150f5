//! Operational commands: balance inspection, order cleanup, position
//! close. These call the same exchange contract as the loop, but
//! directly, without going through the engine.

use crate::config::AppConfig;
use crate::engine::parse_balance;
use crate::exchange::{AdapterRegistry, BybitClient, ExchangeAdapter};
use std::sync::Arc;

fn adapter(config: &AppConfig) -> anyhow::Result<Arc<dyn ExchangeAdapter>> {
    Ok(AdapterRegistry::builtin().build(&config.bot.exchange, config)?)
}

/// Dump raw wallet balances. Bybit only; the endpoint has no
/// cross-exchange counterpart in the adapter contract.
pub async fn balances(config: &AppConfig) -> anyhow::Result<()> {
    let client = BybitClient::from_config(config)?;
    let data = client.wallet_balances(&config.bot.account_type).await?;
    tracing::info!(balances = %data, "Wallet balances");
    Ok(())
}

/// Cancel all open orders for the configured symbol.
pub async fn cancel_all(config: &AppConfig) -> anyhow::Result<()> {
    let exchange = adapter(config)?;
    let result = exchange
        .cancel_all_orders(Some(&config.bot.symbol), &config.bot.category)
        .await?;
    tracing::info!(result = %result, "Cancel all orders result");
    Ok(())
}

/// List open orders for the configured symbol.
pub async fn open_orders(config: &AppConfig) -> anyhow::Result<()> {
    let exchange = adapter(config)?;
    let result = exchange
        .list_open_orders(Some(&config.bot.symbol), &config.bot.category)
        .await?;
    tracing::info!(orders = %result, "Open orders");
    Ok(())
}

/// Close the open position for the configured symbol with a
/// reduce-only market order. A flat position is a no-op.
pub async fn close_position(config: &AppConfig) -> anyhow::Result<()> {
    let exchange = adapter(config)?;
    let size = exchange
        .position_size(&config.bot.symbol, &config.bot.category)
        .await?;
    if is_flat(&size) {
        tracing::info!(symbol = %config.bot.symbol, "No open position");
        return Ok(());
    }
    let result = exchange
        .close_position(&config.bot.symbol, &config.bot.category, &size)
        .await?;
    tracing::info!(result = %result, "Close position result");
    Ok(())
}

/// Cancel all orders, then close the position.
pub async fn close_all(config: &AppConfig) -> anyhow::Result<()> {
    cancel_all(config).await?;
    close_position(config).await
}

/// An empty or zero-valued size means no position. An unparseable size
/// is passed through to the exchange rather than silently skipped.
fn is_flat(size: &str) -> bool {
    parse_balance(size).map(|d| d.is_zero()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_flat() {
        assert!(is_flat("0"));
        assert!(is_flat("0.0"));
        assert!(is_flat("0.000"));
        assert!(is_flat(""));
        assert!(!is_flat("0.05"));
        assert!(!is_flat("-0.05"));
        // Unparseable sizes are not treated as flat
        assert!(!is_flat("garbage"));
    }
}
