//! CLI interface for volume-bot
//!
//! Provides subcommands for:
//! - `run`: Start the volume-generation loop
//! - `balances`: Show wallet balances (Bybit only)
//! - `cancel-all`: Cancel all open orders for the configured symbol
//! - `open-orders`: List open orders
//! - `close-position`: Close the open position for the symbol
//! - `close-all`: Cancel orders, then close the position

mod run;
mod tools;

pub use run::RunArgs;
pub use tools::{balances, cancel_all, close_all, close_position, open_orders};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "volume-bot")]
#[command(about = "Matched buy/sell market-order volume generation bot")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the volume-generation loop
    Run(RunArgs),
    /// Show wallet balances (Bybit only)
    Balances,
    /// Cancel all open orders for the configured symbol
    CancelAll,
    /// List open orders
    OpenOrders,
    /// Close the open position for the configured symbol
    ClosePosition,
    /// Cancel all orders and close the position
    CloseAll,
}
