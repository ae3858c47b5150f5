//! volume-bot: matched buy/sell market-order volume generation for
//! crypto derivatives exchanges
//!
//! This library provides the core components for:
//! - The volume-generation execution loop with decimal-safe accounting
//! - An exchange-agnostic adapter contract (Bybit v5, Binance futures)
//! - Startup-time adapter registry keyed by exchange name
//! - TOML configuration with environment-variable substitution
//! - Operational CLI commands sharing the same exchange contract

pub mod cli;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod telemetry;
