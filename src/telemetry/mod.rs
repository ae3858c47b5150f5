//! Telemetry module
//!
//! Structured logging to stdout and an optional log file. Logs are the
//! only user-visible output channel of the bot.

mod logging;

pub use logging::init_logging;

use crate::config::LoggingConfig;

/// Initialize the logging subsystem from configuration
pub fn init_telemetry(config: &LoggingConfig) -> anyhow::Result<()> {
    init_logging(&config.level, config.file.as_deref())
}
