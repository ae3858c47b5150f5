//! Run command implementation

use crate::config::AppConfig;
use crate::engine::{EngineSettings, VolumeEngine};
use crate::exchange::AdapterRegistry;
use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Force dry-run mode regardless of the configuration
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let registry = AdapterRegistry::builtin();
        let exchange = registry.build(&config.bot.exchange, config)?;
        tracing::info!(
            exchange = %config.bot.exchange,
            testnet = exchange.is_testnet(),
            "Exchange adapter ready"
        );

        let mut settings = EngineSettings::from(&config.bot);
        if self.dry_run {
            settings.dry_run = true;
        }

        let mut engine = VolumeEngine::new(exchange, settings)?;
        engine.run().await;
        Ok(())
    }
}
