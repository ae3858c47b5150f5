use clap::Parser;
use volume_bot::cli::{self, Cli, Commands};
use volume_bot::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Configuration problems are fatal before any trading starts
    let config = AppConfig::load(&cli.config)?;

    volume_bot::telemetry::init_telemetry(&config.logging)?;

    tracing::info!(
        exchange = %config.bot.exchange,
        symbol = %config.bot.symbol,
        testnet = config.bot.testnet,
        "Loaded configuration"
    );

    match cli.command {
        Commands::Run(args) => args.execute(&config).await?,
        Commands::Balances => cli::balances(&config).await?,
        Commands::CancelAll => cli::cancel_all(&config).await?,
        Commands::OpenOrders => cli::open_orders(&config).await?,
        Commands::ClosePosition => cli::close_position(&config).await?,
        Commands::CloseAll => cli::close_all(&config).await?,
    }

    Ok(())
}
