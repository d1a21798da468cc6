use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use pricewatch_bot::bot::{CommandBot, CommandService};
use pricewatch_bot::config::LoggingConfig;
use pricewatch_bot::database::{ItemStore, SqliteItemStore};
use pricewatch_bot::notifier::{LogNotifier, Notifier};
use pricewatch_bot::price_fetcher::{HttpPriceFetcher, PriceFetcher};
use pricewatch_bot::telegram::TelegramClient;
use pricewatch_bot::{AppConfig, PriceTracker};

#[derive(Parser)]
#[command(name = "pricewatch-bot", version, about = "Tracks item prices and reports changes over Telegram")]
struct Cli {
    /// Directory holding default/<RUN_MODE>/local config files
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracking loop and the command bot (default)
    Run,
    /// Run a single tracking cycle and print its report
    CheckOnce {
        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the price extracted from a page
    Fetch { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config_dir)?;
    let _log_guard = init_logging(&config.logging)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::CheckOnce { dry_run } => check_once(config, dry_run).await,
        Commands::Fetch { url } => fetch(config, &url).await,
    }
}

/// Stdout logging, plus a daily rolling file when a directory is configured.
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "pricewatch-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

async fn run(config: AppConfig) -> Result<()> {
    info!("Starting pricewatch-bot...");

    let store: Arc<dyn ItemStore> = Arc::new(SqliteItemStore::connect(&config.database).await?);
    let fetcher: Arc<dyn PriceFetcher> = Arc::new(HttpPriceFetcher::from_config(&config.tracker)?);
    let telegram = TelegramClient::new(&config.bot)?;

    let tracker = PriceTracker::new(
        Arc::clone(&store),
        Arc::clone(&fetcher),
        Arc::new(telegram.clone()),
        config.tracker.clone(),
    );
    let service = CommandService::new(
        store,
        fetcher,
        config.bot.name.clone(),
        config.tracker.allowed_url_prefixes.clone(),
    );
    let bot = CommandBot::new(telegram, service, config.bot.long_poll_timeout);

    let shutdown = CancellationToken::new();
    let tracker_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { tracker.run(shutdown).await }
    });
    let bot_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { bot.run(shutdown).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    shutdown.cancel();

    let (tracker_result, bot_result) = tokio::join!(tracker_task, bot_task);
    tracker_result?;
    bot_result?;

    Ok(())
}

async fn check_once(config: AppConfig, dry_run: bool) -> Result<()> {
    let store = Arc::new(SqliteItemStore::connect(&config.database).await?);
    let fetcher = Arc::new(HttpPriceFetcher::from_config(&config.tracker)?);
    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(LogNotifier)
    } else {
        Arc::new(TelegramClient::new(&config.bot)?)
    };

    let tracker = PriceTracker::new(store, fetcher, notifier, config.tracker.clone());
    let report = tracker.run_cycle(&CancellationToken::new()).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn fetch(config: AppConfig, url: &str) -> Result<()> {
    let fetcher = HttpPriceFetcher::from_config(&config.tracker)?;
    let price = fetcher.fetch(url).await?;

    println!("{:.2} {}", price, config.tracker.currency);
    Ok(())
}
