// Integration tests for pricewatch-bot
// These tests run the real store, fetcher and Telegram client against
// an in-memory database and local mock HTTP servers.

pub mod command_tests;
pub mod fetcher_tests;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use pricewatch_bot::{
    AppConfig,
    config::{BotConfig, DatabaseConfig, LoggingConfig, TrackerConfig},
    database::SqliteItemStore,
    notifier::Notifier,
    price_fetcher::HttpPriceFetcher,
};

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    AppConfig {
        bot: BotConfig {
            token: "42:test-token".to_string(),
            name: "Price Watch Test".to_string(),
            long_poll_timeout: 1,
            request_timeout: 5,
            ..BotConfig::default()
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 10,
            operation_timeout: 5,
        },
        tracker: TrackerConfig {
            poll_interval: 60,
            fetch_timeout: 2,
            pacing_delay_ms: 0,
            max_concurrent_fetches: 2,
            css_selectors: vec![".price-old-layout".to_string(), ".price".to_string()],
            currency: "RUB".to_string(),
            allowed_url_prefixes: Vec::new(),
            user_agent: "pricewatch-bot-test/1.0".to_string(),
        },
        logging: LoggingConfig::default(),
    }
}

pub async fn create_test_store() -> anyhow::Result<Arc<SqliteItemStore>> {
    let config = get_test_config();
    Ok(Arc::new(SqliteItemStore::connect(&config.database).await?))
}

pub fn create_test_fetcher() -> anyhow::Result<Arc<HttpPriceFetcher>> {
    let config = get_test_config();
    Ok(Arc::new(HttpPriceFetcher::from_config(&config.tracker)?))
}

/// Product page with the price in the fallback selector.
pub fn product_page(price: &str) -> String {
    format!(
        r#"<html><body>
            <h1>Test product</h1>
            <span class="price-old-layout"></span>
            <div class="price">{} ₽</div>
        </body></html>"#,
        price
    )
}

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, user_id: i64, text: &str) -> pricewatch_bot::Result<()> {
        self.sent.lock().unwrap().push((user_id, text.to_string()));
        Ok(())
    }
}
