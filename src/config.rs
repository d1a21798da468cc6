use config::{Config, Environment, File};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::utils::error::{AppError, Result};
use crate::utils::url::parse_http_url;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub bot: BotConfig,
    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[serde(default)]
    #[validate(nested)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BotConfig {
    #[validate(length(min = 1, message = "bot token must be set"))]
    pub token: String,
    pub name: String,
    pub api_url: String,
    /// Seconds a single `getUpdates` call may wait for new messages.
    pub long_poll_timeout: u64,
    #[validate(range(min = 1))]
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub url: String,
    #[validate(range(min = 1))]
    pub max_connections: u32,
    pub min_connections: u32,
    #[validate(range(min = 1))]
    pub acquire_timeout: u64,
    #[validate(range(min = 1))]
    pub operation_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrackerConfig {
    /// Seconds between the starts of two tracking cycles.
    #[validate(range(min = 1))]
    pub poll_interval: u64,
    #[validate(range(min = 1))]
    pub fetch_timeout: u64,
    pub pacing_delay_ms: u64,
    #[validate(range(min = 1, max = 64))]
    pub max_concurrent_fetches: usize,
    #[validate(length(min = 1, message = "at least one CSS selector is required"))]
    pub css_selectors: Vec<String>,
    #[validate(length(min = 1))]
    pub currency: String,
    pub allowed_url_prefixes: Vec<String>,
    #[validate(length(min = 1))]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for daily rolling log files. Stdout only when unset.
    pub directory: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            name: "Price Watch".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            long_poll_timeout: 15,
            request_timeout: 15,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/pricewatch.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: 30,
            operation_timeout: 15,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: 3600,
            fetch_timeout: 10,
            pacing_delay_ms: 1000,
            max_concurrent_fetches: 1,
            css_selectors: Vec::new(),
            currency: "RUB".to_string(),
            allowed_url_prefixes: Vec::new(),
            user_agent: concat!("pricewatch-bot/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

impl DatabaseConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout)
    }
}

impl AppConfig {
    /// Layers `default`, `$RUN_MODE` and `local` files from `config_dir`, then
    /// `PRICEWATCH__*` environment variables.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::from(config_dir.join("default")).required(false))
            .add_source(File::from(config_dir.join(&run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::from(config_dir.join("local")).required(false))
            .add_source(
                Environment::with_prefix("PRICEWATCH")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("tracker.css_selectors")
                    .with_list_parse_key("tracker.allowed_url_prefixes"),
            )
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate_all()?;
        Ok(config)
    }

    /// Field-level rules plus the checks the derive rules cannot express.
    pub fn validate_all(&self) -> Result<()> {
        self.validate()?;

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::Validation(
                "database min_connections cannot exceed max_connections".into(),
            ));
        }

        for selector in &self.tracker.css_selectors {
            Selector::parse(selector).map_err(|e| {
                AppError::Validation(format!("invalid CSS selector '{}': {:?}", selector, e))
            })?;
        }

        for prefix in &self.tracker.allowed_url_prefixes {
            if parse_http_url(prefix).is_none() {
                return Err(AppError::Validation(format!(
                    "allowed URL prefix '{}' is not an absolute http(s) URL",
                    prefix
                )));
            }
        }

        if parse_http_url(&self.bot.api_url).is_none() {
            return Err(AppError::Validation("invalid bot api_url".into()));
        }

        Ok(())
    }
}
