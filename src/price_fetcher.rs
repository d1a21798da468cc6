use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::utils::error::{AppError, Result};

/// Optional sign, optional integer part with a decimal comma or dot, digits.
const PRICE_PATTERN: &str = r"[+-]?([0-9]*[.,])?[0-9]+";

/// Resolves the current price of a page.
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<f64>;
}

/// Pulls a price out of an HTML document using an ordered selector chain.
#[derive(Debug, Clone)]
pub struct PriceExtractor {
    selectors: Vec<Selector>,
    number: Regex,
}

impl PriceExtractor {
    pub fn new(css_selectors: &[String]) -> Result<Self> {
        let selectors = css_selectors
            .iter()
            .map(|raw| {
                Selector::parse(raw).map_err(|e| AppError::Parse {
                    message: format!("invalid CSS selector '{}': {}", raw, e),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let number = Regex::new(PRICE_PATTERN).map_err(|e| AppError::Parse {
            message: e.to_string(),
        })?;

        Ok(Self { selectors, number })
    }

    /// Text of the first selector that matches something non-empty.
    ///
    /// Within one selector the first element with non-empty text is used.
    pub fn select_text(&self, document: &Html) -> Option<String> {
        self.selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .map(|element| element.text().collect::<String>().trim().to_string())
                .find(|text| !text.is_empty())
        })
    }

    pub fn extract(&self, url: &str, html: &str) -> Result<f64> {
        let document = Html::parse_document(html);

        let text = self
            .select_text(&document)
            .ok_or_else(|| AppError::PriceNotFound {
                url: url.to_string(),
            })?;

        let text = join_digit_groups(&text);
        let raw = self
            .number
            .find(&text)
            .map(|m| m.as_str())
            .ok_or_else(|| AppError::PriceNotFound {
                url: url.to_string(),
            })?;

        parse_price(raw)
    }
}

/// Drops whitespace between digits, so `1 299 ₽` reads as `1299 ₽`.
///
/// Covers the no-break and narrow no-break spaces shops use for grouping.
pub fn join_digit_groups(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut joined = String::with_capacity(text.len());

    for (index, c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            let after_digit = joined.chars().last().map_or(false, |p| p.is_ascii_digit());
            let before_digit = chars[index + 1..]
                .iter()
                .find(|n| !n.is_whitespace())
                .map_or(false, |n| n.is_ascii_digit());
            if after_digit && before_digit {
                continue;
            }
        }
        joined.push(*c);
    }

    joined
}

/// Rewrites a decimal comma as a dot. Dot-decimal input is returned as is.
pub fn normalize_decimal(raw: &str) -> String {
    raw.replace(',', ".")
}

pub fn parse_price(raw: &str) -> Result<f64> {
    let normalized = normalize_decimal(raw.trim());
    normalized.parse::<f64>().map_err(|e| AppError::Parse {
        message: format!("'{}' is not a price: {}", normalized, e),
    })
}

/// Fetches pages over HTTP with a fresh cookie jar per request.
pub struct HttpPriceFetcher {
    extractor: PriceExtractor,
    timeout: Duration,
    user_agent: String,
}

impl HttpPriceFetcher {
    pub fn new(extractor: PriceExtractor, timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            extractor,
            timeout,
            user_agent: user_agent.into(),
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        let extractor = PriceExtractor::new(&config.css_selectors)?;
        Ok(Self::new(extractor, config.fetch_timeout(), config.user_agent.clone()))
    }

    fn client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()?;
        Ok(client)
    }
}

#[async_trait]
impl PriceFetcher for HttpPriceFetcher {
    async fn fetch(&self, url: &str) -> Result<f64> {
        let response = self.client()?.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::UnexpectedStatus {
                expected: StatusCode::OK.as_u16(),
                actual: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let price = self.extractor.extract(url, &body)?;
        tracing::debug!(url, price, "Price extracted");
        Ok(price)
    }
}
