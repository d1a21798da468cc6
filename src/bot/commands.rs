use std::sync::Arc;

use crate::database::ItemStore;
use crate::messages;
use crate::price_fetcher::PriceFetcher;
use crate::utils::error::AppError;
use crate::utils::url::{is_allowed_url, parse_http_url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Add(Option<String>),
    List,
    Remove(Option<String>),
}

impl Command {
    /// Parses `/name[@bot] [arg]`. Unknown commands and plain text yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head);
        let arg = parts.next().map(str::to_string);

        match name {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "add" => Some(Command::Add(arg)),
            "list" => Some(Command::List),
            "rm" => Some(Command::Remove(arg)),
            _ => None,
        }
    }
}

/// Answers chat commands against the item store.
pub struct CommandService {
    store: Arc<dyn ItemStore>,
    fetcher: Arc<dyn PriceFetcher>,
    bot_name: String,
    allowed_url_prefixes: Vec<String>,
}

impl CommandService {
    pub fn new(
        store: Arc<dyn ItemStore>,
        fetcher: Arc<dyn PriceFetcher>,
        bot_name: impl Into<String>,
        allowed_url_prefixes: Vec<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            bot_name: bot_name.into(),
            allowed_url_prefixes,
        }
    }

    /// Reply text for `command` sent by `user_id`.
    pub async fn handle(&self, user_id: i64, command: Command) -> String {
        match command {
            Command::Start | Command::Help => messages::help(&self.bot_name),
            Command::Add(url) => self.add(user_id, url.as_deref()).await,
            Command::List => self.list(user_id).await,
            Command::Remove(arg) => self.remove(user_id, arg.as_deref()).await,
        }
    }

    async fn add(&self, user_id: i64, raw_url: Option<&str>) -> String {
        let Some(url) = raw_url.and_then(parse_http_url) else {
            return messages::NEED_CORRECT_LINK.to_string();
        };
        let url = url.to_string();

        if !is_allowed_url(&url, &self.allowed_url_prefixes) {
            tracing::warn!(user_id, url = %url, "URL is not on the allow list");
            return messages::NEED_CORRECT_LINK.to_string();
        }

        let price = match self.fetcher.fetch(&url).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(user_id, url = %url, "Cannot read price of new item: {}", e);
                return messages::NEED_CORRECT_LINK.to_string();
            }
        };

        match self.store.insert(user_id, &url, price).await {
            Ok(()) => {
                tracing::info!(user_id, url = %url, price, "Item added");
                messages::ADDED_SUCCESSFULLY.to_string()
            }
            Err(AppError::AlreadyTracked { .. }) => messages::ALREADY_TRACKED.to_string(),
            Err(e) => {
                tracing::error!(user_id, url = %url, "Failed to store item: {}", e);
                messages::INTERNAL_ERROR.to_string()
            }
        }
    }

    async fn list(&self, user_id: i64) -> String {
        match self.store.get_for_user(user_id).await {
            Ok(items) if items.is_empty() => messages::EMPTY_LIST.to_string(),
            Ok(items) => messages::item_list(items.iter().map(|item| item.item_url.as_str())),
            Err(e) => {
                tracing::error!(user_id, "Failed to list items: {}", e);
                messages::INTERNAL_ERROR.to_string()
            }
        }
    }

    async fn remove(&self, user_id: i64, arg: Option<&str>) -> String {
        let Some(position) = arg.and_then(|raw| raw.parse::<usize>().ok()) else {
            return messages::REMOVE_ERROR.to_string();
        };

        let items = match self.store.get_for_user(user_id).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(user_id, "Failed to list items: {}", e);
                return messages::INTERNAL_ERROR.to_string();
            }
        };

        let Some(item) = position.checked_sub(1).and_then(|index| items.get(index)) else {
            return messages::REMOVE_ERROR.to_string();
        };

        match self.store.delete(user_id, &item.item_url).await {
            Ok(()) => {
                tracing::info!(user_id, url = %item.item_url, "Item removed");
                messages::REMOVED.to_string()
            }
            Err(AppError::NotFound { .. }) => messages::REMOVE_ERROR.to_string(),
            Err(e) => {
                tracing::error!(user_id, url = %item.item_url, "Failed to delete item: {}", e);
                messages::INTERNAL_ERROR.to_string()
            }
        }
    }
}
