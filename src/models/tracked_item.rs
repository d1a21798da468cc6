use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A `(user, URL)` pair with the last price seen for it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TrackedItem {
    pub user_id: i64,
    pub item_url: String,
    pub last_known_price: f64,
    pub created_at: DateTime<Utc>,
}

impl TrackedItem {
    pub fn new(user_id: i64, item_url: impl Into<String>, price: f64) -> Self {
        Self {
            user_id,
            item_url: item_url.into(),
            last_known_price: price,
            created_at: Utc::now(),
        }
    }

    /// 1-based position of `item_url` in a user's ordered list, 0 when absent.
    pub fn position_in(items: &[TrackedItem], item_url: &str) -> usize {
        items
            .iter()
            .position(|item| item.item_url == item_url)
            .map(|index| index + 1)
            .unwrap_or(0)
    }
}
