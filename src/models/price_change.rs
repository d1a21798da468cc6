use serde::{Deserialize, Serialize};

use crate::messages;
use crate::models::{ChangeType, TrackedItem};

/// Price read from an item's page during one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub item_url: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDelta {
    pub user_id: i64,
    pub item_url: String,
    pub old_price: f64,
    pub new_price: f64,
}

impl PriceDelta {
    /// `None` when the observed price equals the stored one.
    pub fn detect(item: &TrackedItem, observation: &PriceObservation) -> Option<Self> {
        if observation.price == item.last_known_price {
            return None;
        }

        Some(Self {
            user_id: item.user_id,
            item_url: item.item_url.clone(),
            old_price: item.last_known_price,
            new_price: observation.price,
        })
    }

    pub fn change_type(&self) -> ChangeType {
        ChangeType::between(self.old_price, self.new_price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub recipient_user_id: i64,
    pub rendered_message: String,
}

impl NotificationEvent {
    pub fn price_changed(delta: &PriceDelta, position: usize, currency: &str) -> Self {
        Self {
            recipient_user_id: delta.user_id,
            rendered_message: messages::price_changed(
                &delta.item_url,
                position,
                delta.old_price,
                delta.new_price,
                currency,
            ),
        }
    }
}
