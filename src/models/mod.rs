use serde::{Deserialize, Serialize};

pub mod price_change;
pub mod tracked_item;

// Re-exports for convenience
pub use price_change::*;
pub use tracked_item::*;

/// Direction of a price movement between two observations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Increased,
    Decreased,
    Unchanged,
}

impl ChangeType {
    pub fn between(old_price: f64, new_price: f64) -> Self {
        if new_price > old_price {
            ChangeType::Increased
        } else if new_price < old_price {
            ChangeType::Decreased
        } else {
            ChangeType::Unchanged
        }
    }
}
