pub mod bot;
pub mod config;
pub mod database;
pub mod messages;
pub mod models;
pub mod notifier;
pub mod price_fetcher;
pub mod telegram;
pub mod tracker;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use tracker::{CycleReport, PriceTracker, TrackerState};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
