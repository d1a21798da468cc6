use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::models::TrackedItem;
use crate::utils::error::{AppError, Result};

/// Durable storage of tracked items.
///
/// Shared between the tracking loop and the command bot. Every call runs
/// under a deadline; dropping the returned future cancels it.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// All items, grouped by user and ordered by creation within a user.
    async fn get_all(&self) -> Result<Vec<TrackedItem>>;

    /// A user's items ordered by creation time, oldest first.
    async fn get_for_user(&self, user_id: i64) -> Result<Vec<TrackedItem>>;

    async fn insert(&self, user_id: i64, item_url: &str, price: f64) -> Result<()>;

    async fn update_price(&self, user_id: i64, item_url: &str, price: f64) -> Result<()>;

    async fn delete(&self, user_id: i64, item_url: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct SqliteItemStore {
    pool: SqlitePool,
    operation_timeout: Duration,
}

impl SqliteItemStore {
    pub fn new(pool: SqlitePool, operation_timeout: Duration) -> Self {
        Self {
            pool,
            operation_timeout,
        }
    }

    /// Opens (creating if needed) the database and applies migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        let in_memory = config.url.contains(":memory:");
        if !in_memory {
            if let Some(parent) = database_path(&config.url).as_deref().and_then(Path::parent) {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        // Every connection to `:memory:` is a separate database.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(url = %config.url, "Item store ready");

        Ok(Self::new(pool, config.operation_timeout()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn with_deadline<T, F>(&self, operation: &str, query: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.operation_timeout, query).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => Err(AppError::Timeout {
                operation: operation.to_string(),
            }),
        }
    }
}

/// File path of a `sqlite:` URL, without query parameters.
fn database_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn get_all(&self) -> Result<Vec<TrackedItem>> {
        let query = sqlx::query_as::<_, TrackedItem>(
            "SELECT user_id, item_url, last_known_price, created_at FROM items \
             ORDER BY user_id ASC, created_at ASC, id ASC",
        )
        .fetch_all(&self.pool);

        self.with_deadline("get_all", query).await
    }

    async fn get_for_user(&self, user_id: i64) -> Result<Vec<TrackedItem>> {
        let query = sqlx::query_as::<_, TrackedItem>(
            "SELECT user_id, item_url, last_known_price, created_at FROM items \
             WHERE user_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool);

        self.with_deadline("get_for_user", query).await
    }

    async fn insert(&self, user_id: i64, item_url: &str, price: f64) -> Result<()> {
        let query = sqlx::query(
            "INSERT INTO items (user_id, item_url, last_known_price, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(item_url)
        .bind(price)
        .bind(Utc::now())
        .execute(&self.pool);

        match self.with_deadline("insert", query).await {
            Ok(_) => Ok(()),
            Err(AppError::Database(sqlx::Error::Database(db_err))) if db_err.is_unique_violation() => {
                Err(AppError::AlreadyTracked {
                    url: item_url.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn update_price(&self, user_id: i64, item_url: &str, price: f64) -> Result<()> {
        let query = sqlx::query("UPDATE items SET last_known_price = ? WHERE user_id = ? AND item_url = ?")
            .bind(price)
            .bind(user_id)
            .bind(item_url)
            .execute(&self.pool);

        let result = self.with_deadline("update_price", query).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: format!("item {} of user {}", item_url, user_id),
            });
        }
        Ok(())
    }

    async fn delete(&self, user_id: i64, item_url: &str) -> Result<()> {
        let query = sqlx::query("DELETE FROM items WHERE user_id = ? AND item_url = ?")
            .bind(user_id)
            .bind(item_url)
            .execute(&self.pool);

        let result = self.with_deadline("delete", query).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: format!("item {} of user {}", item_url, user_id),
            });
        }
        Ok(())
    }
}
