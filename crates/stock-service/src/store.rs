//! Durable mirror of the quote cache.
//!
//! Records are stored as opaque JSON blobs keyed by canonical symbol. The store
//! only pre-warms the memory cache after a restart; it is never read on the
//! request path.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use market_core::{MarketDataError, QuoteRecord};

#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<QuoteRecord>, MarketDataError>;

    /// Insert or replace every record in one transaction. Returns rows written.
    async fn upsert_many(&self, records: &[QuoteRecord]) -> Result<usize, MarketDataError>;
}

#[derive(Clone)]
pub struct SqliteQuoteStore {
    pool: SqlitePool,
}

fn store_error(e: sqlx::Error) -> MarketDataError {
    MarketDataError::Store(e.to_string())
}

impl SqliteQuoteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database and make sure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self, MarketDataError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(store_error)?;
        let store = Self::new(pool);
        store.init_tables().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_tables(&self) -> Result<(), MarketDataError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS quote_cache (
                symbol TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }
}

#[async_trait]
impl QuoteStore for SqliteQuoteStore {
    async fn load_all(&self) -> Result<Vec<QuoteRecord>, MarketDataError> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT symbol, payload FROM quote_cache")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        let records = rows
            .into_iter()
            .filter_map(|(symbol, payload)| match serde_json::from_str::<QuoteRecord>(&payload) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping undecodable cached quote for {}: {}", symbol, e);
                    None
                }
            })
            .collect();
        Ok(records)
    }

    async fn upsert_many(&self, records: &[QuoteRecord]) -> Result<usize, MarketDataError> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        for record in records {
            let payload = serde_json::to_string(record)
                .map_err(|e| MarketDataError::Store(format!("encode {}: {e}", record.symbol)))?;
            sqlx::query(
                "INSERT INTO quote_cache (symbol, payload, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(symbol) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            )
            .bind(&record.symbol)
            .bind(payload)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }
        tx.commit().await.map_err(store_error)?;
        Ok(records.len())
    }
}
