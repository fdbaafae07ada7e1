use anyhow::Context;
use async_trait::async_trait;
use sqlx::SqlitePool;

use stock_service::TrackedSymbols;

/// Tracked symbols read from the dashboard's holdings and watchlist tables.
pub struct SqlTrackedSymbols {
    pool: SqlitePool,
}

impl SqlTrackedSymbols {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Make sure both tables exist so a fresh database yields an empty set.
    pub async fn init_tables(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS holdings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                shares REAL NOT NULL DEFAULT 0,
                cost_basis REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create holdings table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS watchlist (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                added_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create watchlist table")?;

        Ok(())
    }
}

#[async_trait]
impl TrackedSymbols for SqlTrackedSymbols {
    async fn tracked_symbols(&self) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT symbol FROM holdings UNION SELECT symbol FROM watchlist ORDER BY symbol",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tracked symbols")?;

        Ok(rows.into_iter().map(|(symbol,)| symbol).collect())
    }
}
