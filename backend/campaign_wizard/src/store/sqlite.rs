//! SQLite-backed [`KeyValueStore`] with byte-quota accounting.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use super::{entry_size, EntryMeta, KeyValueStore};
use crate::errors::{Result, WizardError};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Every connection to an in-memory database gets its own database.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

pub struct SqliteStore {
    pool: SqlitePool,
    capacity: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, capacity: usize) -> Self {
        Self { pool, capacity }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    /// Quota check and write happen in one transaction.
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let (usage,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv_store",
        )
        .fetch_one(&mut *tx)
        .await?;
        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB)) FROM kv_store WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;

        // Stamps must stay strictly increasing even within one millisecond.
        let (last_stamp,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(updated_at), 0) FROM kv_store")
                .fetch_one(&mut *tx)
                .await?;
        let stamp = Utc::now().timestamp_millis().max(last_stamp + 1);

        let others = (usage - existing.map(|(n,)| n).unwrap_or(0)).max(0) as usize;
        let needed = entry_size(key, value);
        let available = self.capacity.saturating_sub(others);
        if needed > available {
            return Err(WizardError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(stamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<EntryMeta>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT key,
                   LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB)),
                   updated_at
            FROM   kv_store
            ORDER  BY updated_at ASC, key ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(key, bytes, updated_at)| EntryMeta {
                key,
                bytes: bytes.max(0) as usize,
                updated_at,
            })
            .collect())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
