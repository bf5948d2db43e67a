//! SQLite backend.
//!
//! Uses a single SQLite database file with one `documents` table keyed by
//! `(collection, key)`. Document bodies are stored as JSON text.

use async_trait::async_trait;
use chrono::Utc;
use pickroute_core::error::StoreError;
use pickroute_core::store::{Collection, DocumentStore};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed document store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a connection URL or file path.
    ///
    /// The database and table are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite document store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection  TEXT NOT NULL,
                key         TEXT NOT NULL,
                body        TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (collection, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("documents table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn parse_body(collection: Collection, key: &str, body: &str) -> Result<Value, StoreError> {
        serde_json::from_str(body).map_err(|e| StoreError::Malformed {
            collection: collection.as_str().into(),
            key: key.into(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND key = ?")
            .bind(collection.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get {collection}/{key}: {e}")))?;

        match row {
            Some(row) => {
                let body: String = row
                    .try_get("body")
                    .map_err(|e| StoreError::QueryFailed(format!("body column: {e}")))?;
                Self::parse_body(collection, key, &body).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        collection: Collection,
        key: &str,
        document: Value,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(&document)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize document: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, key, body, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (collection, key)
            DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(body)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("put {collection}/{key}: {e}")))?;

        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND key = ?")
            .bind(collection.as_str())
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("delete {collection}/{key}: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query("SELECT key, body FROM documents WHERE collection = ? ORDER BY key")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("list {collection}: {e}")))?;

        rows.iter()
            .map(|row| {
                let key: String = row
                    .try_get("key")
                    .map_err(|e| StoreError::QueryFailed(format!("key column: {e}")))?;
                let body: String = row
                    .try_get("body")
                    .map_err(|e| StoreError::QueryFailed(format!("body column: {e}")))?;
                Self::parse_body(collection, &key, &body)
            })
            .collect()
    }
}
