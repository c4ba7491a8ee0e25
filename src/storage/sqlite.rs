use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use super::{SessionStore, SAVED_GAMES_KEY};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::session::GameSession;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed key-value storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory storage instance (used by tests)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // A second connection would see its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteStorage {
    async fn load_all(&self) -> StorageResult<HashMap<String, GameSession>> {
        let blob: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(SAVED_GAMES_KEY)
            .fetch_optional(&self.pool)
            .await?;

        Ok(parse_store_blob(blob.as_deref()))
    }

    async fn save_one(&self, session: &GameSession) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        let blob: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(SAVED_GAMES_KEY)
            .fetch_optional(&mut *tx)
            .await?;

        let mut games = parse_store_blob(blob.as_deref());
        games.insert(session.id.clone(), session.clone());
        let serialized = serde_json::to_string(&games)?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(SAVED_GAMES_KEY)
        .bind(serialized)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(session_id = %session.id, "Session saved");
        Ok(())
    }

    async fn delete_one(&self, id: &str) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        let blob: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(SAVED_GAMES_KEY)
            .fetch_optional(&mut *tx)
            .await?;

        let mut games = parse_store_blob(blob.as_deref());
        games.remove(id);
        let serialized = serde_json::to_string(&games)?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(SAVED_GAMES_KEY)
        .bind(serialized)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(super::tutorial_key(id))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(session_id = %id, "Session deleted");
        Ok(())
    }

    async fn tutorial_seen(&self, session_id: &str) -> StorageResult<bool> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(super::tutorial_key(session_id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(value.is_some())
    }

    async fn mark_tutorial_seen(&self, session_id: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES (?, 'true')
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(super::tutorial_key(session_id))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Deserialize the saved-games blob, recovering to an empty mapping when
/// it is absent or corrupt.
fn parse_store_blob(blob: Option<&str>) -> HashMap<String, GameSession> {
    match blob {
        None => HashMap::new(),
        Some(raw) => match serde_json::from_str(raw) {
            Ok(games) => games,
            Err(e) => {
                warn!(error = %e, "Saved games blob is corrupt, treating store as empty");
                HashMap::new()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store_blob_absent() {
        assert!(parse_store_blob(None).is_empty());
    }

    #[test]
    fn test_parse_store_blob_corrupt() {
        assert!(parse_store_blob(Some("{not json")).is_empty());
    }
}
