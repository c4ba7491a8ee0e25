//! Storage layer for saved-game persistence.
//!
//! All saved sessions are kept as ONE serialized JSON blob (a mapping of
//! session id → full session) under a fixed key in a durable key-value
//! table, mirroring the store layout the game has always used. Every save
//! rewrites the whole mapping; that full-blob contract is only safe with
//! a single writer and is deliberately preserved rather than redesigned.

mod sqlite;

pub use sqlite::SqliteStorage;

use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::StorageResult;
use crate::session::GameSession;

/// Fixed key the saved-games mapping is stored under.
pub const SAVED_GAMES_KEY: &str = "mystery_cordoba_saved_games";

/// Derived key for a session's tutorial-shown flag.
pub fn tutorial_key(session_id: &str) -> String {
    format!("tutorial_seen_{}", session_id)
}

/// Durable mapping from session id to game session.
///
/// Loaded once at startup and written through on every mutating action;
/// a missing or corrupt blob reads as an empty mapping and is never
/// surfaced to the player.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the full saved-games mapping. Absent or unparsable data
    /// yields an empty mapping (the parse failure is logged, not fatal).
    async fn load_all(&self) -> StorageResult<HashMap<String, GameSession>>;

    /// Insert or overwrite one session and rewrite the full mapping.
    async fn save_one(&self, session: &GameSession) -> StorageResult<()>;

    /// Remove one session and rewrite the full mapping. Callers are
    /// responsible for confirming with the user first.
    async fn delete_one(&self, id: &str) -> StorageResult<()>;

    /// Whether the onboarding tutorial was already shown for a session.
    async fn tutorial_seen(&self, session_id: &str) -> StorageResult<bool>;

    /// Record that the onboarding tutorial has been shown.
    async fn mark_tutorial_seen(&self, session_id: &str) -> StorageResult<()>;
}
