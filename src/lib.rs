//! # Concejo Mystery
//!
//! Terminal client for an AI-narrated murder mystery set in the Concejo
//! Deliberante de Córdoba. Gemini authors the puzzle, narrates each turn
//! and synthesizes the scene imagery; sessions are saved locally and can
//! be resumed, replayed or deleted.
//!
//! ## Architecture
//!
//! ```text
//! Terminal (App) → GameEngine → Gemini API (HTTPS)
//!                      ↓
//!                SQLite (saved games)
//! ```
//!
//! The engine is a small state machine: create a game, apply player
//! actions (investigate or solve), accumulate clues, and persist a full
//! snapshot after every committed turn. Turns are all-or-nothing - the
//! narration never lands without its image.
//!
//! ## Example
//!
//! ```ignore
//! use concejo_mystery::{App, Config, GameEngine};
//! use concejo_mystery::gemini::GeminiClient;
//! use concejo_mystery::storage::SqliteStorage;
//! use concejo_mystery::transcript::StdinSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let gemini = GeminiClient::new(&config.gemini, config.request.clone())?;
//!     let engine = GameEngine::new(storage.clone(), gemini, &config);
//!     let app = App::new(config, storage, engine);
//!     app.run(&mut StdinSource::new()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Terminal presentation layer (home and game screens, autosave).
pub mod app;
/// Configuration management.
pub mod config;
/// The game session state machine.
pub mod engine;
/// Error types and result aliases for the application.
pub mod error;
/// Gemini API client and request/response types.
pub mod gemini;
/// Centralized prompt and response-schema definitions.
pub mod prompts;
/// Game session data model.
pub mod session;
/// Saved-game persistence layer.
pub mod storage;
/// Player input capability (typed or transcribed text).
pub mod transcript;

pub use app::App;
pub use config::Config;
pub use engine::{GameEngine, SubmitOutcome};
pub use error::{AppError, AppResult};
pub use session::{ChatMessage, GameSession, Mystery, PlayerAction, Speaker};
pub use storage::{SessionStore, SqliteStorage};
