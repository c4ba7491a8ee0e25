//! Game session state machine.
//!
//! [`GameEngine`] owns the transitions of one active playthrough: it
//! orchestrates the Gemini clients, builds the next session snapshot and
//! persists it through the session store. A turn is all-or-nothing - no
//! narration, clue or image lands in the session unless every call it
//! depends on succeeded, and the snapshot is persisted before it is
//! handed back to the presentation layer.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::gemini::{GeminiClient, TurnStep};
use crate::session::{GameSession, PlayerAction};
use crate::storage::SessionStore;

/// Result of submitting a player input.
#[derive(Debug, PartialEq)]
pub enum SubmitOutcome {
    /// The input was not acted on: it was empty, another action was in
    /// flight, or the session is already solved.
    Ignored,
    /// The action committed; this is the new session snapshot, already
    /// persisted.
    Updated(GameSession),
}

/// The session state machine.
pub struct GameEngine<S> {
    storage: S,
    gemini: GeminiClient,
    locale: String,
    /// Single in-flight guard: a submission while another action is
    /// pending is rejected, not queued.
    in_flight: AtomicBool,
}

impl<S: SessionStore> GameEngine<S> {
    /// Create a new engine
    pub fn new(storage: S, gemini: GeminiClient, config: &Config) -> Self {
        Self {
            storage,
            gemini,
            locale: config.game.locale.clone(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Locale the narration is generated in
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Create a brand-new game session.
    ///
    /// Mystery generation runs first, then image synthesis for the
    /// opening scene (the prompt depends on the generated text). If
    /// either call fails nothing is persisted.
    pub async fn new_game(&self) -> AppResult<GameSession> {
        info!(locale = %self.locale, "Creating a new mystery");

        let mystery = self.gemini.generate_mystery(&self.locale).await?;
        let image = self
            .gemini
            .generate_image(&mystery.initial_image_prompt)
            .await?;

        let session = GameSession::new(mystery, image);
        self.storage.save_one(&session).await?;

        info!(
            session_id = %session.id,
            title = %session.mystery.title,
            "New game created"
        );
        Ok(session)
    }

    /// Apply one player input to a session.
    ///
    /// Returns [`SubmitOutcome::Ignored`] without issuing any client call
    /// for empty/whitespace input, for a solved session, or while a prior
    /// action is still pending. On success the returned snapshot has
    /// already been persisted; on failure the previous snapshot stands
    /// untouched.
    pub async fn submit_action(
        &self,
        session: &GameSession,
        raw_input: &str,
    ) -> AppResult<SubmitOutcome> {
        if raw_input.trim().is_empty() {
            debug!("Ignoring empty player input");
            return Ok(SubmitOutcome::Ignored);
        }
        if session.solved {
            debug!(session_id = %session.id, "Ignoring input for a solved session");
            return Ok(SubmitOutcome::Ignored);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            warn!(session_id = %session.id, "Rejecting input while an action is in flight");
            return Ok(SubmitOutcome::Ignored);
        }

        let result = self.run_action(session, raw_input).await;
        self.in_flight.store(false, Ordering::Release);

        result.map(SubmitOutcome::Updated)
    }

    async fn run_action(&self, session: &GameSession, raw_input: &str) -> AppResult<GameSession> {
        match PlayerAction::classify(raw_input) {
            PlayerAction::Solve(proposed) => self.run_solve(session, raw_input, &proposed).await,
            PlayerAction::Investigate => self.run_investigate(session, raw_input).await,
        }
    }

    /// Solution attempt: judge it against the secret solution. No image
    /// is synthesized on this path.
    async fn run_solve(
        &self,
        session: &GameSession,
        raw_input: &str,
        proposed: &str,
    ) -> AppResult<GameSession> {
        info!(session_id = %session.id, "Evaluating proposed solution");

        let verdict = self
            .gemini
            .check_solution(
                &session.history,
                proposed,
                &session.mystery.secret_solution,
                &self.locale,
            )
            .await?;

        let mut next = session.clone();
        next.record_player(raw_input);
        next.record_narrator(format!(
            "Evaluación de la solución: {}",
            verdict.explanation
        ));
        next.solved = verdict.is_correct;

        self.storage.save_one(&next).await?;

        info!(
            session_id = %next.id,
            solved = next.solved,
            "Solution evaluated"
        );
        Ok(next)
    }

    /// Investigative action: one narrative turn plus its scene image.
    async fn run_investigate(
        &self,
        session: &GameSession,
        raw_input: &str,
    ) -> AppResult<GameSession> {
        let step = self
            .gemini
            .next_step(&session.history, raw_input, &self.locale)
            .await?;

        // The turn commits only together with its image
        let image = self.gemini.generate_image(&step.image_prompt).await?;

        let TurnStep {
            narration,
            new_clue,
            ..
        } = step;

        let mut next = session.clone();
        next.record_player(raw_input);
        next.record_narrator(narration);
        if !new_clue.is_empty() {
            next.clues.push(new_clue);
        }
        next.current_image = Some(image);

        self.storage.save_one(&next).await?;

        info!(
            session_id = %next.id,
            history_len = next.history.len(),
            clues = next.clues.len(),
            "Turn committed"
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DatabaseConfig, GameConfig, GeminiConfig, LogFormat, LoggingConfig, RequestConfig,
    };
    use crate::session::Mystery;
    use crate::storage::MockSessionStore;
    use serde_json::json;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> Config {
        Config {
            gemini: GeminiConfig {
                api_key: "test-key".to_string(),
                base_url: base_url.to_string(),
                text_model: "gemini-2.5-flash".to_string(),
                image_model: "imagen-4.0-generate-001".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            request: RequestConfig { timeout_ms: 5000 },
            game: GameConfig::default(),
        }
    }

    fn completion_body(payload: serde_json::Value) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": payload.to_string() }] },
                "finishReason": "STOP"
            }]
        })
    }

    fn mystery_completion() -> serde_json::Value {
        completion_body(json!({
            "title": "El Concejal Silencioso",
            "initialScene": "El recinto está en silencio.",
            "initialImagePrompt": "un recinto legislativo vacío de noche",
            "secretSolution": "La asesora de la comisión de hacienda."
        }))
    }

    fn test_session() -> GameSession {
        GameSession::new(
            Mystery {
                title: "El Concejal Silencioso".to_string(),
                initial_scene: "El recinto está en silencio.".to_string(),
                initial_image_prompt: "un recinto legislativo vacío".to_string(),
                secret_solution: "La asesora.".to_string(),
            },
            "data:image/jpeg;base64,AAAA".to_string(),
        )
    }

    fn engine_with(
        storage: MockSessionStore,
        server: &MockServer,
    ) -> GameEngine<MockSessionStore> {
        let config = test_config(&server.uri());
        let gemini = GeminiClient::new(&config.gemini, config.request.clone()).unwrap();
        GameEngine::new(storage, gemini, &config)
    }

    #[tokio::test]
    async fn test_new_game_persists_nothing_when_image_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mystery_completion()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/imagen-4.0-generate-001:predict"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let mut storage = MockSessionStore::new();
        storage.expect_save_one().times(0);

        let engine = engine_with(storage, &server);
        let result = engine.new_game().await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_investigate_persists_exactly_once() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({
                "narration": "La puerta del despacho está entreabierta.",
                "imagePrompt": "una puerta entreabierta",
                "newClue": ""
            }))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/imagen-4.0-generate-001:predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{ "bytesBase64Encoded": "QkJCQg==", "mimeType": "image/jpeg" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut storage = MockSessionStore::new();
        storage
            .expect_save_one()
            .times(1)
            .returning(|_| Ok(()));

        let engine = engine_with(storage, &server);
        let outcome = engine
            .submit_action(&test_session(), "Reviso el despacho")
            .await
            .unwrap();

        match outcome {
            SubmitOutcome::Updated(next) => {
                assert_eq!(next.history.len(), 3);
                assert!(next.clues.is_empty());
            }
            SubmitOutcome::Ignored => panic!("action should have committed"),
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_a_no_op() {
        let server = MockServer::start().await;
        let engine = engine_with(MockSessionStore::new(), &server);

        let outcome = engine.submit_action(&test_session(), "   \n").await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_solved_session_is_a_no_op() {
        let server = MockServer::start().await;
        let engine = engine_with(MockSessionStore::new(), &server);

        let mut session = test_session();
        session.solved = true;

        let outcome = engine
            .submit_action(&session, "Interrogo al secretario")
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_pending_action_rejects_new_submission() {
        let server = MockServer::start().await;
        let engine = engine_with(MockSessionStore::new(), &server);

        engine.in_flight.store(true, Ordering::Release);

        let outcome = engine
            .submit_action(&test_session(), "Reviso el escritorio")
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Ignored);
    }
}
