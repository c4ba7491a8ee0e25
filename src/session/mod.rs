//! Game session data model.
//!
//! A [`GameSession`] is one player's playthrough of a generated mystery:
//! the immutable puzzle, the append-only chat transcript, accumulated
//! clues, the current scene image and the solved flag. The serialized
//! JSON layout (field names, speaker tags, epoch-millisecond timestamps)
//! is the persistence contract and must not change shape.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Literal prefix that marks a player input as a solution attempt.
///
/// Matching is case-insensitive on the marker itself; the remainder is
/// taken verbatim as the proposed solution.
pub const SOLVE_MARKER: &str = "SOLUCIÓN:";

/// The generated puzzle a session is built around. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mystery {
    /// Mystery title shown on the saved-games list.
    pub title: String,
    /// Narrative text that opens the story.
    pub initial_scene: String,
    /// Image prompt for the opening scene.
    pub initial_image_prompt: String,
    /// The hidden solution the player is trying to reconstruct.
    pub secret_solution: String,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    /// The player (serialized as `user` for store/prompt compatibility).
    #[serde(rename = "user")]
    Player,
    /// The game master (serialized as `model`).
    #[serde(rename = "model")]
    Narrator,
}

impl Speaker {
    /// Wire/prompt tag for this speaker.
    pub fn as_role(&self) -> &'static str {
        match self {
            Speaker::Player => "user",
            Speaker::Narrator => "model",
        }
    }
}

/// One entry of the chronological chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "role")]
    pub speaker: Speaker,
    pub text: String,
}

impl ChatMessage {
    /// Create a player message
    pub fn player(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Player,
            text: text.into(),
        }
    }

    /// Create a narrator message
    pub fn narrator(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Narrator,
            text: text.into(),
        }
    }
}

/// One saved playthrough.
///
/// `history` and `clues` only ever grow, `solved` only ever flips
/// false→true, and `current_narration` is the narrator transcript joined
/// by blank lines, kept redundantly for direct display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    /// Persistence key, derived from the creation timestamp.
    pub id: String,
    /// The puzzle being played.
    pub mystery: Mystery,
    /// Full chronological transcript, replayed as context on every AI call.
    #[serde(rename = "chatHistory")]
    pub history: Vec<ChatMessage>,
    /// Clues surfaced so far (duplicates allowed).
    pub clues: Vec<String>,
    /// Current scene image as a `data:` URL, if one has been synthesized.
    pub current_image: Option<String>,
    /// Cumulative narrator text for display.
    pub current_narration: String,
    #[serde(rename = "isSolved")]
    pub solved: bool,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
}

impl GameSession {
    /// Create a fresh session around a generated mystery and its opening
    /// scene image.
    pub fn new(mystery: Mystery, opening_image: String) -> Self {
        let created_at = Utc::now().timestamp_millis();
        let current_narration = mystery.initial_scene.clone();
        let history = vec![ChatMessage::narrator(mystery.initial_scene.as_str())];

        Self {
            id: format!("game_{}", created_at),
            mystery,
            history,
            clues: Vec::new(),
            current_image: Some(opening_image),
            current_narration,
            solved: false,
            created_at,
        }
    }

    /// Append a player message to the transcript.
    pub fn record_player(&mut self, text: impl Into<String>) {
        self.history.push(ChatMessage::player(text));
    }

    /// Append a narrator message to the transcript and to the cumulative
    /// display text.
    pub fn record_narrator(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.current_narration.push_str("\n\n");
        self.current_narration.push_str(&text);
        self.history.push(ChatMessage::narrator(text));
    }
}

/// A classified player input.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    /// A solution attempt; carries the proposed solution with the marker
    /// stripped and surrounding whitespace trimmed.
    Solve(String),
    /// Any other input, treated as an investigative action.
    Investigate,
}

impl PlayerAction {
    /// Classify a raw player input.
    ///
    /// The solve marker is the only disambiguator: a case-insensitive
    /// prefix match on [`SOLVE_MARKER`]. The remainder keeps its original
    /// casing.
    pub fn classify(input: &str) -> PlayerAction {
        match strip_solve_marker(input) {
            Some(rest) => PlayerAction::Solve(rest.trim().to_string()),
            None => PlayerAction::Investigate,
        }
    }
}

/// Case-insensitive prefix match against the solve marker, returning the
/// untouched remainder on success.
fn strip_solve_marker(input: &str) -> Option<&str> {
    let mut marker = SOLVE_MARKER.chars();
    let mut consumed = 0;

    for c in input.chars() {
        match marker.next() {
            Some(m) => {
                if !c.to_uppercase().eq(m.to_uppercase()) {
                    return None;
                }
                consumed += c.len_utf8();
            }
            None => break,
        }
    }

    if marker.next().is_some() {
        // Input ran out before the marker did
        return None;
    }

    Some(&input[consumed..])
}
