//! Player input capability.
//!
//! The state machine only ever consumes plain text and is indifferent to
//! where it came from: typed lines today, a speech recognizer tomorrow.
//! [`TranscriptSource`] is that seam - `start`/`stop` move it between
//! idle and listening, `next_transcript` yields the next utterance.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::error::AppResult;

/// Listening state of an input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    /// Not producing transcripts.
    Idle,
    /// Actively producing transcripts.
    Listening,
}

/// An origin-agnostic source of player text.
#[async_trait]
pub trait TranscriptSource: Send {
    /// Begin producing transcripts.
    fn start(&mut self) -> AppResult<()>;

    /// Stop producing transcripts.
    fn stop(&mut self);

    /// Current listening state.
    fn state(&self) -> ListenState;

    /// Next transcript, or `None` when the source is idle or exhausted.
    async fn next_transcript(&mut self) -> Option<String>;
}

/// Transcript source backed by typed lines on standard input.
pub struct StdinSource {
    lines: Lines<BufReader<Stdin>>,
    state: ListenState,
}

impl StdinSource {
    /// Create an idle stdin source
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            state: ListenState::Idle,
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptSource for StdinSource {
    fn start(&mut self) -> AppResult<()> {
        self.state = ListenState::Listening;
        Ok(())
    }

    fn stop(&mut self) {
        self.state = ListenState::Idle;
    }

    fn state(&self) -> ListenState {
        self.state
    }

    async fn next_transcript(&mut self) -> Option<String> {
        if self.state != ListenState::Listening {
            return None;
        }
        self.lines.next_line().await.ok().flatten()
    }
}
