//! Gemini API client for story, judgment and image generation.
//!
//! The game talks to two models: a text model that answers with JSON
//! constrained by a response schema (mystery creation, narrative turns,
//! solution judgments) and an image model reached through `:predict`.
//! No call here retries; every failure requires a fresh player action.

mod client;
mod types;

pub use client::GeminiClient;
pub use types::{
    Candidate, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    ImageInstance, ImageParameters, Part, PredictRequest, PredictResponse, Prediction,
    SolutionCheck, TurnStep,
};
