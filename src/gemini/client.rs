use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{
    GenerateContentRequest, GenerateContentResponse, ImageInstance, ImageParameters,
    PredictRequest, PredictResponse, SolutionCheck, TurnStep,
};
use crate::config::{GeminiConfig, RequestConfig};
use crate::error::{GeminiError, GeminiResult};
use crate::prompts;
use crate::session::{ChatMessage, Mystery};

/// Client for the Gemini generative text and image APIs.
///
/// Every call is a single attempt: failures surface to the caller and a
/// fresh player action is the only way to try again.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    text_model: String,
    image_model: String,
    request_config: RequestConfig,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &GeminiConfig, request_config: RequestConfig) -> GeminiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(GeminiError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            request_config,
        })
    }

    /// Author a brand-new mystery in the given language
    pub async fn generate_mystery(&self, language: &str) -> GeminiResult<Mystery> {
        let request = GenerateContentRequest::structured(
            prompts::mystery_prompt(language),
            prompts::mystery_schema(),
            Some(1.0),
        );
        let payload = self.generate_json(&self.text_model, request).await?;
        parse_payload(&payload)
    }

    /// Advance the story one turn from the player's action
    pub async fn next_step(
        &self,
        history: &[ChatMessage],
        player_input: &str,
        language: &str,
    ) -> GeminiResult<TurnStep> {
        let request = GenerateContentRequest::structured(
            prompts::turn_prompt(history, player_input, language),
            prompts::turn_schema(),
            None,
        );
        let payload = self.generate_json(&self.text_model, request).await?;
        parse_payload(&payload)
    }

    /// Judge a proposed solution against the secret one
    pub async fn check_solution(
        &self,
        history: &[ChatMessage],
        proposed: &str,
        secret: &str,
        language: &str,
    ) -> GeminiResult<SolutionCheck> {
        let request = GenerateContentRequest::structured(
            prompts::solution_prompt(history, proposed, secret, language),
            prompts::solution_schema(),
            None,
        );
        let payload = self.generate_json(&self.text_model, request).await?;
        parse_payload(&payload)
    }

    /// Synthesize a scene image, returned as a `data:image/jpeg;base64,`
    /// reference. Zero returned images is a distinct failure: the usual
    /// cause is upstream content filtering of the prompt.
    pub async fn generate_image(&self, prompt: &str) -> GeminiResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:predict",
            self.base_url, self.image_model
        );

        let request = PredictRequest {
            instances: vec![ImageInstance {
                prompt: format!("{}{}", prompt, prompts::IMAGE_STYLE_SUFFIX),
            }],
            parameters: ImageParameters {
                sample_count: 1,
                aspect_ratio: "16:9".to_string(),
                output_mime_type: "image/jpeg".to_string(),
            },
        };

        let start = Instant::now();
        let response = self.execute(&url, &request).await;
        let latency = start.elapsed();

        let response: PredictResponse = match response {
            Ok(r) => r,
            Err(e) => {
                error!(
                    model = %self.image_model,
                    error = %e,
                    latency_ms = latency.as_millis(),
                    "Image synthesis failed"
                );
                return Err(e);
            }
        };

        let bytes = response
            .predictions
            .first()
            .and_then(|p| p.bytes_base64_encoded.clone());

        match bytes {
            Some(encoded) => {
                info!(
                    model = %self.image_model,
                    latency_ms = latency.as_millis(),
                    "Image synthesis succeeded"
                );
                Ok(format!("data:image/jpeg;base64,{}", encoded))
            }
            None => {
                warn!(
                    model = %self.image_model,
                    predictions = response.predictions.len(),
                    "Image synthesis returned no image payload"
                );
                Err(GeminiError::NoImages)
            }
        }
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a structured `generateContent` call and return the raw JSON
    /// completion text.
    async fn generate_json(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> GeminiResult<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let start = Instant::now();
        let result: GeminiResult<GenerateContentResponse> = self.execute(&url, &request).await;
        let latency = start.elapsed();

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                error!(
                    model = %model,
                    error = %e,
                    latency_ms = latency.as_millis(),
                    "Gemini call failed"
                );
                return Err(e);
            }
        };

        match response.text() {
            Some(text) => {
                info!(
                    model = %model,
                    latency_ms = latency.as_millis(),
                    "Gemini call succeeded"
                );
                Ok(text.trim().to_string())
            }
            None => Err(GeminiError::InvalidResponse {
                message: "Response contained no candidate text".to_string(),
            }),
        }
    }

    /// Execute a single request (internal)
    async fn execute<B, R>(&self, url: &str, body: &B) -> GeminiResult<R>
    where
        B: serde::Serialize,
        R: DeserializeOwned,
    {
        debug!(url = %url, "Calling Gemini API");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeminiError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    GeminiError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GeminiError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }
}

/// Parse the structured JSON completion into its typed payload
fn parse_payload<T: DeserializeOwned>(payload: &str) -> GeminiResult<T> {
    serde_json::from_str(payload).map_err(|e| GeminiError::InvalidResponse {
        message: format!("Completion did not match the expected schema: {}", e),
    })
}
