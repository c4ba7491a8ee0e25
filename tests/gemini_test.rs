//! Integration tests for the Gemini client
//!
//! Tests HTTP behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use concejo_mystery::config::{GeminiConfig, RequestConfig};
use concejo_mystery::error::GeminiError;
use concejo_mystery::gemini::GeminiClient;
use concejo_mystery::session::ChatMessage;

const TEXT_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";
const IMAGE_PATH: &str = "/v1beta/models/imagen-4.0-generate-001:predict";

/// Create a test client pointing to the mock server
fn create_test_client(base_url: &str) -> GeminiClient {
    let config = GeminiConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        text_model: "gemini-2.5-flash".to_string(),
        image_model: "imagen-4.0-generate-001".to_string(),
    };

    let request_config = RequestConfig { timeout_ms: 5000 };

    GeminiClient::new(&config, request_config).expect("Failed to create client")
}

/// Wrap a structured payload the way generateContent returns it: as the
/// text of the first candidate.
fn completion_body(payload: serde_json::Value) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": payload.to_string() }] },
            "finishReason": "STOP"
        }]
    })
}

mod mystery_tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_mystery_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .and(header("x-goog-api-key", "test-api-key"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({
                "title": "El Concejal Silencioso",
                "initialScene": "El recinto está en silencio absoluto.",
                "initialImagePrompt": "un recinto legislativo vacío de noche",
                "secretSolution": "La asesora de la comisión de hacienda."
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let mystery = client.generate_mystery("es-ES").await.unwrap();

        assert_eq!(mystery.title, "El Concejal Silencioso");
        assert_eq!(mystery.initial_scene, "El recinto está en silencio absoluto.");
        assert_eq!(
            mystery.secret_solution,
            "La asesora de la comisión de hacienda."
        );
    }

    #[tokio::test]
    async fn test_generate_mystery_sends_locale() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .and(body_string_contains("es-AR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({
                "title": "t",
                "initialScene": "s",
                "initialImagePrompt": "p",
                "secretSolution": "x"
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        client.generate_mystery("es-AR").await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_mystery_malformed_completion() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "this is not the agreed JSON" }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let result = client.generate_mystery("es-ES").await;

        assert!(matches!(
            result,
            Err(GeminiError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_mystery_no_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let result = client.generate_mystery("es-ES").await;

        assert!(matches!(
            result,
            Err(GeminiError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_mystery_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let result = client.generate_mystery("es-ES").await;

        match result {
            Err(GeminiError::Api { status, .. }) => assert_eq!(status, 500),
            other => panic!("Expected API error, got {:?}", other),
        }
    }
}

mod turn_tests {
    use super::*;

    #[tokio::test]
    async fn test_next_step_replays_history() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .and(body_string_contains("model: Una figura inmóvil en el despacho."))
            .and(body_string_contains("Reviso los cajones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({
                "narration": "El cajón superior está cerrado con llave.",
                "imagePrompt": "un cajón de escritorio cerrado con llave",
                "newClue": "El cajón superior está cerrado con llave"
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let history = vec![ChatMessage::narrator("Una figura inmóvil en el despacho.")];
        let step = client
            .next_step(&history, "Reviso los cajones", "es-ES")
            .await
            .unwrap();

        assert_eq!(step.narration, "El cajón superior está cerrado con llave.");
        assert_eq!(step.new_clue, "El cajón superior está cerrado con llave");
    }

    #[tokio::test]
    async fn test_next_step_empty_clue() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({
                "narration": "Nada fuera de lo común.",
                "imagePrompt": "un pasillo ordinario",
                "newClue": ""
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let step = client.next_step(&[], "Miro el pasillo", "es-ES").await.unwrap();

        assert!(step.new_clue.is_empty());
    }
}

mod solution_tests {
    use super::*;

    #[tokio::test]
    async fn test_check_solution_verdict() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEXT_PATH))
            .and(body_string_contains("el mayordomo"))
            .and(body_string_contains("La asesora"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({
                "isCorrect": false,
                "explanation": "El mayordomo no tenía acceso al recinto."
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let check = client
            .check_solution(&[], "el mayordomo", "La asesora", "es-ES")
            .await
            .unwrap();

        assert!(!check.is_correct);
        assert_eq!(
            check.explanation,
            "El mayordomo no tenía acceso al recinto."
        );
    }
}

mod image_tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_image_returns_data_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(IMAGE_PATH))
            .and(header("x-goog-api-key", "test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{
                    "bytesBase64Encoded": "QUJDRA==",
                    "mimeType": "image/jpeg"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let image = client.generate_image("una escena nocturna").await.unwrap();

        assert_eq!(image, "data:image/jpeg;base64,QUJDRA==");
    }

    #[tokio::test]
    async fn test_generate_image_appends_style_suffix() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(IMAGE_PATH))
            .and(body_string_contains("una escena nocturna"))
            .and(body_string_contains("noir style"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{ "bytesBase64Encoded": "QUJDRA==" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        client.generate_image("una escena nocturna").await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_image_zero_predictions() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(IMAGE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "predictions": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let result = client.generate_image("algo filtrado").await;

        assert!(matches!(result, Err(GeminiError::NoImages)));
    }

    #[tokio::test]
    async fn test_generate_image_prediction_without_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(IMAGE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{ "mimeType": "image/jpeg" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let result = client.generate_image("algo").await;

        assert!(matches!(result, Err(GeminiError::NoImages)));
    }

    #[tokio::test]
    async fn test_generate_image_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(IMAGE_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server.uri());
        let result = client.generate_image("algo").await;

        match result {
            Err(GeminiError::Api { status, .. }) => assert_eq!(status, 429),
            other => panic!("Expected API error, got {:?}", other),
        }
    }
}
