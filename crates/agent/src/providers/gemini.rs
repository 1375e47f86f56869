use async_trait::async_trait;
use merryway_core::config::LlmConfig;
use merryway_core::errors::ApplicationError;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::llm::{CompletionClient, CompletionRequest, HARM_CATEGORIES};
use crate::providers::{http_client, send_json, trimmed_base_url};
use crate::retrieval::EmbeddingClient;

const COMPLETION_SERVICE: &str = "gemini.generate_content";
const EMBEDDING_SERVICE: &str = "gemini.embed_content";

/// Generative Language REST API client.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    embedding_model: String,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ApplicationError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ApplicationError::Configuration("llm.api_key is required for gemini".to_string())
        })?;

        Ok(Self {
            http: http_client(COMPLETION_SERVICE, config.timeout_secs)?,
            base_url: trimmed_base_url(config.effective_base_url()),
            api_key,
            model: model_path(&config.model),
            embedding_model: model_path(&config.embedding_model),
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/{model}:{method}", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ApplicationError> {
        let payload = generate_payload(request);
        let response = send_json(
            COMPLETION_SERVICE,
            self.http
                .post(self.endpoint(&self.model, "generateContent"))
                .header("x-goog-api-key", self.api_key.expose_secret())
                .json(&payload),
        )
        .await?;

        parse_generate_response(&response)
    }
}

#[async_trait]
impl EmbeddingClient for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError> {
        let payload = embed_payload(&self.embedding_model, text);
        let response = send_json(
            EMBEDDING_SERVICE,
            self.http
                .post(self.endpoint(&self.embedding_model, "embedContent"))
                .header("x-goog-api-key", self.api_key.expose_secret())
                .json(&payload),
        )
        .await?;

        parse_embed_response(&response)
    }
}

/// `gemini-1.5-flash` and `models/gemini-1.5-flash` name the same model.
fn model_path(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

pub(crate) fn generate_payload(request: &CompletionRequest) -> Value {
    let params = &request.params;
    let safety_settings: Vec<Value> = HARM_CATEGORIES
        .iter()
        .map(|category| json!({"category": category, "threshold": params.safety_threshold}))
        .collect();

    json!({
        "contents": [{"role": "user", "parts": [{"text": request.combined_prompt()}]}],
        "generationConfig": {
            "temperature": params.temperature,
            "topP": params.top_p,
            "topK": params.top_k,
            "maxOutputTokens": params.max_output_tokens,
        },
        "safetySettings": safety_settings,
    })
}

pub(crate) fn parse_generate_response(response: &Value) -> Result<String, ApplicationError> {
    if let Some(reason) = response.pointer("/promptFeedback/blockReason").and_then(Value::as_str)
    {
        return Err(ApplicationError::external(
            COMPLETION_SERVICE,
            format!("prompt blocked: {reason}"),
        ));
    }

    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            let finish = response
                .pointer("/candidates/0/finishReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            ApplicationError::external(COMPLETION_SERVICE, format!("empty response: {finish}"))
        })?;

    Ok(parts.iter().filter_map(|part| part.get("text").and_then(Value::as_str)).collect())
}

fn embed_payload(model: &str, text: &str) -> Value {
    json!({"model": model, "content": {"parts": [{"text": text}]}})
}

pub(crate) fn parse_embed_response(response: &Value) -> Result<Vec<f32>, ApplicationError> {
    let values = response
        .pointer("/embedding/values")
        .and_then(Value::as_array)
        .ok_or_else(|| ApplicationError::external(EMBEDDING_SERVICE, "missing embedding values"))?;

    Ok(values.iter().filter_map(Value::as_f64).map(|value| value as f32).collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{generate_payload, model_path, parse_embed_response, parse_generate_response};
    use crate::llm::{CompletionRequest, GenerationParams, PromptMessage};

    #[test]
    fn payload_carries_generation_config_and_all_safety_categories() {
        let request = CompletionRequest::new(
            vec![PromptMessage::system("persona"), PromptMessage::user("Do you have scones?")],
            GenerationParams::default(),
        );

        let payload = generate_payload(&request);

        assert_eq!(payload["contents"][0]["parts"][0]["text"], "persona\nDo you have scones?");
        assert_eq!(payload["generationConfig"]["topK"], 40);
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 2000);
        let settings = payload["safetySettings"].as_array().expect("safety settings");
        assert_eq!(settings.len(), 4);
        assert!(settings.iter().all(|entry| entry["threshold"] == "BLOCK_MEDIUM_AND_ABOVE"));
    }

    #[test]
    fn response_text_parts_are_concatenated() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "{\"decision\":"}, {"text": " \"allowed\"}"}]}}]
        });

        assert_eq!(
            parse_generate_response(&response).expect("text"),
            "{\"decision\": \"allowed\"}"
        );
    }

    #[test]
    fn blocked_or_empty_responses_are_errors() {
        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let empty = json!({"candidates": [{"finishReason": "SAFETY"}]});

        assert!(parse_generate_response(&blocked).is_err());
        let error = parse_generate_response(&empty).expect_err("empty candidate");
        assert!(error.to_string().contains("SAFETY"));
    }

    #[test]
    fn embedding_values_are_read() {
        let response = json!({"embedding": {"values": [0.25, -0.5]}});

        assert_eq!(parse_embed_response(&response).expect("vector"), vec![0.25, -0.5]);
        assert!(parse_embed_response(&json!({})).is_err());
    }

    #[test]
    fn model_names_gain_models_prefix() {
        assert_eq!(model_path("gemini-1.5-flash"), "models/gemini-1.5-flash");
        assert_eq!(model_path("models/text-embedding-004"), "models/text-embedding-004");
    }
}
