use async_trait::async_trait;
use merryway_core::config::LlmConfig;
use merryway_core::errors::ApplicationError;
use serde_json::{json, Value};

use crate::llm::{CompletionClient, CompletionRequest, PromptRole};
use crate::providers::{http_client, send_json, trimmed_base_url};
use crate::retrieval::EmbeddingClient;

const COMPLETION_SERVICE: &str = "ollama.chat";
const EMBEDDING_SERVICE: &str = "ollama.embed";

/// Local Ollama server client. No credentials.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: String,
}

impl OllamaClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ApplicationError> {
        Ok(Self {
            http: http_client(COMPLETION_SERVICE, config.timeout_secs)?,
            base_url: trimmed_base_url(config.effective_base_url()),
            model: config.model.trim().to_string(),
            embedding_model: config.embedding_model.trim().to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    fn provider(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ApplicationError> {
        let payload = chat_payload(&self.model, request);
        let response = send_json(
            COMPLETION_SERVICE,
            self.http.post(format!("{}/api/chat", self.base_url)).json(&payload),
        )
        .await?;

        parse_chat_response(&response)
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError> {
        let payload = json!({"model": self.embedding_model, "input": text});
        let response = send_json(
            EMBEDDING_SERVICE,
            self.http.post(format!("{}/api/embed", self.base_url)).json(&payload),
        )
        .await?;

        parse_embed_response(&response)
    }
}

pub(crate) fn chat_payload(model: &str, request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .filter(|message| !message.content.trim().is_empty())
        .map(|message| {
            let role = match message.role {
                PromptRole::System => "system",
                PromptRole::User => "user",
            };
            json!({"role": role, "content": message.content})
        })
        .collect();

    json!({
        "model": model,
        "messages": messages,
        "stream": false,
        "options": {
            "temperature": request.params.temperature,
            "top_p": request.params.top_p,
            "top_k": request.params.top_k,
            "num_predict": request.params.max_output_tokens,
        },
    })
}

pub(crate) fn parse_chat_response(response: &Value) -> Result<String, ApplicationError> {
    response
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApplicationError::external(COMPLETION_SERVICE, "missing message content"))
}

pub(crate) fn parse_embed_response(response: &Value) -> Result<Vec<f32>, ApplicationError> {
    let values = response
        .pointer("/embeddings/0")
        .and_then(Value::as_array)
        .ok_or_else(|| ApplicationError::external(EMBEDDING_SERVICE, "missing embeddings"))?;

    Ok(values.iter().filter_map(Value::as_f64).map(|value| value as f32).collect())
}
