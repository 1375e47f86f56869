//! HTTP adapters for the completion, embedding, and vector-search services.

pub mod gemini;
pub mod ollama;
pub mod pinecone;

use std::sync::Arc;
use std::time::Duration;

use merryway_core::config::{LlmConfig, LlmProvider};
use merryway_core::errors::ApplicationError;
use serde_json::Value;
use tracing::warn;

use crate::llm::CompletionClient;
use crate::retrieval::EmbeddingClient;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use pinecone::PineconeIndex;

/// Completion and embedding clients backed by the configured provider.
#[derive(Clone)]
pub struct LanguageModels {
    pub completion: Arc<dyn CompletionClient>,
    pub embedding: Arc<dyn EmbeddingClient>,
}

impl LanguageModels {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ApplicationError> {
        match config.provider {
            LlmProvider::Gemini => {
                let client = Arc::new(GeminiClient::from_config(config)?);
                Ok(Self { completion: client.clone(), embedding: client })
            }
            LlmProvider::Ollama => {
                let client = Arc::new(OllamaClient::from_config(config)?);
                Ok(Self { completion: client.clone(), embedding: client })
            }
        }
    }
}

pub(crate) fn http_client(
    service: &'static str,
    timeout_secs: u64,
) -> Result<reqwest::Client, ApplicationError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|error| ApplicationError::external(service, error.to_string()))
}

/// Sends a prepared request and decodes the JSON body of a 2xx response.
pub(crate) async fn send_json(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<Value, ApplicationError> {
    let response = request.send().await.map_err(|error| {
        warn!(event_name = "provider.request.failed", service, error = %error, "request failed");
        ApplicationError::external(service, error.to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(
            event_name = "provider.request.rejected",
            service,
            status = status.as_u16(),
            "service returned an error status"
        );
        return Err(ApplicationError::external(
            service,
            format!("returned {status}: {}", truncate(&body, 300)),
        ));
    }

    response.json::<Value>().await.map_err(|error| {
        ApplicationError::external(service, format!("failed to decode response: {error}"))
    })
}

pub(crate) fn trimmed_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::{trimmed_base_url, truncate};

    #[test]
    fn truncate_appends_ellipsis_only_when_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn base_url_loses_trailing_slashes() {
        assert_eq!(trimmed_base_url(" http://localhost:11434/ "), "http://localhost:11434");
    }
}
