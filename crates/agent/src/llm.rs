use std::sync::Arc;

use async_trait::async_trait;
use merryway_core::config::LlmConfig;
use merryway_core::errors::ApplicationError;

pub const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: PromptRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: PromptRole::User, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub safety_threshold: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 2000,
            safety_threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
        }
    }
}

impl From<&LlmConfig> for GenerationParams {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
            safety_threshold: config.safety_threshold.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    pub params: GenerationParams,
}

impl CompletionRequest {
    pub fn new(messages: Vec<PromptMessage>, params: GenerationParams) -> Self {
        Self { messages, params }
    }

    /// Every non-empty message joined by newlines, for providers that take a
    /// single prompt string.
    pub fn combined_prompt(&self) -> String {
        self.messages
            .iter()
            .map(|message| message.content.as_str())
            .filter(|content| !content.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn provider(&self) -> &'static str;
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ApplicationError>;
}

/// A completion client bound to the generation parameters every agent shares.
#[derive(Clone)]
pub struct CompletionHandle {
    client: Arc<dyn CompletionClient>,
    params: GenerationParams,
    repair_malformed_output: bool,
}

impl CompletionHandle {
    pub fn new(client: Arc<dyn CompletionClient>, params: GenerationParams) -> Self {
        Self { client, params, repair_malformed_output: true }
    }

    pub fn from_config(client: Arc<dyn CompletionClient>, config: &LlmConfig) -> Self {
        Self::new(client, GenerationParams::from(config))
            .with_repair(config.repair_malformed_output)
    }

    pub fn with_repair(mut self, enabled: bool) -> Self {
        self.repair_malformed_output = enabled;
        self
    }

    pub fn repair_enabled(&self) -> bool {
        self.repair_malformed_output
    }

    pub fn provider(&self) -> &'static str {
        self.client.provider()
    }

    pub async fn text(&self, messages: Vec<PromptMessage>) -> Result<String, ApplicationError> {
        let request = CompletionRequest::new(messages, self.params.clone());
        self.client.complete(&request).await
    }
}
