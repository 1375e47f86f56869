//! Strict decoding of structured completion output.
//!
//! Agents that need a decision from the completion service ask for a JSON
//! object with fixed keys. The text is unwrapped from any code fence and
//! decoded into a typed record; unknown enum values and missing keys are
//! rejected so the calling agent can fall back to its safe default.

use merryway_core::domain::memory::{AgentName, AgentTarget, GuardDecision, OrderStep};
use merryway_core::errors::ApplicationError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{CompletionHandle, PromptMessage};
use crate::prompts;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GuardOutput {
    #[serde(rename = "chain of thought")]
    pub chain_of_thought: String,
    pub decision: GuardDecision,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClassificationOutput {
    #[serde(rename = "chain of thought")]
    pub chain_of_thought: String,
    pub decision: AgentTarget,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OrderTakingOutput {
    #[serde(rename = "chain of thought")]
    pub chain_of_thought: String,
    #[serde(rename = "step number")]
    pub step: OrderStep,
    pub order: Value,
    pub response: String,
}

impl OrderTakingOutput {
    /// Raw order entries. The service sometimes returns the array JSON-encoded
    /// inside a string, or null when nothing has been ordered yet.
    pub fn order_entries(&self) -> Result<Vec<Value>, ApplicationError> {
        let malformed = |reason: String| ApplicationError::malformed(AgentName::OrderTaking, reason);

        match &self.order {
            Value::Array(entries) => Ok(entries.clone()),
            Value::Null => Ok(Vec::new()),
            Value::String(encoded) if encoded.trim().is_empty() => Ok(Vec::new()),
            Value::String(encoded) => match serde_json::from_str::<Value>(encoded.trim()) {
                Ok(Value::Array(entries)) => Ok(entries),
                Ok(other) => Err(malformed(format!("order string holds {}", kind(&other)))),
                Err(error) => Err(malformed(format!("order string is not JSON: {error}"))),
            },
            other => Err(malformed(format!("order must be an array, got {}", kind(other)))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum RecommendationType {
    #[serde(rename = "apriori")]
    Apriori,
    #[serde(rename = "popular")]
    Popular,
    #[serde(rename = "popular by category")]
    PopularByCategory,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RecommendationClassificationOutput {
    #[serde(rename = "chain of thought")]
    pub chain_of_thought: String,
    pub recommendation_type: RecommendationType,
    pub parameters: Vec<String>,
}

/// Removes a surrounding ``` or ```json fence, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|ch: char| ch.is_ascii_alphanumeric()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn decode<T: DeserializeOwned>(agent: AgentName, raw: &str) -> Result<T, ApplicationError> {
    serde_json::from_str::<T>(strip_code_fence(raw))
        .map_err(|error| ApplicationError::malformed(agent, error.to_string()))
}

fn is_json_syntax_error(raw: &str) -> bool {
    serde_json::from_str::<Value>(strip_code_fence(raw)).is_err()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl CompletionHandle {
    /// Requests a completion and decodes it into `T`.
    ///
    /// Text that is not valid JSON gets one repair request when repair is
    /// enabled. Valid JSON with the wrong shape fails right away.
    pub async fn json<T: DeserializeOwned>(
        &self,
        agent: AgentName,
        messages: Vec<PromptMessage>,
    ) -> Result<T, ApplicationError> {
        let raw = self.text(messages).await?;
        let error = match decode::<T>(agent, &raw) {
            Ok(output) => return Ok(output),
            Err(error) => error,
        };

        if !self.repair_enabled() || !is_json_syntax_error(&raw) {
            warn!(
                event_name = "agent.output.malformed",
                agent = %agent,
                error = %error,
                raw = %raw,
                "completion output rejected"
            );
            return Err(error);
        }

        info!(event_name = "agent.output.repair", agent = %agent, "requesting json repair");
        let repaired = self.text(vec![PromptMessage::user(prompts::json_repair(&raw))]).await?;
        decode::<T>(agent, &repaired).map_err(|error| {
            warn!(
                event_name = "agent.output.repair_failed",
                agent = %agent,
                error = %error,
                raw = %repaired,
                "repaired output still malformed"
            );
            error
        })
    }
}
