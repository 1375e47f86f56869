use std::sync::Arc;

use async_trait::async_trait;
use merryway_core::config::VectorConfig;
use merryway_core::domain::memory::{AgentName, Memory};
use merryway_core::domain::message::{Envelope, Message};
use merryway_core::transcript::latest_user_message;
use tracing::{debug, warn};

use crate::agents::{Agent, AGENT_ERROR, UNCLEAR_REQUEST};
use crate::llm::CompletionHandle;
use crate::prompts;
use crate::retrieval::{join_match_text, EmbeddingClient, VectorIndex, VectorQuery};

pub const EMBEDDING_UNAVAILABLE: &str =
    "I apologize, but I'm having trouble processing your request. Could you please try again?";
pub const NOTHING_FOUND: &str = "I apologize, but I couldn't find the information you're looking for. Could you please try asking in a different way?";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievalSettings {
    pub namespace: String,
    pub top_k: u32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { namespace: "ns1".to_string(), top_k: 2 }
    }
}

impl From<&VectorConfig> for RetrievalSettings {
    fn from(config: &VectorConfig) -> Self {
        Self { namespace: config.namespace.clone(), top_k: config.top_k }
    }
}

/// Answers shop and menu questions from retrieved knowledge-base passages.
pub struct DetailsAgent {
    completion: CompletionHandle,
    embedding: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    retrieval: RetrievalSettings,
}

impl DetailsAgent {
    pub fn new(
        completion: CompletionHandle,
        embedding: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        retrieval: RetrievalSettings,
    ) -> Self {
        Self { completion, embedding, index, retrieval }
    }

    async fn context_for(&self, vector: &[f32]) -> String {
        let query =
            VectorQuery { namespace: &self.retrieval.namespace, top_k: self.retrieval.top_k };
        match self.index.query(vector, query).await {
            Ok(matches) => {
                debug!(event_name = "agent.details.retrieved", matches = matches.len());
                join_match_text(&matches)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.details.search_failed",
                    error = %error,
                    "vector search failed, answering without context"
                );
                String::new()
            }
        }
    }
}

fn reply(content: impl Into<String>) -> Envelope {
    Envelope::new(content, Memory::details())
}

#[async_trait]
impl Agent for DetailsAgent {
    fn name(&self) -> AgentName {
        AgentName::Details
    }

    async fn respond(&self, transcript: &[Message]) -> Envelope {
        let Some(user_message) = latest_user_message(transcript) else {
            return reply(UNCLEAR_REQUEST);
        };

        let vector = match self.embedding.embed(user_message).await {
            Ok(vector) if !vector.is_empty() => vector,
            Ok(_) => {
                warn!(event_name = "agent.details.empty_embedding", "embedding came back empty");
                return reply(EMBEDDING_UNAVAILABLE);
            }
            Err(error) => {
                warn!(event_name = "agent.details.embedding_failed", error = %error);
                return reply(EMBEDDING_UNAVAILABLE);
            }
        };

        let context = self.context_for(&vector).await;
        if context.is_empty() {
            return reply(NOTHING_FOUND);
        }

        match self.completion.text(prompts::details(&context, user_message)).await {
            Ok(answer) => reply(answer),
            Err(error) => {
                warn!(
                    event_name = "agent.details.completion_failed",
                    error_class = error.error_class(),
                    error = %error
                );
                reply(AGENT_ERROR)
            }
        }
    }
}
