use std::sync::Arc;

use merryway_core::config::AppConfig;
use merryway_core::domain::memory::{AgentMemory, AgentTarget, Memory};
use merryway_core::domain::menu::Menu;
use merryway_core::domain::message::{ChatRequest, Envelope, Message};
use merryway_core::domain::order::RepeatItemPrice;
use merryway_core::errors::ApplicationError;
use merryway_core::recommendations::RecommendationCatalog;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agents::details::RetrievalSettings;
use crate::agents::{
    Agent, ClassificationAgent, DetailsAgent, GuardAgent, OrderTakingAgent, RecommendationAgent,
};
use crate::llm::CompletionHandle;
use crate::providers::{LanguageModels, PineconeIndex};
use crate::registry::AgentRegistry;
use crate::retrieval::{EmbeddingClient, VectorIndex};

/// Collaborators needed to wire the standard five-agent pipeline.
pub struct RuntimeParts {
    pub completion: CompletionHandle,
    pub embedding: Arc<dyn EmbeddingClient>,
    pub index: Arc<dyn VectorIndex>,
    pub catalog: Arc<RecommendationCatalog>,
    pub retrieval: RetrievalSettings,
    pub menu: Menu,
    pub repeat_item_price: RepeatItemPrice,
}

/// Guard, then classification, then the chosen specialized agent.
pub struct AgentRuntime {
    guard: Arc<dyn Agent>,
    classifier: Arc<dyn Agent>,
    registry: AgentRegistry,
}

impl AgentRuntime {
    pub fn new(guard: Arc<dyn Agent>, classifier: Arc<dyn Agent>, registry: AgentRegistry) -> Self {
        Self { guard, classifier, registry }
    }

    pub fn assemble(parts: RuntimeParts) -> Self {
        let recommender =
            Arc::new(RecommendationAgent::new(parts.completion.clone(), parts.catalog));
        let details = DetailsAgent::new(
            parts.completion.clone(),
            parts.embedding,
            parts.index,
            parts.retrieval,
        );
        let order_taking = OrderTakingAgent::new(
            parts.completion.clone(),
            parts.menu,
            recommender.clone(),
            parts.repeat_item_price,
        );

        let registry = AgentRegistry::default()
            .with(AgentTarget::Details, Arc::new(details))
            .with(AgentTarget::OrderTaking, Arc::new(order_taking))
            .with(AgentTarget::Recommendation, recommender);

        Self::new(
            Arc::new(GuardAgent::new(parts.completion.clone())),
            Arc::new(ClassificationAgent::new(parts.completion)),
            registry,
        )
    }

    /// Builds HTTP-backed providers from validated configuration.
    pub fn from_config(
        config: &AppConfig,
        catalog: Arc<RecommendationCatalog>,
    ) -> Result<Self, ApplicationError> {
        let models = LanguageModels::from_config(&config.llm)?;
        let index = Arc::new(PineconeIndex::from_config(&config.vector, &config.llm)?);
        info!(
            event_name = "agent.runtime.configured",
            provider = config.llm.provider.as_str(),
            model = %config.llm.model,
            namespace = %config.vector.namespace,
            "agent runtime configured"
        );

        Ok(Self::assemble(RuntimeParts {
            completion: CompletionHandle::from_config(models.completion, &config.llm),
            embedding: models.embedding,
            index,
            catalog,
            retrieval: RetrievalSettings::from(&config.vector),
            menu: Menu::merrys_way(),
            repeat_item_price: config.ordering.repeat_item_price,
        }))
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Entry point for a raw request body.
    pub async fn handle_payload(&self, body: &[u8]) -> Envelope {
        match serde_json::from_slice::<Value>(body) {
            Ok(payload) => self.handle_request(&payload).await,
            Err(source) => {
                let correlation_id = Uuid::new_v4().to_string();
                input_format_failure(&correlation_id, source.to_string())
            }
        }
    }

    /// Entry point for a decoded `{"input": {"messages": [...]}}` payload.
    pub async fn handle_request(&self, payload: &Value) -> Envelope {
        let correlation_id = Uuid::new_v4().to_string();
        match ChatRequest::deserialize(payload) {
            Ok(request) => self.dispatch_in_span(&request.input.messages, correlation_id).await,
            Err(source) => input_format_failure(&correlation_id, source.to_string()),
        }
    }

    pub async fn respond(&self, transcript: &[Message]) -> Envelope {
        self.dispatch_in_span(transcript, Uuid::new_v4().to_string()).await
    }

    async fn dispatch_in_span(&self, transcript: &[Message], correlation_id: String) -> Envelope {
        let span = info_span!("dispatch", correlation_id = %correlation_id);
        self.dispatch(transcript, &correlation_id).instrument(span).await
    }

    async fn dispatch(&self, transcript: &[Message], correlation_id: &str) -> Envelope {
        info!(
            event_name = "agent.dispatch.started",
            correlation_id,
            messages = transcript.len(),
            "dispatching request"
        );

        let guard = self.guard.respond(transcript).await;
        let allowed = matches!(
            guard.memory.as_agent(),
            Some(AgentMemory::Guard { guard_decision }) if guard_decision.is_allowed()
        );
        if !allowed {
            info!(event_name = "agent.guard.short_circuit", correlation_id, "request blocked");
            return guard;
        }

        let classification = self.classifier.respond(transcript).await;
        let target = match classification.memory.as_agent() {
            Some(AgentMemory::Classification { classification_decision }) => {
                *classification_decision
            }
            _ => {
                warn!(
                    event_name = "agent.dispatch.unclassified",
                    correlation_id,
                    "classifier returned no decision, using fallback target"
                );
                ClassificationAgent::FALLBACK_TARGET
            }
        };
        info!(event_name = "agent.dispatch.classified", correlation_id, target = %target);

        let Some(agent) = self.registry.get(target) else {
            let failure =
                ApplicationError::Configuration(format!("no agent registered for {target}"));
            error!(
                event_name = "agent.dispatch.unroutable",
                correlation_id,
                error = %failure,
                "dispatch failed"
            );
            return failure_envelope(&failure);
        };

        let envelope = agent.respond(transcript).await;
        info!(
            event_name = "agent.dispatch.completed",
            correlation_id,
            agent = %agent.name(),
            "request handled"
        );
        envelope
    }
}

fn input_format_failure(correlation_id: &str, reason: String) -> Envelope {
    let failure = ApplicationError::InputFormat(reason);
    warn!(
        event_name = "agent.dispatch.invalid_input",
        correlation_id,
        error = %failure,
        "rejected malformed request"
    );
    failure_envelope(&failure)
}

pub fn failure_envelope(error: &ApplicationError) -> Envelope {
    Envelope::new(error.user_message(), Memory::failure(error.to_string()))
}
