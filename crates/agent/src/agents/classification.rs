use async_trait::async_trait;
use merryway_core::domain::memory::{AgentName, AgentTarget, Memory};
use merryway_core::domain::message::{Envelope, Message};
use merryway_core::transcript::latest_user_message;
use tracing::warn;

use crate::agents::{Agent, AGENT_ERROR, UNCLEAR_REQUEST};
use crate::llm::CompletionHandle;
use crate::output::ClassificationOutput;
use crate::prompts;

/// Routes an allowed message to one of the specialized agents.
pub struct ClassificationAgent {
    completion: CompletionHandle,
}

impl ClassificationAgent {
    pub const FALLBACK_TARGET: AgentTarget = AgentTarget::Details;

    pub fn new(completion: CompletionHandle) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl Agent for ClassificationAgent {
    fn name(&self) -> AgentName {
        AgentName::Classification
    }

    async fn respond(&self, transcript: &[Message]) -> Envelope {
        let Some(user_message) = latest_user_message(transcript) else {
            return Envelope::new(UNCLEAR_REQUEST, Memory::classification(Self::FALLBACK_TARGET));
        };

        let request = prompts::classification(user_message);
        let decoded =
            self.completion.json::<ClassificationOutput>(AgentName::Classification, request).await;
        match decoded {
            Ok(output) => Envelope::new("", Memory::classification(output.decision)),
            Err(error) => {
                warn!(
                    event_name = "agent.classification.fallback",
                    error_class = error.error_class(),
                    error = %error,
                    fallback = %Self::FALLBACK_TARGET,
                    "classification failed, routing to fallback"
                );
                Envelope::new(AGENT_ERROR, Memory::classification(Self::FALLBACK_TARGET))
            }
        }
    }
}
