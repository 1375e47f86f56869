use async_trait::async_trait;
use merryway_core::domain::memory::{AgentName, GuardDecision, Memory};
use merryway_core::domain::message::{Envelope, Message};
use merryway_core::transcript::latest_user_message;
use tracing::{info, warn};

use crate::agents::{Agent, AGENT_ERROR, UNCLEAR_REQUEST};
use crate::llm::CompletionHandle;
use crate::output::GuardOutput;
use crate::prompts;

const DEFAULT_REFUSAL: &str =
    "Sorry, I can only help with questions about Merry's way and your order.";

/// Content moderation: decides whether the latest message is in scope.
pub struct GuardAgent {
    completion: CompletionHandle,
}

impl GuardAgent {
    pub fn new(completion: CompletionHandle) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl Agent for GuardAgent {
    fn name(&self) -> AgentName {
        AgentName::Guard
    }

    async fn respond(&self, transcript: &[Message]) -> Envelope {
        let Some(user_message) = latest_user_message(transcript) else {
            return Envelope::new(UNCLEAR_REQUEST, Memory::guard(GuardDecision::NotAllowed));
        };

        let request = prompts::guard(user_message);
        match self.completion.json::<GuardOutput>(AgentName::Guard, request).await {
            Ok(output) if output.decision.is_allowed() => {
                Envelope::new("", Memory::guard(GuardDecision::Allowed))
            }
            Ok(output) => {
                info!(event_name = "agent.guard.blocked", "message outside coffee-shop scope");
                let refusal = if output.message.trim().is_empty() {
                    DEFAULT_REFUSAL.to_string()
                } else {
                    output.message
                };
                Envelope::new(refusal, Memory::guard(GuardDecision::NotAllowed))
            }
            Err(error) => {
                warn!(
                    event_name = "agent.guard.fallback",
                    error_class = error.error_class(),
                    error = %error,
                    "guard failed closed"
                );
                Envelope::new(AGENT_ERROR, Memory::guard(GuardDecision::NotAllowed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use merryway_core::domain::memory::{GuardDecision, Memory};
    use merryway_core::domain::message::Message;

    use super::GuardAgent;
    use crate::agents::{Agent, AGENT_ERROR, UNCLEAR_REQUEST};
    use crate::testing::ScriptedCompletion;

    #[tokio::test]
    async fn allowed_message_has_empty_content() {
        let (_, handle) = ScriptedCompletion::replies(&[
            r#"{"chain of thought": "menu question", "decision": "allowed", "message": ""}"#,
        ]);

        let envelope = GuardAgent::new(handle).respond(&[Message::user("Any scones?")]).await;

        assert_eq!(envelope.content, "");
        assert_eq!(envelope.memory, Memory::guard(GuardDecision::Allowed));
    }

    #[tokio::test]
    async fn refusal_carries_service_message() {
        let (_, handle) = ScriptedCompletion::replies(&[
            r#"{"chain of thought": "off topic", "decision": "not allowed", "message": "I can only help with coffee."}"#,
        ]);

        let envelope =
            GuardAgent::new(handle).respond(&[Message::user("Who won the match?")]).await;

        assert_eq!(envelope.content, "I can only help with coffee.");
        assert_eq!(envelope.memory, Memory::guard(GuardDecision::NotAllowed));
    }

    #[tokio::test]
    async fn empty_message_is_refused_without_a_call() {
        let (completion, handle) = ScriptedCompletion::replies(&[]);

        let envelope = GuardAgent::new(handle).respond(&[Message::user("   ")]).await;

        assert_eq!(envelope.content, UNCLEAR_REQUEST);
        assert_eq!(envelope.memory, Memory::guard(GuardDecision::NotAllowed));
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_output_fails_closed() {
        let (_, handle) = ScriptedCompletion::replies(&[
            r#"{"chain of thought": "", "decision": "sure", "message": ""}"#,
        ]);

        let envelope = GuardAgent::new(handle).respond(&[Message::user("Latte please")]).await;

        assert_eq!(envelope.content, AGENT_ERROR);
        assert_eq!(envelope.memory, Memory::guard(GuardDecision::NotAllowed));
    }
}
