use std::sync::Arc;

use async_trait::async_trait;
use merryway_core::domain::memory::{AgentName, Memory, OrderStep, OrderTakingMemory};
use merryway_core::domain::menu::Menu;
use merryway_core::domain::message::{Envelope, Message};
use merryway_core::domain::order::{
    merge_orders, order_total, parse_order_lines, OrderLine, RepeatItemPrice,
};
use merryway_core::errors::ApplicationError;
use merryway_core::transcript::{latest_user_message, recover_order_state};
use serde_json::Value;
use tracing::{info, warn};

use crate::agents::{Agent, RecommendationAgent, UNCLEAR_REQUEST};
use crate::llm::CompletionHandle;
use crate::output::OrderTakingOutput;
use crate::prompts;

pub const ORDER_ERROR: &str =
    "I apologize, but I encountered an error processing your order. Could you please try again?";

/// Multi-turn order conversation over the fixed menu.
///
/// The running order lives in the memory of this agent's previous envelope.
/// New lines from each turn are merged into it by item name, and one
/// order-attached recommendation is appended the first time the order is
/// non-empty.
pub struct OrderTakingAgent {
    completion: CompletionHandle,
    menu: Menu,
    recommender: Arc<RecommendationAgent>,
    repeat_item_price: RepeatItemPrice,
}

impl OrderTakingAgent {
    pub fn new(
        completion: CompletionHandle,
        menu: Menu,
        recommender: Arc<RecommendationAgent>,
        repeat_item_price: RepeatItemPrice,
    ) -> Self {
        Self { completion, menu, recommender, repeat_item_price }
    }

    fn merge(&self, current: &[OrderLine], entries: &[Value]) -> Vec<OrderLine> {
        let parsed = parse_order_lines(entries);
        for rejected in &parsed.rejected {
            warn!(
                event_name = "agent.order_taking.line_rejected",
                error = %rejected,
                "dropping malformed order line"
            );
        }

        if parsed.lines.is_empty() {
            return current.to_vec();
        }
        merge_orders(current, &parsed.lines, self.repeat_item_price)
    }

    /// Keeps the recovered order and recommendation flag and restarts at step 1.
    fn fallback(state: OrderTakingMemory, error: &ApplicationError) -> Envelope {
        warn!(
            event_name = "agent.order_taking.fallback",
            error_class = error.error_class(),
            error = %error,
            preserved_lines = state.order.len(),
            "order turn failed, keeping recovered order"
        );
        Envelope::new(
            ORDER_ERROR,
            Memory::order_taking(OrderTakingMemory { step: OrderStep::INITIAL, ..state }),
        )
    }
}

#[async_trait]
impl Agent for OrderTakingAgent {
    fn name(&self) -> AgentName {
        AgentName::OrderTaking
    }

    async fn respond(&self, transcript: &[Message]) -> Envelope {
        let Some(user_message) = latest_user_message(transcript) else {
            return Envelope::new(
                UNCLEAR_REQUEST,
                Memory::order_taking(OrderTakingMemory::default()),
            );
        };

        let state = recover_order_state(transcript);
        let request = prompts::order_taking(&self.menu, state.step, &state.order, user_message);
        let decoded =
            self.completion.json::<OrderTakingOutput>(AgentName::OrderTaking, request).await;
        let output = match decoded {
            Ok(output) => output,
            Err(error) => return Self::fallback(state, &error),
        };
        let entries = match output.order_entries() {
            Ok(entries) => entries,
            Err(error) => return Self::fallback(state, &error),
        };

        let order = self.merge(&state.order, &entries);
        let mut content = output.response;
        let mut asked_recommendation_before = state.asked_recommendation_before;

        if !asked_recommendation_before && !order.is_empty() {
            let upsell = self.recommender.recommend_for_order(&order).await;
            content = if content.trim().is_empty() {
                upsell
            } else {
                format!("{content}\n\n{upsell}")
            };
            asked_recommendation_before = true;
        }

        info!(
            event_name = "agent.order_taking.turn",
            step = %output.step,
            lines = order.len(),
            total = %order_total(&order),
            asked_recommendation_before,
            "order updated"
        );

        Envelope::new(
            content,
            Memory::order_taking(OrderTakingMemory {
                step: output.step,
                order,
                asked_recommendation_before,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use merryway_core::domain::memory::{AgentMemory, Memory, OrderStep, OrderTakingMemory};
    use merryway_core::domain::menu::Menu;
    use merryway_core::domain::message::{Envelope, Message};
    use merryway_core::domain::order::{OrderLine, RepeatItemPrice};
    use merryway_core::recommendations::RecommendationCatalog;
    use rust_decimal::Decimal;

    use super::{OrderTakingAgent, ORDER_ERROR};
    use crate::agents::recommendation::ORDER_NO_RESULTS;
    use crate::agents::{Agent, RecommendationAgent, UNCLEAR_REQUEST};
    use crate::testing::ScriptedCompletion;

    fn agent(replies: &[&str]) -> (Arc<ScriptedCompletion>, OrderTakingAgent) {
        let (completion, handle) = ScriptedCompletion::replies(replies);
        let recommender = Arc::new(RecommendationAgent::new(
            handle.clone(),
            Arc::new(RecommendationCatalog::default()),
        ));
        let agent = OrderTakingAgent::new(
            handle,
            Menu::merrys_way(),
            recommender,
            RepeatItemPrice::default(),
        );
        (completion, agent)
    }

    fn lattes(quantity: u32) -> OrderLine {
        OrderLine::new("Latte", quantity, Decimal::new(475, 2))
    }

    fn order_memory(envelope: &Envelope) -> &OrderTakingMemory {
        match envelope.memory.as_agent() {
            Some(AgentMemory::OrderTaking(memory)) => memory,
            other => panic!("expected order-taking memory, got {other:?}"),
        }
    }

    fn prior_turn(step: u8, order: Vec<OrderLine>, asked: bool) -> Message {
        Message::assistant(
            "Anything else?",
            Some(Memory::order_taking(OrderTakingMemory {
                step: OrderStep::new(step).expect("step"),
                order,
                asked_recommendation_before: asked,
            })),
        )
    }

    #[tokio::test]
    async fn first_non_empty_order_gets_one_recommendation() {
        let (completion, agent) = agent(&[
            r#"{"chain of thought": "", "step number": "2", "order": [{"item": "Latte", "quantity": 2, "price": 4.75}], "response": "Two lattes! Anything else?"}"#,
        ]);

        let envelope = agent.respond(&[Message::user("I'd like 2 lattes")]).await;

        assert_eq!(envelope.content, format!("Two lattes! Anything else?\n\n{ORDER_NO_RESULTS}"));
        let memory = order_memory(&envelope);
        assert_eq!(memory.step.get(), 2);
        assert_eq!(memory.order, vec![lattes(2)]);
        assert!(memory.asked_recommendation_before);
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn repeated_item_is_merged_and_flag_never_resets() {
        let (completion, agent) = agent(&[
            r#"{"chain of thought": "", "step number": "4", "order": "[{\"item\": \"Latte\", \"quantity\": 1, \"price\": 4.75}]", "response": "Three lattes now."}"#,
        ]);
        let transcript = vec![
            Message::user("2 lattes"),
            prior_turn(2, vec![lattes(2)], true),
            Message::user("one more latte"),
        ];

        let envelope = agent.respond(&transcript).await;

        assert_eq!(envelope.content, "Three lattes now.");
        let memory = order_memory(&envelope);
        assert_eq!(memory.order, vec![lattes(3)]);
        assert!(memory.asked_recommendation_before);
        assert!(completion.prompt(0).contains("Step number: 2"));
    }

    #[tokio::test]
    async fn closing_turn_keeps_order_when_no_new_items() {
        let (_, agent) = agent(&[
            r#"{"chain of thought": "", "step number": "6", "order": [], "response": "2 x Latte - $9.50. Thank you!"}"#,
        ]);
        let transcript = vec![
            Message::user("I'd like 2 lattes"),
            prior_turn(2, vec![lattes(2)], true),
            Message::user("that's all"),
        ];

        let envelope = agent.respond(&transcript).await;

        let memory = order_memory(&envelope);
        assert_eq!(memory.step, OrderStep::FINAL);
        assert_eq!(memory.order, vec![lattes(2)]);
    }

    #[tokio::test]
    async fn null_order_keeps_current_lines_and_takes_new_step() {
        let (_, agent) = agent(&[
            r#"{"chain of thought": "", "step number": "3", "order": null, "response": "Anything else?"}"#,
        ]);
        let transcript = vec![prior_turn(2, vec![lattes(2)], true), Message::user("hmm")];

        let envelope = agent.respond(&transcript).await;

        assert_eq!(envelope.content, "Anything else?");
        let memory = order_memory(&envelope);
        assert_eq!(memory.step.get(), 3);
        assert_eq!(memory.order, vec![lattes(2)]);
        assert!(memory.asked_recommendation_before);
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped_individually() {
        let (_, agent) = agent(&[
            r#"{"chain of thought": "", "step number": "3", "order": [{"item": "Croissant", "quantity": "two", "price": 3.25}, {"item": "Croissant", "quantity": 1, "price": 3.25}], "response": "ok"}"#,
            r#"{"chain of thought": "", "step number": "3", "order": [{"item": "", "quantity": 1, "price": 3.25}], "response": "ok"}"#,
        ]);
        let transcript = vec![prior_turn(2, vec![lattes(1)], true), Message::user("and a croissant")];

        let partial = agent.respond(&transcript).await;
        assert_eq!(
            order_memory(&partial).order,
            vec![lattes(1), OrderLine::new("Croissant", 1, Decimal::new(325, 2))]
        );

        let none = agent.respond(&transcript).await;
        assert_eq!(order_memory(&none).order, vec![lattes(1)]);
    }

    #[tokio::test]
    async fn failed_turn_preserves_order_and_restarts_step() {
        let (_, agent) = agent(&["garbled", "still garbled"]);
        let transcript = vec![prior_turn(4, vec![lattes(2)], true), Message::user("and a scone")];

        let envelope = agent.respond(&transcript).await;

        assert_eq!(envelope.content, ORDER_ERROR);
        let memory = order_memory(&envelope);
        assert_eq!(memory.step, OrderStep::INITIAL);
        assert_eq!(memory.order, vec![lattes(2)]);
        assert!(memory.asked_recommendation_before);
    }

    #[tokio::test]
    async fn empty_message_returns_initial_memory() {
        let (completion, agent) = agent(&[]);

        let envelope = agent.respond(&[prior_turn(3, vec![lattes(1)], true)]).await;

        assert_eq!(envelope.content, UNCLEAR_REQUEST);
        assert_eq!(order_memory(&envelope), &OrderTakingMemory::default());
        assert_eq!(completion.calls(), 0);
    }
}
