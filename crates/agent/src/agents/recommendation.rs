use std::sync::Arc;

use async_trait::async_trait;
use merryway_core::domain::memory::{AgentName, Memory};
use merryway_core::domain::message::{Envelope, Message};
use merryway_core::domain::order::OrderLine;
use merryway_core::recommendations::{
    RecommendationCatalog, ORDER_ATTACHED_LIMIT, STANDALONE_LIMIT,
};
use merryway_core::transcript::latest_user_message;
use tracing::{info, warn};

use crate::agents::{Agent, AGENT_ERROR, UNCLEAR_REQUEST};
use crate::llm::CompletionHandle;
use crate::output::{RecommendationClassificationOutput, RecommendationType};
use crate::prompts;

pub const UNCLEAR_KIND: &str = "I'm having trouble understanding what kind of recommendation you need. Could you please try asking in a different way?";
pub const NO_RESULTS: &str = "I couldn't find any recommendations based on your request. Could you please try asking in a different way?";
pub const ORDER_NO_RESULTS: &str = "Would you like anything else with your order? We have a variety of pastries and drinks that might interest you!";
pub const ORDER_FALLBACK: &str = "Would you like to try one of our fresh pastries with your order? They go perfectly with our drinks!";

/// Suggests products from the static apriori and popularity data.
pub struct RecommendationAgent {
    completion: CompletionHandle,
    catalog: Arc<RecommendationCatalog>,
}

impl RecommendationAgent {
    pub fn new(completion: CompletionHandle, catalog: Arc<RecommendationCatalog>) -> Self {
        Self { completion, catalog }
    }

    fn lookup(&self, kind: &RecommendationClassificationOutput) -> Vec<String> {
        match kind.recommendation_type {
            RecommendationType::Apriori => {
                self.catalog.apriori(&kind.parameters, STANDALONE_LIMIT)
            }
            RecommendationType::Popular => self.catalog.popular(STANDALONE_LIMIT, &[]),
            RecommendationType::PopularByCategory => {
                self.catalog.popular_by_category(&kind.parameters, STANDALONE_LIMIT)
            }
        }
    }

    /// An upsell line for the merged order. Always produces text.
    pub async fn recommend_for_order(&self, order: &[OrderLine]) -> String {
        let ordered: Vec<String> = order.iter().map(|line| line.item.clone()).collect();

        let mut picks = self.catalog.apriori(&ordered, ORDER_ATTACHED_LIMIT);
        if picks.is_empty() {
            picks = self.catalog.popular(ORDER_ATTACHED_LIMIT, &ordered);
        }
        if picks.is_empty() {
            return ORDER_NO_RESULTS.to_string();
        }

        match self.completion.text(prompts::order_recommendation(&ordered, &picks)).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => ORDER_FALLBACK.to_string(),
            Err(error) => {
                warn!(
                    event_name = "agent.recommendation.order_upsell_failed",
                    error_class = error.error_class(),
                    error = %error
                );
                ORDER_FALLBACK.to_string()
            }
        }
    }
}

fn reply(content: impl Into<String>) -> Envelope {
    Envelope::new(content, Memory::recommendation())
}

#[async_trait]
impl Agent for RecommendationAgent {
    fn name(&self) -> AgentName {
        AgentName::Recommendation
    }

    async fn respond(&self, transcript: &[Message]) -> Envelope {
        let Some(user_message) = latest_user_message(transcript) else {
            return reply(UNCLEAR_REQUEST);
        };

        let products = self.catalog.products();
        let categories = self.catalog.categories();
        let request = prompts::recommendation_classification(&products, &categories, user_message);
        let kind = match self
            .completion
            .json::<RecommendationClassificationOutput>(AgentName::Recommendation, request)
            .await
        {
            Ok(kind) => kind,
            Err(error) => {
                warn!(
                    event_name = "agent.recommendation.classification_failed",
                    error_class = error.error_class(),
                    error = %error
                );
                return reply(UNCLEAR_KIND);
            }
        };

        let picks = self.lookup(&kind);
        info!(
            event_name = "agent.recommendation.lookup",
            recommendation_type = ?kind.recommendation_type,
            results = picks.len()
        );
        if picks.is_empty() {
            return reply(NO_RESULTS);
        }

        match self.completion.text(prompts::recommendation(user_message, &picks)).await {
            Ok(text) => reply(text),
            Err(error) => {
                warn!(
                    event_name = "agent.recommendation.completion_failed",
                    error_class = error.error_class(),
                    error = %error
                );
                reply(AGENT_ERROR)
            }
        }
    }
}
