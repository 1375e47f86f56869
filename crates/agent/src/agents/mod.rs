pub mod classification;
pub mod details;
pub mod guard;
pub mod order_taking;
pub mod recommendation;

use async_trait::async_trait;
use merryway_core::domain::memory::AgentName;
use merryway_core::domain::message::{Envelope, Message};

pub use classification::ClassificationAgent;
pub use details::DetailsAgent;
pub use guard::GuardAgent;
pub use order_taking::OrderTakingAgent;
pub use recommendation::RecommendationAgent;

pub const UNCLEAR_REQUEST: &str =
    "I couldn't understand your request. Could you please try again?";
pub const AGENT_ERROR: &str =
    "I apologize, but I encountered an error. Could you please try again?";

/// A stateless transcript-to-envelope step.
///
/// Implementations recover whatever state they need from the transcript and
/// never fail: every error path ends in a well-formed envelope.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> AgentName;
    async fn respond(&self, transcript: &[Message]) -> Envelope;
}
