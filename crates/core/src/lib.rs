pub mod config;
pub mod domain;
pub mod errors;
pub mod recommendations;
pub mod transcript;

pub use domain::memory::{
    AgentMemory, AgentName, AgentTarget, GuardDecision, Memory, OrderStep, OrderTakingMemory,
};
pub use domain::menu::{Menu, MenuItem};
pub use domain::message::{ChatInput, ChatRequest, Envelope, Message, Role};
pub use domain::order::{merge_orders, order_total, OrderLine, RepeatItemPrice};
pub use errors::{ApplicationError, DomainError};
pub use recommendations::{AprioriEntry, PopularProduct, RecommendationCatalog};
pub use transcript::{latest_user_message, recover_order_state, recover_state};
