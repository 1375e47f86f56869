//! State recovery from the caller-supplied transcript.
//!
//! There is no session store. Every request re-derives what it needs by
//! walking the transcript from the newest message backward.

use crate::domain::memory::{AgentMemory, AgentName, OrderTakingMemory};
use crate::domain::message::{Message, Role};

/// Content of the most recent user message, if it has any non-blank text.
pub fn latest_user_message(transcript: &[Message]) -> Option<&str> {
    transcript
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.as_str())
        .filter(|content| !content.trim().is_empty())
}

/// The newest assistant memory produced by `agent`.
pub fn recover_state(transcript: &[Message], agent: AgentName) -> Option<&AgentMemory> {
    transcript
        .iter()
        .rev()
        .filter(|message| message.role == Role::Assistant)
        .filter_map(|message| message.memory.as_ref()?.as_agent())
        .find(|memory| memory.agent() == agent)
}

/// Order, step, and recommendation flag as of the last order-taking turn, or
/// the initial state when the conversation has none.
pub fn recover_order_state(transcript: &[Message]) -> OrderTakingMemory {
    match recover_state(transcript, AgentName::OrderTaking) {
        Some(AgentMemory::OrderTaking(memory)) => memory.clone(),
        _ => OrderTakingMemory::default(),
    }
}
