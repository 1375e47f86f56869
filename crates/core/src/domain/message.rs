use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::domain::memory::{AgentName, Memory};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Memory>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), memory: None }
    }

    pub fn assistant(content: impl Into<String>, memory: Option<Memory>) -> Self {
        Self { role: Role::Assistant, content: content.into(), memory }
    }

    pub fn memory_agent(&self) -> Option<AgentName> {
        self.memory.as_ref().and_then(Memory::agent)
    }
}

/// The single output every agent (and the dispatcher) produces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub role: Role,
    pub content: String,
    pub memory: Memory,
}

impl Envelope {
    pub fn new(content: impl Into<String>, memory: Memory) -> Self {
        Self { role: Role::Assistant, content: content.into(), memory }
    }

    pub fn agent(&self) -> Option<AgentName> {
        self.memory.agent()
    }

    pub fn into_message(self) -> Message {
        Message::assistant(self.content, Some(self.memory))
    }
}

/// Inbound payload: `{"input": {"messages": [...]}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub input: ChatInput,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatInput {
    #[serde(deserialize_with = "messages_with_role")]
    pub messages: Vec<Message>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Transcript entry as sent by callers; the role may be absent or null.
#[derive(Deserialize)]
struct InboundMessage {
    #[serde(default)]
    role: Option<Role>,
    #[serde(default, deserialize_with = "null_as_empty")]
    content: String,
    #[serde(default)]
    memory: Option<Memory>,
}

/// Entries without a role cannot be attributed to either side and are skipped.
/// An unrecognised role still rejects the payload.
fn messages_with_role<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Message>, D::Error> {
    let inbound = Vec::<InboundMessage>::deserialize(deserializer)?;
    let total = inbound.len();
    let messages: Vec<Message> = inbound
        .into_iter()
        .filter_map(|entry| {
            entry.role.map(|role| Message { role, content: entry.content, memory: entry.memory })
        })
        .collect();

    if messages.len() < total {
        warn!(
            event_name = "transcript.message.role_missing",
            skipped = total - messages.len(),
            "skipped transcript entries without a role"
        );
    }
    Ok(messages)
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { input: ChatInput { messages } }
    }
}
