use thiserror::Error;

use crate::domain::memory::AgentName;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("order line is missing an item name")]
    MissingItemName,
    #[error("order line `{item}` has an invalid quantity: {value}")]
    InvalidQuantity { item: String, value: String },
    #[error("order line `{item}` has an invalid price: {value}")]
    InvalidPrice { item: String, value: String },
    #[error("order step must be in range 1..=6, got {0}")]
    StepOutOfRange(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid input format: {0}")]
    InputFormat(String),
    #[error("malformed output from {agent}: {reason}")]
    MalformedAgentOutput { agent: AgentName, reason: String },
    #[error("{service} call failed: {message}")]
    ExternalService { service: &'static str, message: String },
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn malformed(agent: AgentName, reason: impl Into<String>) -> Self {
        Self::MalformedAgentOutput { agent, reason: reason.into() }
    }

    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalService { service, message: message.into() }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain",
            Self::InputFormat(_) => "input_format",
            Self::MalformedAgentOutput { .. } => "malformed_agent_output",
            Self::ExternalService { .. } => "external_service",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InputFormat(_) => {
                "I apologize, but I encountered an error with the input format. Please try again."
            }
            Self::Domain(_)
            | Self::MalformedAgentOutput { .. }
            | Self::ExternalService { .. }
            | Self::Configuration(_) => "I apologize, but I encountered an error. Please try again.",
        }
    }
}
