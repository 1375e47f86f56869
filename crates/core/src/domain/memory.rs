//! Per-envelope memory records.
//!
//! Memory is how the assistant carries state between turns without a session
//! store: every envelope tags its memory with the producing agent, and the
//! next request re-reads those tags from the transcript the caller sends back.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::domain::order::{parse_order_lines, OrderLine};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentName {
    #[serde(rename = "guard_agent")]
    Guard,
    #[serde(rename = "classification_agent")]
    Classification,
    #[serde(rename = "details_agent")]
    Details,
    #[serde(rename = "order_taking_agent")]
    OrderTaking,
    #[serde(rename = "recommendation_agent")]
    Recommendation,
}

impl AgentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guard => "guard_agent",
            Self::Classification => "classification_agent",
            Self::Details => "details_agent",
            Self::OrderTaking => "order_taking_agent",
            Self::Recommendation => "recommendation_agent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "guard_agent" => Some(Self::Guard),
            "classification_agent" => Some(Self::Classification),
            "details_agent" => Some(Self::Details),
            "order_taking_agent" => Some(Self::OrderTaking),
            "recommendation_agent" => Some(Self::Recommendation),
            _ => None,
        }
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing targets the classification stage may choose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentTarget {
    #[serde(rename = "details_agent")]
    Details,
    #[serde(rename = "order_taking_agent")]
    OrderTaking,
    #[serde(rename = "recommendation_agent")]
    Recommendation,
}

impl AgentTarget {
    pub const ALL: [AgentTarget; 3] = [Self::Details, Self::OrderTaking, Self::Recommendation];

    pub fn agent_name(&self) -> AgentName {
        match self {
            Self::Details => AgentName::Details,
            Self::OrderTaking => AgentName::OrderTaking,
            Self::Recommendation => AgentName::Recommendation,
        }
    }
}

impl fmt::Display for AgentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name().as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardDecision {
    #[serde(rename = "allowed")]
    Allowed,
    #[serde(rename = "not allowed")]
    NotAllowed,
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Order-taking conversation phase, 1 (collecting) through 6 (closed).
///
/// Serialized as a string (`"step number": "3"`); decoding accepts either a
/// string or an integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderStep(u8);

impl OrderStep {
    pub const INITIAL: OrderStep = OrderStep(1);
    pub const FINAL: OrderStep = OrderStep(6);

    pub fn new(step: u8) -> Result<Self, DomainError> {
        if (Self::INITIAL.0..=Self::FINAL.0).contains(&step) {
            Ok(Self(step))
        } else {
            Err(DomainError::StepOutOfRange(step.to_string()))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let parsed = match value {
            Value::String(raw) => raw.trim().parse::<u8>().ok(),
            Value::Number(number) => number.as_u64().and_then(|step| u8::try_from(step).ok()),
            _ => None,
        };

        match parsed {
            Some(step) => Self::new(step),
            None => Err(DomainError::StepOutOfRange(value.to_string())),
        }
    }
}

impl Default for OrderStep {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for OrderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for OrderStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for OrderStep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// State the order-taking agent threads through the transcript.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawOrderTakingMemory")]
pub struct OrderTakingMemory {
    #[serde(rename = "step number")]
    pub step: OrderStep,
    pub order: Vec<OrderLine>,
    pub asked_recommendation_before: bool,
}

// Transcripts echo our own earlier memory back, possibly edited by the client,
// so decoding here never rejects the record: bad fields fall back to defaults.
#[derive(Debug, Default, Deserialize)]
struct RawOrderTakingMemory {
    #[serde(rename = "step number", default)]
    step: Option<Value>,
    #[serde(default)]
    order: Option<Value>,
    #[serde(default)]
    asked_recommendation_before: Option<Value>,
}

impl From<RawOrderTakingMemory> for OrderTakingMemory {
    fn from(raw: RawOrderTakingMemory) -> Self {
        let step = match raw.step.as_ref().map(OrderStep::from_value) {
            Some(Ok(step)) => step,
            Some(Err(error)) => {
                warn!(
                    event_name = "memory.order_taking.invalid_step",
                    error = %error,
                    "resetting recovered order step"
                );
                OrderStep::INITIAL
            }
            None => OrderStep::INITIAL,
        };

        let order = match raw.order {
            Some(Value::Array(values)) => {
                let parsed = parse_order_lines(&values);
                for rejected in &parsed.rejected {
                    warn!(
                        event_name = "memory.order_taking.invalid_line",
                        error = %rejected,
                        "dropping malformed order line from recovered memory"
                    );
                }
                parsed.lines
            }
            _ => Vec::new(),
        };

        let asked_recommendation_before = match raw.asked_recommendation_before {
            Some(Value::Bool(flag)) => flag,
            Some(Value::String(raw)) => raw.trim().eq_ignore_ascii_case("true"),
            _ => false,
        };

        Self { step, order, asked_recommendation_before }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "agent")]
pub enum AgentMemory {
    #[serde(rename = "guard_agent")]
    Guard { guard_decision: GuardDecision },
    #[serde(rename = "classification_agent")]
    Classification { classification_decision: AgentTarget },
    #[serde(rename = "details_agent")]
    Details {},
    #[serde(rename = "order_taking_agent")]
    OrderTaking(OrderTakingMemory),
    #[serde(rename = "recommendation_agent")]
    Recommendation {},
}

impl AgentMemory {
    pub fn agent(&self) -> AgentName {
        match self {
            Self::Guard { .. } => AgentName::Guard,
            Self::Classification { .. } => AgentName::Classification,
            Self::Details {} => AgentName::Details,
            Self::OrderTaking(_) => AgentName::OrderTaking,
            Self::Recommendation {} => AgentName::Recommendation,
        }
    }
}

/// The `memory` record attached to a message.
///
/// Anything that is neither an agent record nor a dispatcher failure record
/// is kept verbatim so it round-trips untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Memory {
    Agent(AgentMemory),
    Failure { error: String },
    Opaque(Value),
}

impl Memory {
    pub fn guard(decision: GuardDecision) -> Self {
        Self::Agent(AgentMemory::Guard { guard_decision: decision })
    }

    pub fn classification(target: AgentTarget) -> Self {
        Self::Agent(AgentMemory::Classification { classification_decision: target })
    }

    pub fn details() -> Self {
        Self::Agent(AgentMemory::Details {})
    }

    pub fn recommendation() -> Self {
        Self::Agent(AgentMemory::Recommendation {})
    }

    pub fn order_taking(memory: OrderTakingMemory) -> Self {
        Self::Agent(AgentMemory::OrderTaking(memory))
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure { error: error.into() }
    }

    pub fn agent(&self) -> Option<AgentName> {
        match self {
            Self::Agent(memory) => Some(memory.agent()),
            Self::Failure { .. } => None,
            Self::Opaque(value) => {
                value.get("agent").and_then(Value::as_str).and_then(AgentName::parse)
            }
        }
    }

    pub fn as_agent(&self) -> Option<&AgentMemory> {
        match self {
            Self::Agent(memory) => Some(memory),
            Self::Failure { .. } | Self::Opaque(_) => None,
        }
    }
}
