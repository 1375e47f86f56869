//! Agent runtime for the Merry's way assistant.
//!
//! Every request runs a fixed pipeline over the caller's transcript:
//! 1. **Guard** (`agents::guard`) - refuse messages outside the coffee shop's scope
//! 2. **Classification** (`agents::classification`) - pick the handling agent
//! 3. **Delegate** (`registry`) - details, order taking, or recommendation
//!
//! Agents are stateless. Conversation state (running order, step number,
//! whether an upsell was offered) is re-derived from the memory records of
//! earlier envelopes on each call.
//!
//! # Key Types
//!
//! - `AgentRuntime` - the dispatcher (see `runtime` module)
//! - `CompletionClient`, `EmbeddingClient`, `VectorIndex` - external service seams
//! - `Agent` - the transcript-to-envelope contract shared by all five agents

pub mod agents;
pub mod llm;
pub mod output;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod retrieval;
pub mod runtime;

#[cfg(test)]
mod testing;

pub use agents::Agent;
pub use llm::{CompletionClient, CompletionHandle};
pub use registry::AgentRegistry;
pub use runtime::{AgentRuntime, RuntimeParts};
