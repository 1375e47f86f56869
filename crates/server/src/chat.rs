use std::sync::Arc;

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use merryway_agent::AgentRuntime;
use merryway_core::domain::message::Envelope;
use tracing::debug;

pub const CHAT_PATH: &str = "/api/v1/chat";

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route(CHAT_PATH, post(chat)).with_state(ChatState { runtime })
}

/// Always answers 200; failures are reported inside the envelope.
pub async fn chat(State(state): State<ChatState>, body: Bytes) -> Json<Envelope> {
    debug!(event_name = "server.chat.received", bytes = body.len(), "chat request received");
    Json(state.runtime.handle_payload(&body).await)
}
