use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use merryway_core::recommendations::RecommendationCatalog;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    catalog: Arc<RecommendationCatalog>,
    agents: usize,
    provider: &'static str,
}

impl HealthState {
    pub fn new(catalog: Arc<RecommendationCatalog>, agents: usize, provider: &'static str) -> Self {
        Self { catalog, agents, provider }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub recommendations: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let recommendations = recommendations_check(&state.catalog);
    let ready = recommendations.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("{} agents registered, llm provider {}", state.agents, state.provider),
        },
        recommendations,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn recommendations_check(catalog: &RecommendationCatalog) -> HealthCheck {
    let detail = format!(
        "{} apriori items, {} popular products",
        catalog.apriori_len(),
        catalog.popular_len()
    );
    // Either dataset missing means some recommendation kinds only answer "no results".
    let status = if catalog.apriori_len() > 0 && catalog.popular_len() > 0 {
        "ready"
    } else {
        "degraded"
    };
    HealthCheck { status, detail }
}
