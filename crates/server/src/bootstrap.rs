use std::sync::Arc;

use merryway_agent::AgentRuntime;
use merryway_core::config::{AppConfig, ConfigError};
use merryway_core::errors::ApplicationError;
use merryway_core::recommendations::RecommendationCatalog;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<RecommendationCatalog>,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent runtime setup failed: {0}")]
    Runtime(#[source] ApplicationError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        "starting application bootstrap"
    );

    let catalog = Arc::new(RecommendationCatalog::load(
        &config.recommendations.apriori_path,
        &config.recommendations.popularity_path,
    ));
    let runtime = AgentRuntime::from_config(&config, catalog.clone())
        .map_err(BootstrapError::Runtime)?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        agents = runtime.registry().len(),
        "agent runtime assembled"
    );

    Ok(Application { config, catalog, runtime: Arc::new(runtime) })
}
