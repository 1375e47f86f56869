use std::fs;
use std::path::Path;
use std::sync::Arc;

use merryway_agent::AgentRuntime;
use merryway_core::config::{AppConfig, LoadOptions};
use merryway_core::recommendations::RecommendationCatalog;

use crate::commands::{init_logging, CommandResult, EXIT_CONFIG, EXIT_INPUT, EXIT_RUNTIME};

/// Runs one dispatch over a payload file. On success the output is the
/// response envelope itself, pretty-printed.
pub fn run(path: &Path) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            let message = error.to_string();
            return CommandResult::failure("ask", "config_validation", message, EXIT_CONFIG);
        }
    };
    init_logging(&config);

    let payload = match fs::read(path) {
        Ok(payload) => payload,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "input_read",
                format!("could not read `{}`: {error}", path.display()),
                EXIT_INPUT,
            );
        }
    };

    let catalog = Arc::new(RecommendationCatalog::load(
        &config.recommendations.apriori_path,
        &config.recommendations.popularity_path,
    ));
    let runtime = match AgentRuntime::from_config(&config, catalog) {
        Ok(runtime) => runtime,
        Err(error) => {
            let message = error.to_string();
            return CommandResult::failure("ask", error.error_class(), message, EXIT_RUNTIME);
        }
    };

    let executor = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(executor) => executor,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "async_runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };
    let envelope = executor.block_on(runtime.handle_payload(&payload));

    match serde_json::to_string_pretty(&envelope) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => {
            CommandResult::failure("ask", "serialization", error.to_string(), EXIT_RUNTIME)
        }
    }
}
