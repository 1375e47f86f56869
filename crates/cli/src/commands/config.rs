use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use merryway_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

impl Field {
    fn new(key: &'static str, env_key: &'static str, value: impl Into<String>) -> Self {
        Self { key, env_key, value: value.into() }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let llm = &config.llm;
    let vector = &config.vector;
    vec![
        Field::new("llm.provider", "MERRYWAY_LLM_PROVIDER", llm.provider.as_str()),
        Field::new("llm.api_key", "MERRYWAY_LLM_API_KEY", redact_secret(llm.api_key.as_ref())),
        Field::new("llm.base_url", "MERRYWAY_LLM_BASE_URL", llm.effective_base_url()),
        Field::new("llm.model", "MERRYWAY_LLM_MODEL", llm.model.as_str()),
        Field::new(
            "llm.embedding_model",
            "MERRYWAY_LLM_EMBEDDING_MODEL",
            llm.embedding_model.as_str(),
        ),
        Field::new("llm.timeout_secs", "MERRYWAY_LLM_TIMEOUT_SECS", llm.timeout_secs.to_string()),
        Field::new("llm.temperature", "MERRYWAY_LLM_TEMPERATURE", llm.temperature.to_string()),
        Field::new("llm.top_p", "MERRYWAY_LLM_TOP_P", llm.top_p.to_string()),
        Field::new("llm.top_k", "MERRYWAY_LLM_TOP_K", llm.top_k.to_string()),
        Field::new(
            "llm.max_output_tokens",
            "MERRYWAY_LLM_MAX_OUTPUT_TOKENS",
            llm.max_output_tokens.to_string(),
        ),
        Field::new(
            "llm.safety_threshold",
            "MERRYWAY_LLM_SAFETY_THRESHOLD",
            llm.safety_threshold.as_str(),
        ),
        Field::new(
            "llm.repair_malformed_output",
            "MERRYWAY_LLM_REPAIR_MALFORMED_OUTPUT",
            llm.repair_malformed_output.to_string(),
        ),
        Field::new(
            "vector.api_key",
            "MERRYWAY_VECTOR_API_KEY",
            redact_secret(vector.api_key.as_ref()),
        ),
        Field::new(
            "vector.index_host",
            "MERRYWAY_VECTOR_INDEX_HOST",
            vector.index_host.as_deref().unwrap_or("<unset>"),
        ),
        Field::new("vector.namespace", "MERRYWAY_VECTOR_NAMESPACE", vector.namespace.as_str()),
        Field::new("vector.top_k", "MERRYWAY_VECTOR_TOP_K", vector.top_k.to_string()),
        Field::new(
            "recommendations.apriori_path",
            "MERRYWAY_RECOMMENDATIONS_APRIORI_PATH",
            config.recommendations.apriori_path.display().to_string(),
        ),
        Field::new(
            "recommendations.popularity_path",
            "MERRYWAY_RECOMMENDATIONS_POPULARITY_PATH",
            config.recommendations.popularity_path.display().to_string(),
        ),
        Field::new(
            "ordering.repeat_item_price",
            "MERRYWAY_ORDERING_REPEAT_ITEM_PRICE",
            format!("{:?}", config.ordering.repeat_item_price),
        ),
        Field::new(
            "server.bind_address",
            "MERRYWAY_SERVER_BIND_ADDRESS",
            config.server.bind_address.as_str(),
        ),
        Field::new("server.port", "MERRYWAY_SERVER_PORT", config.server.port.to_string()),
        Field::new(
            "server.graceful_shutdown_secs",
            "MERRYWAY_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        Field::new("logging.level", "MERRYWAY_LOGGING_LEVEL", config.logging.level.as_str()),
        Field::new(
            "logging.format",
            "MERRYWAY_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["merryway.toml", "config/merryway.toml"].into_iter().map(PathBuf::from).find(|p| p.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    // Keep a vendor prefix such as `pcsk-` so operators can tell keys apart.
    if let Some((prefix, _)) = trimmed.split_once('-') {
        if prefix.len() <= 6 {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}
