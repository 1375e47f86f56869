use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::order::RepeatItemPrice;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub vector: VectorConfig,
    pub recommendations: RecommendationsConfig,
    pub ordering: OrderingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub safety_threshold: String,
    pub repair_malformed_output: bool,
}

#[derive(Clone, Debug)]
pub struct VectorConfig {
    pub api_key: Option<SecretString>,
    pub index_host: Option<String>,
    pub namespace: String,
    pub top_k: u32,
}

#[derive(Clone, Debug)]
pub struct RecommendationsConfig {
    pub apriori_path: PathBuf,
    pub popularity_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct OrderingConfig {
    pub repeat_item_price: RepeatItemPrice,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

const SAFETY_THRESHOLDS: [&str; 4] =
    ["BLOCK_NONE", "BLOCK_ONLY_HIGH", "BLOCK_MEDIUM_AND_ABOVE", "BLOCK_LOW_AND_ABOVE"];

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub vector_api_key: Option<String>,
    pub vector_index_host: Option<String>,
    pub server_port: Option<u16>,
    pub apriori_path: Option<PathBuf>,
    pub popularity_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: None,
                model: "gemini-1.5-flash".to_string(),
                embedding_model: "models/text-embedding-004".to_string(),
                timeout_secs: 30,
                temperature: 0.0,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 2000,
                safety_threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
                repair_malformed_output: true,
            },
            vector: VectorConfig {
                api_key: None,
                index_host: None,
                namespace: "ns1".to_string(),
                top_k: 2,
            },
            recommendations: RecommendationsConfig {
                apriori_path: PathBuf::from("data/apriori_recommendations.json"),
                popularity_path: PathBuf::from("data/popularity_recommendation.csv"),
            },
            ordering: OrderingConfig { repeat_item_price: RepeatItemPrice::KeepExisting },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("merryway.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(embedding_model) = llm.embedding_model {
                self.llm.embedding_model = embedding_model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(top_p) = llm.top_p {
                self.llm.top_p = top_p;
            }
            if let Some(top_k) = llm.top_k {
                self.llm.top_k = top_k;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
            if let Some(safety_threshold) = llm.safety_threshold {
                self.llm.safety_threshold = safety_threshold;
            }
            if let Some(repair) = llm.repair_malformed_output {
                self.llm.repair_malformed_output = repair;
            }
        }

        if let Some(vector) = patch.vector {
            if let Some(vector_api_key_value) = vector.api_key {
                self.vector.api_key = Some(secret_value(vector_api_key_value));
            }
            if let Some(index_host) = vector.index_host {
                self.vector.index_host = Some(index_host);
            }
            if let Some(namespace) = vector.namespace {
                self.vector.namespace = namespace;
            }
            if let Some(top_k) = vector.top_k {
                self.vector.top_k = top_k;
            }
        }

        if let Some(recommendations) = patch.recommendations {
            if let Some(apriori_path) = recommendations.apriori_path {
                self.recommendations.apriori_path = apriori_path;
            }
            if let Some(popularity_path) = recommendations.popularity_path {
                self.recommendations.popularity_path = popularity_path;
            }
        }

        if let Some(ordering) = patch.ordering {
            if let Some(repeat_item_price) = ordering.repeat_item_price {
                self.ordering.repeat_item_price = repeat_item_price;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MERRYWAY_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("MERRYWAY_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MERRYWAY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("MERRYWAY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("MERRYWAY_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = value;
        }
        if let Some(value) = read_env("MERRYWAY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("MERRYWAY_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MERRYWAY_LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("MERRYWAY_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("MERRYWAY_LLM_TOP_P") {
            self.llm.top_p = parse_env("MERRYWAY_LLM_TOP_P", &value)?;
        }
        if let Some(value) = read_env("MERRYWAY_LLM_TOP_K") {
            self.llm.top_k = parse_env("MERRYWAY_LLM_TOP_K", &value)?;
        }
        if let Some(value) = read_env("MERRYWAY_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_env("MERRYWAY_LLM_MAX_OUTPUT_TOKENS", &value)?;
        }
        if let Some(value) = read_env("MERRYWAY_LLM_SAFETY_THRESHOLD") {
            self.llm.safety_threshold = value;
        }
        if let Some(value) = read_env("MERRYWAY_LLM_REPAIR_MALFORMED_OUTPUT") {
            self.llm.repair_malformed_output =
                parse_env("MERRYWAY_LLM_REPAIR_MALFORMED_OUTPUT", &value)?;
        }

        if let Some(value) = read_env("MERRYWAY_VECTOR_API_KEY") {
            self.vector.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MERRYWAY_VECTOR_INDEX_HOST") {
            self.vector.index_host = Some(value);
        }
        if let Some(value) = read_env("MERRYWAY_VECTOR_NAMESPACE") {
            self.vector.namespace = value;
        }
        if let Some(value) = read_env("MERRYWAY_VECTOR_TOP_K") {
            self.vector.top_k = parse_env("MERRYWAY_VECTOR_TOP_K", &value)?;
        }

        if let Some(value) = read_env("MERRYWAY_RECOMMENDATIONS_APRIORI_PATH") {
            self.recommendations.apriori_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("MERRYWAY_RECOMMENDATIONS_POPULARITY_PATH") {
            self.recommendations.popularity_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("MERRYWAY_ORDERING_REPEAT_ITEM_PRICE") {
            self.ordering.repeat_item_price = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "MERRYWAY_ORDERING_REPEAT_ITEM_PRICE".to_string(),
                    value: value.clone(),
                }
            })?;
        }

        if let Some(value) = read_env("MERRYWAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MERRYWAY_SERVER_PORT") {
            self.server.port = parse_env("MERRYWAY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("MERRYWAY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("MERRYWAY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("MERRYWAY_LOGGING_LEVEL").or_else(|| read_env("MERRYWAY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MERRYWAY_LOGGING_FORMAT").or_else(|| read_env("MERRYWAY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(vector_api_key) = overrides.vector_api_key {
            self.vector.api_key = Some(secret_value(vector_api_key));
        }
        if let Some(vector_index_host) = overrides.vector_index_host {
            self.vector.index_host = Some(vector_index_host);
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(apriori_path) = overrides.apriori_path {
            self.recommendations.apriori_path = apriori_path;
        }
        if let Some(popularity_path) = overrides.popularity_path {
            self.recommendations.popularity_path = popularity_path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_vector(&self.vector)?;
        validate_recommendations(&self.recommendations)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("merryway.toml"), PathBuf::from("config/merryway.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.embedding_model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.embedding_model must not be empty".to_string()));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&llm.top_p) {
        return Err(ConfigError::Validation("llm.top_p must be in range 0.0..=1.0".to_string()));
    }
    if llm.top_k == 0 {
        return Err(ConfigError::Validation("llm.top_k must be greater than zero".to_string()));
    }
    if llm.max_output_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_output_tokens must be greater than zero".to_string(),
        ));
    }
    if !SAFETY_THRESHOLDS.contains(&llm.safety_threshold.as_str()) {
        return Err(ConfigError::Validation(format!(
            "llm.safety_threshold must be one of {}",
            SAFETY_THRESHOLDS.join("|")
        )));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if llm.provider == LlmProvider::Gemini {
        let missing = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the gemini provider. Create one at https://aistudio.google.com/app/apikey".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_vector(vector: &VectorConfig) -> Result<(), ConfigError> {
    let missing_key = vector
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "vector.api_key is required. Get it from the Pinecone console > API Keys".to_string(),
        ));
    }

    let missing_host =
        vector.index_host.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
    if missing_host {
        return Err(ConfigError::Validation(
            "vector.index_host is required. Copy it from the Pinecone console > Indexes > Host"
                .to_string(),
        ));
    }

    if vector.top_k == 0 || vector.top_k > 20 {
        return Err(ConfigError::Validation("vector.top_k must be in range 1..=20".to_string()));
    }

    Ok(())
}

fn validate_recommendations(recommendations: &RecommendationsConfig) -> Result<(), ConfigError> {
    if recommendations.apriori_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "recommendations.apriori_path must not be empty".to_string(),
        ));
    }
    if recommendations.popularity_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "recommendations.popularity_path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    vector: Option<VectorPatch>,
    recommendations: Option<RecommendationsPatch>,
    ordering: Option<OrderingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
    max_output_tokens: Option<u32>,
    safety_threshold: Option<String>,
    repair_malformed_output: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct VectorPatch {
    api_key: Option<String>,
    index_host: Option<String>,
    namespace: Option<String>,
    top_k: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationsPatch {
    apriori_path: Option<PathBuf>,
    popularity_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct OrderingPatch {
    repeat_item_price: Option<RepeatItemPrice>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};
    use crate::domain::order::RepeatItemPrice;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const CREDENTIAL_VARS: [&str; 3] =
        ["MERRYWAY_LLM_API_KEY", "MERRYWAY_VECTOR_API_KEY", "MERRYWAY_VECTOR_INDEX_HOST"];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_credentials() {
        env::set_var("MERRYWAY_LLM_API_KEY", "gemini-test-key");
        env::set_var("MERRYWAY_VECTOR_API_KEY", "pcsk-test-key");
        env::set_var("MERRYWAY_VECTOR_INDEX_HOST", "coffee-index.svc.pinecone.io");
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GEMINI_KEY", "gemini-from-env");
        env::set_var("TEST_PINECONE_KEY", "pcsk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("merryway.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_GEMINI_KEY}"

[vector]
api_key = "${TEST_PINECONE_KEY}"
index_host = "coffee-index.svc.pinecone.io"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gemini-from-env")
                    == Some(true),
                "llm api key should be loaded from environment",
            )?;
            ensure(
                config.vector.api_key.as_ref().map(|key| key.expose_secret() == "pcsk-from-env")
                    == Some(true),
                "vector api key should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_GEMINI_KEY", "TEST_PINECONE_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("merryway.toml");
        fs::write(&path, "[llm]\napi_key = \"${MERRYWAY_TEST_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        let result =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(
                result,
                Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "MERRYWAY_TEST_UNSET_VAR"
            ),
            "missing interpolation variable should be named in the error",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_credentials();
        env::set_var("MERRYWAY_LOG_LEVEL", "warn");
        env::set_var("MERRYWAY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&CREDENTIAL_VARS);
        clear_vars(&["MERRYWAY_LOG_LEVEL", "MERRYWAY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_credentials();
        env::set_var("MERRYWAY_LLM_MODEL", "gemini-from-env");
        env::set_var("MERRYWAY_ORDERING_REPEAT_ITEM_PRICE", "latest");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("merryway.toml");
            fs::write(
                &path,
                r#"
[llm]
model = "gemini-from-file"
top_k = 20

[server]
port = 9000

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    server_port: Some(9100),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 9100, "override port should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.llm.model == "gemini-from-env", "env model should win over file")?;
            ensure(config.llm.top_k == 20, "file top_k should win over default")?;
            ensure(config.vector.namespace == "ns1", "vector namespace should keep default")?;
            ensure(
                config.ordering.repeat_item_price == RepeatItemPrice::Latest,
                "env price policy should be applied",
            )?;
            Ok(())
        })();

        clear_vars(&CREDENTIAL_VARS);
        clear_vars(&["MERRYWAY_LLM_MODEL", "MERRYWAY_ORDERING_REPEAT_ITEM_PRICE"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MERRYWAY_LLM_API_KEY", "gemini-test-key");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("vector.api_key")
            );
            ensure(has_message, "validation failure should mention vector.api_key")
        })();

        clear_vars(&CREDENTIAL_VARS);
        result
    }

    #[test]
    fn ollama_provider_does_not_require_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MERRYWAY_VECTOR_API_KEY", "pcsk-test-key");
        env::set_var("MERRYWAY_VECTOR_INDEX_HOST", "coffee-index.svc.pinecone.io");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    llm_provider: Some(LlmProvider::Ollama),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.effective_base_url() == "http://localhost:11434",
                "ollama should fall back to its default base url",
            )
        })();

        clear_vars(&CREDENTIAL_VARS);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_credentials();
        env::set_var("MERRYWAY_VECTOR_TOP_K", "several");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "MERRYWAY_VECTOR_TOP_K", "error should name the env key")
            }
            _ => Err("expected invalid env override error".to_string()),
        };

        clear_vars(&CREDENTIAL_VARS);
        clear_vars(&["MERRYWAY_VECTOR_TOP_K"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MERRYWAY_LLM_API_KEY", "gemini-secret-value");
        env::set_var("MERRYWAY_VECTOR_API_KEY", "pcsk-secret-value");
        env::set_var("MERRYWAY_VECTOR_INDEX_HOST", "coffee-index.svc.pinecone.io");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("gemini-secret-value"),
                "debug output should not contain llm api key",
            )?;
            ensure(
                !debug.contains("pcsk-secret-value"),
                "debug output should not contain vector api key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&CREDENTIAL_VARS);
        result
    }
}
