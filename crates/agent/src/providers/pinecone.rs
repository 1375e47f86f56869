use async_trait::async_trait;
use merryway_core::config::{LlmConfig, VectorConfig};
use merryway_core::errors::ApplicationError;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::providers::{http_client, send_json, trimmed_base_url};
use crate::retrieval::{VectorIndex, VectorMatch, VectorQuery};

const SERVICE: &str = "pinecone.query";
const API_VERSION: &str = "2024-07";

/// Pinecone data-plane client for a single index host.
pub struct PineconeIndex {
    http: reqwest::Client,
    query_url: String,
    api_key: SecretString,
}

impl PineconeIndex {
    pub fn from_config(vector: &VectorConfig, llm: &LlmConfig) -> Result<Self, ApplicationError> {
        let api_key = vector.api_key.clone().ok_or_else(|| {
            ApplicationError::Configuration("vector.api_key is required".to_string())
        })?;
        let host = vector.index_host.as_deref().ok_or_else(|| {
            ApplicationError::Configuration("vector.index_host is required".to_string())
        })?;

        Ok(Self {
            http: http_client(SERVICE, llm.timeout_secs)?,
            query_url: format!("{}/query", index_url(host)),
            api_key,
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(
        &self,
        vector: &[f32],
        query: VectorQuery<'_>,
    ) -> Result<Vec<VectorMatch>, ApplicationError> {
        let response = send_json(
            SERVICE,
            self.http
                .post(&self.query_url)
                .header("Api-Key", self.api_key.expose_secret())
                .header("X-Pinecone-API-Version", API_VERSION)
                .json(&query_payload(vector, &query)),
        )
        .await?;

        Ok(parse_matches(&response))
    }
}

/// Index hosts are shown without a scheme in the Pinecone console.
fn index_url(host: &str) -> String {
    let host = trimmed_base_url(host);
    if host.starts_with("http://") || host.starts_with("https://") {
        host
    } else {
        format!("https://{host}")
    }
}

pub(crate) fn query_payload(vector: &[f32], query: &VectorQuery<'_>) -> Value {
    json!({
        "namespace": query.namespace,
        "vector": vector,
        "topK": query.top_k,
        "includeValues": false,
        "includeMetadata": true,
    })
}

pub(crate) fn parse_matches(response: &Value) -> Vec<VectorMatch> {
    let Some(matches) = response.get("matches").and_then(Value::as_array) else {
        return Vec::new();
    };

    matches
        .iter()
        .map(|entry| VectorMatch {
            id: entry.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            score: entry.get("score").and_then(Value::as_f64).unwrap_or_default() as f32,
            text: entry.pointer("/metadata/text").and_then(Value::as_str).map(str::to_string),
        })
        .collect()
}
