//! In-process fakes for the completion, embedding, and vector-search seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use merryway_core::errors::ApplicationError;

use crate::llm::{CompletionClient, CompletionHandle, CompletionRequest, GenerationParams};
use crate::retrieval::{EmbeddingClient, VectorIndex, VectorMatch, VectorQuery};

/// Replays canned completions in order and records every request.
#[derive(Default)]
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, ApplicationError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(script: Vec<Result<String, ApplicationError>>) -> Self {
        Self { script: Mutex::new(script.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn handle(
        script: Vec<Result<String, ApplicationError>>,
    ) -> (Arc<ScriptedCompletion>, CompletionHandle) {
        let completion = Arc::new(Self::new(script));
        let handle = CompletionHandle::new(completion.clone(), GenerationParams::default());
        (completion, handle)
    }

    pub fn replies(replies: &[&str]) -> (Arc<ScriptedCompletion>, CompletionHandle) {
        Self::handle(replies.iter().map(|reply| Ok(reply.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn prompt(&self, index: usize) -> String {
        self.requests.lock().expect("requests lock")[index].combined_prompt()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    fn provider(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ApplicationError> {
        self.requests.lock().expect("requests lock").push(request.clone());
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err(ApplicationError::external("scripted", "script exhausted")))
    }
}

pub struct FixedEmbedding {
    vector: Result<Vec<f32>, ApplicationError>,
    calls: AtomicUsize,
}

impl FixedEmbedding {
    pub fn returning(vector: Vec<f32>) -> Self {
        Self { vector: Ok(vector), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self {
            vector: Err(ApplicationError::external("embedding", "unavailable")),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for FixedEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ApplicationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vector.clone()
    }
}

pub struct FixedIndex {
    matches: Vec<VectorMatch>,
    queries: Mutex<Vec<(String, u32)>>,
}

impl FixedIndex {
    pub fn with_texts(texts: &[&str]) -> Self {
        let matches = texts
            .iter()
            .enumerate()
            .map(|(position, text)| VectorMatch {
                id: format!("doc-{position}"),
                score: 0.8,
                text: Some(text.to_string()),
            })
            .collect();
        Self { matches, queries: Mutex::new(Vec::new()) }
    }

    pub fn queries(&self) -> Vec<(String, u32)> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl VectorIndex for FixedIndex {
    async fn query(
        &self,
        _vector: &[f32],
        query: VectorQuery<'_>,
    ) -> Result<Vec<VectorMatch>, ApplicationError> {
        self.queries.lock().expect("queries lock").push((query.namespace.to_string(), query.top_k));
        Ok(self.matches.clone())
    }
}
