use async_trait::async_trait;
use merryway_core::errors::ApplicationError;

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorQuery<'a> {
    pub namespace: &'a str,
    pub top_k: u32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(
        &self,
        vector: &[f32],
        query: VectorQuery<'_>,
    ) -> Result<Vec<VectorMatch>, ApplicationError>;
}

/// Trimmed match texts, one block per match, blank-line separated.
pub fn join_match_text(matches: &[VectorMatch]) -> String {
    matches
        .iter()
        .filter_map(|entry| entry.text.as_deref())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::{join_match_text, VectorMatch};

    fn found(id: &str, text: Option<&str>) -> VectorMatch {
        VectorMatch { id: id.to_string(), score: 0.9, text: text.map(str::to_string) }
    }

    #[test]
    fn joins_only_matches_with_text() {
        let joined = join_match_text(&[
            found("a", Some(" Open 7am to 5pm. ")),
            found("b", None),
            found("c", Some("")),
            found("d", Some("Almond Croissant: buttery, flaky.")),
        ]);

        assert_eq!(joined, "Open 7am to 5pm.\n\nAlmond Croissant: buttery, flaky.");
        assert!(join_match_text(&[]).is_empty());
    }
}
