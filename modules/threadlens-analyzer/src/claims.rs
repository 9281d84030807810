use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::util::truncate_to_char_boundary;
use ai_client::ExtractError;
use threadlens_common::{Claim, ThreadDocument};

use crate::traits::{extract_as, StructuredBackend};

/// Cap on rendered-document bytes sent to the backend.
pub(crate) const MAX_DOCUMENT_BYTES: usize = 30_000;

/// What the model returns for each extracted claim.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClaimEntry {
    /// The `id=` value of the comment the claim appears in, copied verbatim.
    pub comment_id: String,
    /// The `author=` value of that comment, copied verbatim.
    pub username: String,
    /// The factual assertion, quoted or minimally paraphrased.
    pub claim: String,
    /// Arguments the author gives in support of the claim, in order.
    #[serde(default)]
    pub argument_entries: Vec<String>,
}

/// The full claim-extraction response from the model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClaimExtractionResponse {
    #[serde(default)]
    pub claim_entries: Vec<ClaimEntry>,
}

const CLAIM_EXTRACTION_PROMPT: &str = r#"You are a claim extractor for online discussion threads.

The input is a linearized discussion: a root post followed by the chain of comments that led to the current reply. Each element is delimited by a header line of the form:

=== POST id=<id> author=<name> ===
=== COMMENT id=<id> author=<name> ===

Extract every discrete, checkable factual claim made in the thread.

Rules:
- A claim is a statement about the world that could in principle be verified or refuted with evidence. Opinions, questions, and pure value judgements are not claims.
- Copy comment_id and username exactly from the header of the element the claim appears in. Never invent ids.
- Quote the claim as closely as possible; paraphrase only as far as needed to make it self-contained.
- List the supporting arguments the author gives for the claim, one entry each, in the order they appear.
- If the thread contains no checkable claims, return an empty list."#;

pub struct ClaimExtractor {
    backend: Arc<dyn StructuredBackend>,
}

impl ClaimExtractor {
    pub fn new(backend: Arc<dyn StructuredBackend>) -> Self {
        Self { backend }
    }

    /// Extract checkable claims from the document. Claims with empty text
    /// are dropped, as are claims naming a comment that is not in the
    /// document — the model does not get to invent references.
    pub async fn extract(
        &self,
        document: &ThreadDocument,
    ) -> Result<Vec<Claim>, ExtractError> {
        let rendered = document.render();
        let rendered = truncate_to_char_boundary(&rendered, MAX_DOCUMENT_BYTES);

        let response: ClaimExtractionResponse =
            extract_as(self.backend.as_ref(), CLAIM_EXTRACTION_PROMPT, rendered).await?;

        let known_refs = document.comment_refs();
        let mut claims = Vec::new();

        for entry in response.claim_entries {
            if entry.claim.trim().is_empty() {
                continue;
            }
            if !known_refs.contains(entry.comment_id.as_str()) {
                warn!(
                    comment_id = entry.comment_id.as_str(),
                    "Dropping claim with unknown comment reference"
                );
                continue;
            }
            claims.push(Claim {
                comment_ref: entry.comment_id,
                author: entry.username,
                claim_text: entry.claim.trim().to_string(),
                supporting_arguments: entry.argument_entries,
            });
        }

        info!(count = claims.len(), "Extracted claims");
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{document_with_comment, MockBackend};
    use serde_json::json;

    #[tokio::test]
    async fn test_drops_unknown_comment_refs() {
        let backend = Arc::new(MockBackend::new().on_extraction(Ok(json!({
            "claim_entries": [
                {"comment_id": "t1_a", "username": "alice", "claim": "The sky is blue.", "argument_entries": []},
                {"comment_id": "t1_invented", "username": "ghost", "claim": "Made up.", "argument_entries": []}
            ]
        }))));

        let doc = document_with_comment("t1_a", "alice", "The sky is blue.");
        let claims = ClaimExtractor::new(backend).extract(&doc).await.unwrap();

        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].comment_ref, "t1_a");
    }

    #[tokio::test]
    async fn test_drops_empty_claims() {
        let backend = Arc::new(MockBackend::new().on_extraction(Ok(json!({
            "claim_entries": [
                {"comment_id": "t1_a", "username": "alice", "claim": "   ", "argument_entries": []},
                {"comment_id": "t1_a", "username": "alice", "claim": "Water boils at 100C.", "argument_entries": ["at sea level"]}
            ]
        }))));

        let doc = document_with_comment("t1_a", "alice", "whatever");
        let claims = ClaimExtractor::new(backend).extract(&doc).await.unwrap();

        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].claim_text, "Water boils at 100C.");
        assert_eq!(claims[0].supporting_arguments, vec!["at sea level".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_output_propagates() {
        let backend = Arc::new(
            MockBackend::new().on_extraction(Ok(json!({"claim_entries": "not a list"}))),
        );

        let doc = document_with_comment("t1_a", "alice", "text");
        let err = ClaimExtractor::new(backend).extract(&doc).await.unwrap_err();

        assert!(matches!(err, ExtractError::MalformedOutput(_)));
    }
}
