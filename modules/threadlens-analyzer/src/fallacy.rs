use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::util::truncate_to_char_boundary;
use ai_client::ExtractError;
use threadlens_common::{ArgumentType, CommentFinding, OverallArgumentType, ThreadDocument};

use crate::claims::MAX_DOCUMENT_BYTES;
use crate::traits::{extract_as, StructuredBackend};

/// The fixed fallacy taxonomy the classifier picks from.
pub const FALLACY_TAXONOMY: [&str; 25] = [
    "Ad Hominem",
    "Strawman",
    "Slippery Slope",
    "Appeal to Emotion",
    "False Dilemma",
    "Hasty Generalization",
    "Appeal to Authority",
    "Red Herring",
    "Begging the Question",
    "Loaded Question",
    "False Analogy",
    "Correlation Implies Causation",
    "Post Hoc",
    "Gambler's Fallacy",
    "Sunk Cost",
    "Argument from Ignorance",
    "Argument from Repetition",
    "Appeal to Novelty",
    "Appeal to Tradition",
    "Bandwagon",
    "Bare Assertion",
    "Appeal to Hypocrisy",
    "Two Wrongs Make a Right",
    "Fallacy of Composition",
    "Fallacy of Division",
];

/// What the model returns for each analyzed comment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisEntry {
    /// The `id=` value of the comment, copied verbatim.
    pub comment_id: String,
    /// The `author=` value of the comment, copied verbatim.
    pub username: String,
    /// One-sentence summary of the comment.
    pub comment_summary: String,
    pub argument_type: ArgumentType,
    /// Taxonomy name, only when argument_type is fallacy.
    pub fallacy_type: Option<String>,
    /// Description of the logical flaw, only when argument_type is fallacy.
    pub flaw_description: Option<String>,
}

/// The full fallacy-classification response from the model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FallacyAnalysisResponse {
    #[serde(default)]
    pub analysis_entries: Vec<AnalysisEntry>,
    pub overall_summary: String,
    pub overall_argument_type: OverallArgumentType,
}

/// Thread-level analysis with per-comment findings. Fact checks are
/// attached later by the aggregator.
#[derive(Debug, Clone)]
pub struct ThreadAnalysis {
    pub findings: Vec<CommentFinding>,
    pub overall_summary: String,
    pub overall_argument_type: OverallArgumentType,
}

fn system_prompt() -> String {
    let taxonomy = FALLACY_TAXONOMY
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an argumentation analyst for online discussion threads.

The input is a linearized discussion: a root post followed by the chain of comments that led to the current reply. Each element is delimited by a header line of the form:

=== POST id=<id> author=<name> ===
=== COMMENT id=<id> author=<name> ===

For every COMMENT element (never the POST itself), classify the argument it makes:
- valid_argument: a coherent argument whose premises support its conclusion.
- fallacy: the reasoning commits a named logical fallacy.
- no_argument_found: the comment makes no argument at all (a question, a joke, small talk).

When the argument_type is fallacy, pick the fallacy_type from this taxonomy and describe the flaw in one or two sentences:
{taxonomy}

Copy comment_id and username exactly from the element headers. Summarize each comment in one sentence. Finally, summarize the whole discussion and classify it overall as valid_discussion, fallacious_discussion, mixed_discussion, or no_arguments_found."#
    )
}

pub struct FallacyAnalyzer {
    backend: Arc<dyn StructuredBackend>,
}

impl FallacyAnalyzer {
    pub fn new(backend: Arc<dyn StructuredBackend>) -> Self {
        Self { backend }
    }

    /// Classify every comment in the document and the discussion overall.
    /// Entries naming a comment that is not in the document are dropped;
    /// fallacy detail fields are cleared unless the entry is a fallacy.
    pub async fn analyze(
        &self,
        document: &ThreadDocument,
    ) -> Result<ThreadAnalysis, ExtractError> {
        let rendered = document.render();
        let rendered = truncate_to_char_boundary(&rendered, MAX_DOCUMENT_BYTES);

        let response: FallacyAnalysisResponse =
            extract_as(self.backend.as_ref(), &system_prompt(), rendered).await?;

        let known_refs = document.comment_refs();
        let mut findings = Vec::new();

        for entry in response.analysis_entries {
            if !known_refs.contains(entry.comment_id.as_str()) {
                warn!(
                    comment_id = entry.comment_id.as_str(),
                    "Dropping analysis entry with unknown comment reference"
                );
                continue;
            }

            let (fallacy_type, flaw_description) = match entry.argument_type {
                ArgumentType::Fallacy => (
                    entry
                        .fallacy_type
                        .filter(|t| !t.trim().is_empty())
                        .or_else(|| Some("Unclassified".to_string())),
                    entry
                        .flaw_description
                        .filter(|d| !d.trim().is_empty())
                        .or_else(|| Some("No description provided.".to_string())),
                ),
                _ => (None, None),
            };

            findings.push(CommentFinding {
                comment_ref: entry.comment_id,
                author: entry.username,
                comment_summary: entry.comment_summary,
                argument_type: entry.argument_type,
                fallacy_type,
                flaw_description,
                fact_check: None,
            });
        }

        info!(
            findings = findings.len(),
            overall = response.overall_argument_type.as_str(),
            "Thread analyzed"
        );

        Ok(ThreadAnalysis {
            findings,
            overall_summary: response.overall_summary,
            overall_argument_type: response.overall_argument_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{document_with_comment, MockBackend};
    use serde_json::json;

    #[tokio::test]
    async fn test_clears_fallacy_fields_on_valid_argument() {
        let backend = Arc::new(MockBackend::new().on_extraction(Ok(json!({
            "analysis_entries": [{
                "comment_id": "t1_a",
                "username": "alice",
                "comment_summary": "A sound point.",
                "argument_type": "valid_argument",
                "fallacy_type": "Bandwagon",
                "flaw_description": "spurious"
            }],
            "overall_summary": "Reasonable discussion.",
            "overall_argument_type": "valid_discussion"
        }))));

        let doc = document_with_comment("t1_a", "alice", "a sound point");
        let analysis = FallacyAnalyzer::new(backend).analyze(&doc).await.unwrap();

        assert_eq!(analysis.findings.len(), 1);
        assert_eq!(analysis.findings[0].argument_type, ArgumentType::ValidArgument);
        assert!(analysis.findings[0].fallacy_type.is_none());
        assert!(analysis.findings[0].flaw_description.is_none());
    }

    #[tokio::test]
    async fn test_fallacy_fields_backfilled_when_missing() {
        let backend = Arc::new(MockBackend::new().on_extraction(Ok(json!({
            "analysis_entries": [{
                "comment_id": "t1_a",
                "username": "alice",
                "comment_summary": "Appeals to popularity.",
                "argument_type": "fallacy",
                "fallacy_type": null,
                "flaw_description": null
            }],
            "overall_summary": "One fallacy.",
            "overall_argument_type": "fallacious_discussion"
        }))));

        let doc = document_with_comment("t1_a", "alice", "everyone says so");
        let analysis = FallacyAnalyzer::new(backend).analyze(&doc).await.unwrap();

        assert_eq!(
            analysis.findings[0].fallacy_type.as_deref(),
            Some("Unclassified")
        );
        assert!(analysis.findings[0].flaw_description.is_some());
    }

    #[tokio::test]
    async fn test_drops_unknown_comment_refs() {
        let backend = Arc::new(MockBackend::new().on_extraction(Ok(json!({
            "analysis_entries": [{
                "comment_id": "t1_phantom",
                "username": "ghost",
                "comment_summary": "Not real.",
                "argument_type": "no_argument_found",
                "fallacy_type": null,
                "flaw_description": null
            }],
            "overall_summary": "Empty.",
            "overall_argument_type": "no_arguments_found"
        }))));

        let doc = document_with_comment("t1_a", "alice", "hello");
        let analysis = FallacyAnalyzer::new(backend).analyze(&doc).await.unwrap();

        assert!(analysis.findings.is_empty());
    }
}
