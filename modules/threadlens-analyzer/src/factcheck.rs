// Concurrent claim verification. One grounded request per claim, all
// dispatched together and unordered; the join is a barrier — the caller
// resumes only after every verification reaches a terminal state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::Citation;
use threadlens_common::{Claim, FactCheckVerdict, Verdict};

use crate::traits::{extract_grounded_as, StructuredBackend};

/// What the model returns for one verification.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FactCheckResponse {
    /// One of TRUE, FALSE, PARTIALLY_TRUE, UNPROVEN, DEBATED.
    pub verdict: Verdict,
    /// Short neutral explanation of how the evidence bears on the claim.
    pub explanation: String,
    /// Source URLs supporting the verdict.
    #[serde(default)]
    pub sources: Vec<String>,
}

const FACT_CHECK_PROMPT: &str = r#"You are a neutral fact checker. Use web search to verify the claim below against reliable, independent sources before answering.

Verdicts:
- TRUE: the claim is supported by the evidence.
- FALSE: the claim is contradicted by the evidence.
- PARTIALLY_TRUE: parts hold up, parts do not.
- UNPROVEN: there is not enough evidence either way.
- DEBATED: credible sources genuinely disagree.

Judge the claim, not the person making it. Keep the explanation to a few sentences and cite the sources you relied on."#;

pub struct FactChecker {
    backend: Arc<dyn StructuredBackend>,
    max_concurrent: Option<usize>,
    per_call_timeout: Option<Duration>,
}

impl FactChecker {
    pub fn new(backend: Arc<dyn StructuredBackend>) -> Self {
        Self {
            backend,
            max_concurrent: None,
            per_call_timeout: None,
        }
    }

    /// Cap the number of in-flight verifications. Unbounded when unset.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = Some(n);
        self
    }

    /// Deadline for each individual verification call. None when unset.
    pub fn with_per_call_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = Some(timeout);
        self
    }

    /// Verify every claim concurrently, then join. Each verification lands
    /// in a per-claim slot indexed by dispatch order and the slots are
    /// merged into a map keyed by comment reference only after the join —
    /// completion order never affects membership or ordering. A failed
    /// verification yields no verdict and does not abort its siblings.
    pub async fn check(&self, claims: &[Claim]) -> HashMap<String, FactCheckVerdict> {
        if claims.is_empty() {
            return HashMap::new();
        }

        let width = self.max_concurrent.unwrap_or(claims.len()).max(1);

        let results: Vec<(usize, Option<FactCheckVerdict>)> =
            stream::iter(claims.iter().enumerate().map(|(index, claim)| {
                let query = verification_query(claim);
                async move { (index, self.verify_one(claim, &query).await) }
            }))
            .buffer_unordered(width)
            .collect()
            .await;

        let mut slots: Vec<Option<FactCheckVerdict>> = vec![None; claims.len()];
        for (index, verdict) in results {
            slots[index] = verdict;
        }

        let mut verdicts = HashMap::new();
        for verdict in slots.into_iter().flatten() {
            // Multiple claims can share a comment; the first in claim
            // order (which follows the document) wins.
            verdicts
                .entry(verdict.comment_ref.clone())
                .or_insert(verdict);
        }

        info!(
            claims = claims.len(),
            verdicts = verdicts.len(),
            "Fact checking complete"
        );
        verdicts
    }

    async fn verify_one(&self, claim: &Claim, query: &str) -> Option<FactCheckVerdict> {
        let call = extract_grounded_as::<FactCheckResponse>(
            self.backend.as_ref(),
            FACT_CHECK_PROMPT,
            query,
        );

        let outcome = match self.per_call_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        comment_ref = claim.comment_ref.as_str(),
                        "Fact check timed out"
                    );
                    return None;
                }
            },
            None => call.await,
        };

        match outcome {
            Ok((response, citations)) => Some(build_verdict(claim, response, citations)),
            Err(e) => {
                warn!(
                    comment_ref = claim.comment_ref.as_str(),
                    error = %e,
                    "Fact check failed"
                );
                None
            }
        }
    }
}

fn verification_query(claim: &Claim) -> String {
    let arguments = if claim.supporting_arguments.is_empty() {
        "None provided.".to_string()
    } else {
        claim.supporting_arguments.join("; ")
    };
    format!(
        "Claim to fact-check: {}\nSupporting arguments: {}\n",
        claim.claim_text, arguments
    )
}

fn build_verdict(
    claim: &Claim,
    response: FactCheckResponse,
    citations: Vec<Citation>,
) -> FactCheckVerdict {
    let mut all_citations = response.sources;
    for citation in citations {
        if !all_citations.contains(&citation.uri) {
            all_citations.push(citation.uri);
        }
    }
    FactCheckVerdict {
        comment_ref: claim.comment_ref.clone(),
        verdict: response.verdict,
        explanation: response.explanation,
        citations: all_citations,
    }
}
