// Trait abstractions for the pipeline's external collaborators.
//
// StructuredBackend replaces a concrete Gemini handle — both extraction
// stages and the fact checker speak JSON-value requests through it.
// EventSource, ThreadFetcher, and ReplySink are the platform seams: the
// event feed, the discussion tree, and the reply mechanism.
//
// These enable deterministic testing with MockBackend, MockThreadFetcher,
// and MockReplySink: no network, no credentials. `cargo test` in seconds.

use ai_client::{Citation, ExtractError, Gemini, ResponseSchema};
use anyhow::Result;
use async_trait::async_trait;

use threadlens_common::{Report, ThreadNode, TriggerEvent};

// ---------------------------------------------------------------------------
// StructuredBackend — replaces a concrete Gemini handle
// ---------------------------------------------------------------------------

#[async_trait]
pub trait StructuredBackend: Send + Sync {
    /// Schema-constrained extraction over `document`.
    async fn extract_json(
        &self,
        system_prompt: &str,
        document: &str,
        schema: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ExtractError>;

    /// Schema-constrained extraction with search grounding. Returns the
    /// cited web sources alongside the value.
    async fn extract_grounded_json(
        &self,
        system_prompt: &str,
        document: &str,
        schema: serde_json::Value,
    ) -> std::result::Result<(serde_json::Value, Vec<Citation>), ExtractError>;
}

#[async_trait]
impl StructuredBackend for Gemini {
    async fn extract_json(
        &self,
        system_prompt: &str,
        document: &str,
        schema: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ExtractError> {
        self.extract_value(system_prompt, document, schema).await
    }

    async fn extract_grounded_json(
        &self,
        system_prompt: &str,
        document: &str,
        schema: serde_json::Value,
    ) -> std::result::Result<(serde_json::Value, Vec<Citation>), ExtractError> {
        self.extract_grounded_value(system_prompt, document, schema)
            .await
    }
}

/// Typed extraction through an object-safe backend.
pub async fn extract_as<T: ResponseSchema>(
    backend: &dyn StructuredBackend,
    system_prompt: &str,
    document: &str,
) -> std::result::Result<T, ExtractError> {
    let value = backend
        .extract_json(system_prompt, document, T::response_schema())
        .await?;
    serde_json::from_value(value)
        .map_err(|e| ExtractError::MalformedOutput(format!("schema mismatch: {e}")))
}

/// Typed grounded extraction through an object-safe backend.
pub async fn extract_grounded_as<T: ResponseSchema>(
    backend: &dyn StructuredBackend,
    system_prompt: &str,
    document: &str,
) -> std::result::Result<(T, Vec<Citation>), ExtractError> {
    let (value, citations) = backend
        .extract_grounded_json(system_prompt, document, T::response_schema())
        .await?;
    let parsed = serde_json::from_value(value)
        .map_err(|e| ExtractError::MalformedOutput(format!("schema mismatch: {e}")))?;
    Ok((parsed, citations))
}

// ---------------------------------------------------------------------------
// Platform seams
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Next batch of trigger events. An empty batch means the source is
    /// currently drained.
    async fn next_events(&self) -> Result<Vec<TriggerEvent>>;
}

#[async_trait]
pub trait ThreadFetcher: Send + Sync {
    /// Resolve a node by its platform id.
    async fn node(&self, id: &str) -> Result<ThreadNode>;

    /// Resolve the parent of a comment.
    async fn parent_of(&self, comment_id: &str) -> Result<ThreadNode>;
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Deliver the report as a reply to the triggering comment. Returns
    /// the posted reply's id, which becomes the analysis id.
    async fn post_reply(&self, event: &TriggerEvent, report: &Report) -> Result<String>;
}
