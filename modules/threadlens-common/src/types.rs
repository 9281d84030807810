use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Trigger events ---

/// A reply that armed the pipeline. Produced by the external event source;
/// immutable, consumed once. Redelivery of the same `trigger_comment_id`
/// is absorbed by the store's replace-style upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_id: String,
    pub thread_id: String,
    pub trigger_comment_id: String,
    pub community_id: String,
    pub author: String,
    pub body: String,
}

// --- Thread shape ---

/// A node in the discussion tree, as resolved by the platform fetcher.
///
/// `Unknown` is anything the fetcher could not classify; traversal treats
/// it as a malformed thread rather than guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThreadNode {
    Post {
        id: String,
        title: String,
        body: String,
        author: String,
    },
    Comment {
        id: String,
        body: String,
        author: String,
        parent_id: String,
    },
    Unknown {
        id: String,
    },
}

impl ThreadNode {
    pub fn id(&self) -> &str {
        match self {
            ThreadNode::Post { id, .. }
            | ThreadNode::Comment { id, .. }
            | ThreadNode::Unknown { id } => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRole {
    Post,
    Comment,
}

impl EntryRole {
    fn label(self) -> &'static str {
        match self {
            EntryRole::Post => "POST",
            EntryRole::Comment => "COMMENT",
        }
    }
}

/// One linearized thread element with stable author attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadEntry {
    pub comment_ref: String,
    pub author: String,
    pub role: EntryRole,
    pub text: String,
}

/// The linearized thread: root post first, then ancestor comments
/// oldest-first, ending at the comment immediately preceding the trigger.
/// Built fresh per event; never persisted.
#[derive(Debug, Clone, Default)]
pub struct ThreadDocument {
    pub entries: Vec<ThreadEntry>,
}

impl ThreadDocument {
    /// The set of comment references present in the document. Extraction
    /// output naming anything outside this set is dropped.
    pub fn comment_refs(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.comment_ref.as_str()).collect()
    }

    /// Document position of a comment reference, for output ordering.
    pub fn position_of(&self, comment_ref: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.comment_ref == comment_ref)
    }

    /// True when there is nothing to analyze: no ancestor comments and a
    /// blank root post.
    pub fn is_empty_of_content(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.role == EntryRole::Post && e.text.trim().is_empty())
    }

    /// Render the document in the deterministic attribution format the
    /// extraction prompts parse:
    ///
    /// ```text
    /// === POST id=t3_abc author=bob ===
    /// <title and body>
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "=== {} id={} author={} ===\n{}\n\n",
                entry.role.label(),
                entry.comment_ref,
                entry.author,
                entry.text
            ));
        }
        out
    }
}

// --- Claims and verdicts ---

/// An atomic factual assertion extracted from a comment, with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub comment_ref: String,
    pub author: String,
    pub claim_text: String,
    pub supporting_arguments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    True,
    False,
    PartiallyTrue,
    Unproven,
    Debated,
}

/// The outcome of verifying one claim against external evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckVerdict {
    pub comment_ref: String,
    pub verdict: Verdict,
    pub explanation: String,
    pub citations: Vec<String>,
}

impl FactCheckVerdict {
    /// Placeholder merged in when a claim's verification never produced a
    /// usable verdict.
    pub fn unproven(comment_ref: impl Into<String>) -> Self {
        Self {
            comment_ref: comment_ref.into(),
            verdict: Verdict::Unproven,
            explanation: "This claim could not be verified.".to_string(),
            citations: Vec::new(),
        }
    }
}

// --- Findings and reports ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentType {
    ValidArgument,
    Fallacy,
    NoArgumentFound,
}

impl ArgumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ArgumentType::ValidArgument => "valid_argument",
            ArgumentType::Fallacy => "fallacy",
            ArgumentType::NoArgumentFound => "no_argument_found",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverallArgumentType {
    ValidDiscussion,
    FallaciousDiscussion,
    MixedDiscussion,
    NoArgumentsFound,
}

impl OverallArgumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            OverallArgumentType::ValidDiscussion => "valid_discussion",
            OverallArgumentType::FallaciousDiscussion => "fallacious_discussion",
            OverallArgumentType::MixedDiscussion => "mixed_discussion",
            OverallArgumentType::NoArgumentsFound => "no_arguments_found",
        }
    }
}

/// Per-comment analysis result. `fallacy_type` and `flaw_description` are
/// populated only when `argument_type` is `Fallacy`; `fact_check` only when
/// the comment carried at least one extracted claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentFinding {
    pub comment_ref: String,
    pub author: String,
    pub comment_summary: String,
    pub argument_type: ArgumentType,
    pub fallacy_type: Option<String>,
    pub flaw_description: Option<String>,
    pub fact_check: Option<FactCheckVerdict>,
}

/// The merged, ordered analysis of one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub overall_summary: String,
    pub overall_argument_type: OverallArgumentType,
    pub findings: Vec<CommentFinding>,
}

impl Report {
    /// Fixed value for a thread with nothing to analyze.
    pub fn nothing_to_analyze() -> Self {
        Self {
            overall_summary: "No relevant comments found in the discussion thread to analyze."
                .to_string(),
            overall_argument_type: OverallArgumentType::NoArgumentsFound,
            findings: Vec::new(),
        }
    }

    /// Fixed apology posted when analysis fails outright. Never persisted.
    pub fn analysis_failed() -> Self {
        Self {
            overall_summary:
                "Sorry, this discussion could not be analyzed. Please try again later."
                    .to_string(),
            overall_argument_type: OverallArgumentType::NoArgumentsFound,
            findings: Vec::new(),
        }
    }
}
