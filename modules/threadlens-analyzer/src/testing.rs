// Test mocks for the analysis pipeline.
//
// Four mocks matching the four trait boundaries:
// - MockBackend (StructuredBackend) — queued extraction responses plus
//   grounded responses keyed by document substring, with a dispatch counter
// - MockThreadFetcher (ThreadFetcher) — HashMap-based node store
// - MockReplySink (ReplySink) — records posted reports, mints reply ids
// - VecEventSource (EventSource) — hands out a fixed batch once
//
// Plus helpers for constructing events, nodes, documents, and findings.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use ai_client::{Citation, ExtractError};
use threadlens_common::{
    ArgumentType, Claim, CommentFinding, EntryRole, Report, ThreadDocument, ThreadEntry,
    ThreadNode, TriggerEvent,
};

use crate::traits::{EventSource, ReplySink, StructuredBackend, ThreadFetcher};

// ---------------------------------------------------------------------------
// MockBackend
// ---------------------------------------------------------------------------

type CannedResponse = std::result::Result<serde_json::Value, ExtractError>;

/// Canned structured-output backend. Plain extractions are consumed in
/// call order; grounded responses match on a substring of the document.
#[derive(Default)]
pub struct MockBackend {
    extractions: Mutex<VecDeque<CannedResponse>>,
    grounded: Mutex<Vec<(String, CannedResponse)>>,
    grounded_citations: Mutex<Vec<Citation>>,
    grounded_dispatches: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain extraction response; consumed in call order.
    pub fn on_extraction(self, response: CannedResponse) -> Self {
        self.extractions.lock().unwrap().push_back(response);
        self
    }

    /// Respond to any grounded call whose document contains `needle`.
    pub fn on_grounded(self, needle: &str, response: CannedResponse) -> Self {
        self.grounded
            .lock()
            .unwrap()
            .push((needle.to_string(), response));
        self
    }

    /// Citations attached to every successful grounded response.
    pub fn with_grounded_citations(self, citations: Vec<Citation>) -> Self {
        *self.grounded_citations.lock().unwrap() = citations;
        self
    }

    /// How many grounded verifications were dispatched.
    pub fn grounded_dispatches(&self) -> usize {
        self.grounded_dispatches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuredBackend for MockBackend {
    async fn extract_json(
        &self,
        _system_prompt: &str,
        _document: &str,
        _schema: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ExtractError> {
        self.extractions.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ExtractError::BackendUnavailable(
                "no queued extraction response".to_string(),
            ))
        })
    }

    async fn extract_grounded_json(
        &self,
        _system_prompt: &str,
        document: &str,
        _schema: serde_json::Value,
    ) -> std::result::Result<(serde_json::Value, Vec<Citation>), ExtractError> {
        self.grounded_dispatches.fetch_add(1, Ordering::SeqCst);

        let grounded = self.grounded.lock().unwrap();
        for (needle, response) in grounded.iter() {
            if document.contains(needle.as_str()) {
                let citations = self.grounded_citations.lock().unwrap().clone();
                return response.clone().map(|value| (value, citations));
            }
        }
        Err(ExtractError::BackendUnavailable(format!(
            "no grounded response matches document: {document}"
        )))
    }
}

// ---------------------------------------------------------------------------
// MockThreadFetcher
// ---------------------------------------------------------------------------

/// HashMap-based node store. Returns `Err` for unregistered ids.
#[derive(Default)]
pub struct MockThreadFetcher {
    nodes: HashMap<String, ThreadNode>,
}

impl MockThreadFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: ThreadNode) -> Self {
        self.nodes.insert(node.id().to_string(), node);
        self
    }
}

#[async_trait]
impl ThreadFetcher for MockThreadFetcher {
    async fn node(&self, id: &str) -> Result<ThreadNode> {
        match self.nodes.get(id) {
            Some(node) => Ok(node.clone()),
            None => bail!("unknown node {id}"),
        }
    }

    async fn parent_of(&self, comment_id: &str) -> Result<ThreadNode> {
        match self.nodes.get(comment_id) {
            Some(ThreadNode::Comment { parent_id, .. }) => self.node(parent_id).await,
            Some(_) => bail!("node {comment_id} is not a comment"),
            None => bail!("unknown comment {comment_id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockReplySink
// ---------------------------------------------------------------------------

/// Records every posted report and mints sequential reply ids.
#[derive(Default)]
pub struct MockReplySink {
    posted: Mutex<Vec<(String, Report)>>,
    counter: AtomicUsize,
    fail: bool,
}

impl MockReplySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every delivery.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// All reports posted so far, with the trigger comment they replied to.
    pub fn posted(&self) -> Vec<(String, Report)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySink for MockReplySink {
    async fn post_reply(&self, event: &TriggerEvent, report: &Report) -> Result<String> {
        if self.fail {
            bail!("delivery rejected");
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.posted
            .lock()
            .unwrap()
            .push((event.trigger_comment_id.clone(), report.clone()));
        Ok(format!("reply_{n}"))
    }
}

// ---------------------------------------------------------------------------
// VecEventSource
// ---------------------------------------------------------------------------

/// Hands out one fixed batch of events, then reports drained.
pub struct VecEventSource {
    events: Mutex<Option<Vec<TriggerEvent>>>,
}

impl VecEventSource {
    pub fn new(events: Vec<TriggerEvent>) -> Self {
        Self {
            events: Mutex::new(Some(events)),
        }
    }
}

#[async_trait]
impl EventSource for VecEventSource {
    async fn next_events(&self) -> Result<Vec<TriggerEvent>> {
        Ok(self.events.lock().unwrap().take().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

pub fn post(id: &str, title: &str, body: &str, author: &str) -> ThreadNode {
    ThreadNode::Post {
        id: id.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        author: author.to_string(),
    }
}

pub fn comment(id: &str, body: &str, author: &str, parent_id: &str) -> ThreadNode {
    ThreadNode::Comment {
        id: id.to_string(),
        body: body.to_string(),
        author: author.to_string(),
        parent_id: parent_id.to_string(),
    }
}

pub fn trigger_event(thread_id: &str, trigger_comment_id: &str) -> TriggerEvent {
    TriggerEvent {
        event_id: format!("evt_{trigger_comment_id}"),
        thread_id: thread_id.to_string(),
        trigger_comment_id: trigger_comment_id.to_string(),
        community_id: "r/debates".to_string(),
        author: "dave".to_string(),
        body: "!threadlens".to_string(),
    }
}

pub fn claim(comment_ref: &str, author: &str, text: &str) -> Claim {
    Claim {
        comment_ref: comment_ref.to_string(),
        author: author.to_string(),
        claim_text: text.to_string(),
        supporting_arguments: Vec::new(),
    }
}

pub fn finding(comment_ref: &str, author: &str) -> CommentFinding {
    CommentFinding {
        comment_ref: comment_ref.to_string(),
        author: author.to_string(),
        comment_summary: format!("summary of {comment_ref}"),
        argument_type: ArgumentType::ValidArgument,
        fallacy_type: None,
        flaw_description: None,
        fact_check: None,
    }
}

/// A document with a root post and one comment.
pub fn document_with_comment(comment_ref: &str, author: &str, text: &str) -> ThreadDocument {
    document_with_comments(&[(comment_ref, author, text)])
}

/// A document with a root post and the given comments, in order.
pub fn document_with_comments(comments: &[(&str, &str, &str)]) -> ThreadDocument {
    let mut entries = vec![ThreadEntry {
        comment_ref: "t3_root".to_string(),
        author: "op".to_string(),
        role: EntryRole::Post,
        text: "Root post".to_string(),
    }];
    for (comment_ref, author, text) in comments {
        entries.push(ThreadEntry {
            comment_ref: comment_ref.to_string(),
            author: author.to_string(),
            role: EntryRole::Comment,
            text: text.to_string(),
        });
    }
    ThreadDocument { entries }
}
