// File-backed adapters for the external collaborators: a JSON-lines event
// feed, a JSON thread snapshot, and a sink that logs the report instead of
// posting it. They let the pipeline run end-to-end without platform
// credentials; real platform adapters live outside this repository.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use threadlens_common::{Report, ThreadNode, TriggerEvent};

use crate::traits::{EventSource, ReplySink, ThreadFetcher};

// ---------------------------------------------------------------------------
// FileEventSource
// ---------------------------------------------------------------------------

/// Trigger events from a JSON-lines file, handed out as one batch.
pub struct FileEventSource {
    events: Mutex<Option<Vec<TriggerEvent>>>,
}

impl FileEventSource {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading events file {}", path.display()))?;

        let mut events = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            events.push(
                serde_json::from_str(line)
                    .with_context(|| format!("parsing trigger event: {line}"))?,
            );
        }

        info!(count = events.len(), path = %path.display(), "Loaded trigger events");
        Ok(Self {
            events: Mutex::new(Some(events)),
        })
    }
}

#[async_trait]
impl EventSource for FileEventSource {
    async fn next_events(&self) -> Result<Vec<TriggerEvent>> {
        Ok(self.events.lock().unwrap().take().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// SnapshotThreadFetcher
// ---------------------------------------------------------------------------

/// A discussion tree loaded from a JSON array of nodes.
pub struct SnapshotThreadFetcher {
    nodes: HashMap<String, ThreadNode>,
}

impl SnapshotThreadFetcher {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading thread snapshot {}", path.display()))?;
        let parsed: Vec<ThreadNode> =
            serde_json::from_str(&raw).context("parsing thread snapshot")?;

        let mut nodes = HashMap::new();
        for node in parsed {
            nodes.insert(node.id().to_string(), node);
        }

        info!(count = nodes.len(), path = %path.display(), "Loaded thread snapshot");
        Ok(Self { nodes })
    }
}

#[async_trait]
impl ThreadFetcher for SnapshotThreadFetcher {
    async fn node(&self, id: &str) -> Result<ThreadNode> {
        match self.nodes.get(id) {
            Some(node) => Ok(node.clone()),
            None => bail!("snapshot has no node {id}"),
        }
    }

    async fn parent_of(&self, comment_id: &str) -> Result<ThreadNode> {
        match self.nodes.get(comment_id) {
            Some(ThreadNode::Comment { parent_id, .. }) => self.node(parent_id).await,
            Some(_) => bail!("node {comment_id} is not a comment"),
            None => bail!("snapshot has no comment {comment_id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingReplySink
// ---------------------------------------------------------------------------

/// Logs the report instead of delivering it, minting a fresh reply id.
#[derive(Default)]
pub struct LoggingReplySink;

impl LoggingReplySink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReplySink for LoggingReplySink {
    async fn post_reply(&self, event: &TriggerEvent, report: &Report) -> Result<String> {
        let reply_id = Uuid::new_v4().to_string();
        info!(
            trigger = event.trigger_comment_id.as_str(),
            reply_id = reply_id.as_str(),
            report = %serde_json::to_string_pretty(report).unwrap_or_default(),
            "Reply (not delivered, replay mode)"
        );
        Ok(reply_id)
    }
}
