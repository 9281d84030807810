use std::collections::HashSet;

use threadlens_common::{EntryRole, ThreadDocument, ThreadEntry, ThreadNode};

use crate::error::{AnalyzerError, Result};
use crate::traits::ThreadFetcher;

/// Converts the tree-shaped discussion into the single ordered document the
/// extraction stages analyze.
pub struct ThreadLinearizer<'a> {
    fetcher: &'a dyn ThreadFetcher,
}

impl<'a> ThreadLinearizer<'a> {
    pub fn new(fetcher: &'a dyn ThreadFetcher) -> Self {
        Self { fetcher }
    }

    /// Walk upward from the triggering comment to the root post and return
    /// the linearized document: post first, ancestors oldest-first. The
    /// trigger's own body is not part of the document.
    ///
    /// The parent chain is acyclic by construction of the platform, but the
    /// walk still stops on a revisited node or an unrecognized node type
    /// rather than trusting that.
    pub async fn linearize(&self, trigger_comment_id: &str) -> Result<ThreadDocument> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(trigger_comment_id.to_string());

        let mut ancestors: Vec<ThreadEntry> = Vec::new();
        let mut current = self.fetcher.parent_of(trigger_comment_id).await?;

        let post = loop {
            match current {
                ThreadNode::Post {
                    id,
                    title,
                    body,
                    author,
                } => {
                    break ThreadEntry {
                        comment_ref: id,
                        author,
                        role: EntryRole::Post,
                        text: join_title_body(&title, &body),
                    };
                }
                ThreadNode::Comment {
                    id, body, author, ..
                } => {
                    if !visited.insert(id.clone()) {
                        return Err(AnalyzerError::MalformedThread(format!(
                            "cycle detected at comment {id}"
                        )));
                    }
                    ancestors.push(ThreadEntry {
                        comment_ref: id.clone(),
                        author,
                        role: EntryRole::Comment,
                        text: body,
                    });
                    current = self.fetcher.parent_of(&id).await?;
                }
                ThreadNode::Unknown { id } => {
                    return Err(AnalyzerError::MalformedThread(format!(
                        "unrecognized node type at {id}"
                    )));
                }
            }
        };

        // Walked newest-first; the document wants oldest-first.
        ancestors.reverse();

        let mut entries = Vec::with_capacity(ancestors.len() + 1);
        entries.push(post);
        entries.extend(ancestors);
        Ok(ThreadDocument { entries })
    }
}

fn join_title_body(title: &str, body: &str) -> String {
    match (title.trim().is_empty(), body.trim().is_empty()) {
        (false, false) => format!("{title}\n\n{body}"),
        (false, true) => title.to_string(),
        (true, false) => body.to_string(),
        (true, true) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{comment, post, MockThreadFetcher};

    #[tokio::test]
    async fn test_preserves_root_to_trigger_order() {
        let fetcher = MockThreadFetcher::new()
            .with_node(post("t3_root", "Is the sky blue?", "Genuine question.", "bob"))
            .with_node(comment("t1_a", "It looks blue to me.", "alice", "t3_root"))
            .with_node(comment("t1_b", "Only during the day.", "carol", "t1_a"))
            .with_node(comment("t1_trigger", "!threadlens", "dave", "t1_b"));

        let doc = ThreadLinearizer::new(&fetcher)
            .linearize("t1_trigger")
            .await
            .unwrap();

        let refs: Vec<&str> = doc.entries.iter().map(|e| e.comment_ref.as_str()).collect();
        assert_eq!(refs, vec!["t3_root", "t1_a", "t1_b"]);
        assert_eq!(doc.entries[0].role, EntryRole::Post);
        assert_eq!(doc.entries[0].text, "Is the sky blue?\n\nGenuine question.");
    }

    #[tokio::test]
    async fn test_trigger_body_excluded() {
        let fetcher = MockThreadFetcher::new()
            .with_node(post("t3_root", "Title", "Body", "bob"))
            .with_node(comment("t1_trigger", "!threadlens please", "dave", "t3_root"));

        let doc = ThreadLinearizer::new(&fetcher)
            .linearize("t1_trigger")
            .await
            .unwrap();

        assert_eq!(doc.entries.len(), 1);
        assert!(!doc.render().contains("!threadlens"));
    }

    #[tokio::test]
    async fn test_cycle_is_malformed() {
        // a → b → a
        let fetcher = MockThreadFetcher::new()
            .with_node(comment("t1_a", "first", "alice", "t1_b"))
            .with_node(comment("t1_b", "second", "bob", "t1_a"))
            .with_node(comment("t1_trigger", "!threadlens", "dave", "t1_a"));

        let err = ThreadLinearizer::new(&fetcher)
            .linearize("t1_trigger")
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzerError::MalformedThread(_)));
    }

    #[tokio::test]
    async fn test_unknown_node_is_malformed() {
        let fetcher = MockThreadFetcher::new()
            .with_node(ThreadNode::Unknown {
                id: "x_weird".to_string(),
            })
            .with_node(comment("t1_trigger", "!threadlens", "dave", "x_weird"));

        let err = ThreadLinearizer::new(&fetcher)
            .linearize("t1_trigger")
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzerError::MalformedThread(_)));
    }

    #[tokio::test]
    async fn test_empty_post_yields_empty_document() {
        let fetcher = MockThreadFetcher::new()
            .with_node(post("t3_root", "", "  ", "bob"))
            .with_node(comment("t1_trigger", "!threadlens", "dave", "t3_root"));

        let doc = ThreadLinearizer::new(&fetcher)
            .linearize("t1_trigger")
            .await
            .unwrap();

        assert!(doc.is_empty_of_content());
    }
}
