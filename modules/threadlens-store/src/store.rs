use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{Result, StoreError};

/// The analysis-wide row: one per successfully posted reply. `analysis_id`
/// is the reply's own id, which makes it globally unique and a stable join
/// key.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AnalysisContext {
    pub analysis_id: String,
    pub trigger_comment_id: String,
    pub thread_id: String,
    pub community_id: String,
    pub overall_summary: String,
    pub overall_argument_type: String,
}

/// One analyzed comment under a context.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CommentAnalysisRow {
    pub comment_id: String,
    pub analysis_id: String,
    pub author: String,
    pub comment_summary: String,
    pub argument_type: String,
    pub fallacy_type: Option<String>,
    pub flaw_description: Option<String>,
}

/// A `comment_analysis` row joined with its context, for author history.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AuthorHistoryRow {
    pub comment_id: String,
    pub analysis_id: String,
    pub author: String,
    pub comment_summary: String,
    pub argument_type: String,
    pub fallacy_type: Option<String>,
    pub flaw_description: Option<String>,
    pub trigger_comment_id: String,
    pub thread_id: String,
    pub community_id: String,
    pub overall_argument_type: String,
}

#[derive(Clone)]
pub struct AnalysisStore {
    pool: SqlitePool,
}

impl AnalysisStore {
    /// Open (or create) the store at `path`. The passphrase is applied as a
    /// SQLCipher `PRAGMA key` on every connection; an absent passphrase is a
    /// hard error rather than a silently unencrypted store.
    pub async fn open(path: &str, passphrase: &str) -> Result<Self> {
        if passphrase.trim().is_empty() {
            return Err(StoreError::MissingPassphrase);
        }

        let key = format!("'{}'", passphrase.replace('\'', "''"));
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .pragma("key", key)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Atomically record one analysis: the context row plus all of its
    /// per-comment rows in a single transaction. Any row failure rolls the
    /// whole write back. Re-running with the same `analysis_id` replaces the
    /// prior rows instead of appending, so redelivery cannot duplicate.
    pub async fn put_analysis(
        &self,
        context: &AnalysisContext,
        rows: &[CommentAnalysisRow],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO analysis_context
                (analysis_id, trigger_comment_id, thread_id, community_id,
                 overall_summary, overall_argument_type)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(analysis_id) DO UPDATE SET
                trigger_comment_id = excluded.trigger_comment_id,
                thread_id = excluded.thread_id,
                community_id = excluded.community_id,
                overall_summary = excluded.overall_summary,
                overall_argument_type = excluded.overall_argument_type
            "#,
        )
        .bind(&context.analysis_id)
        .bind(&context.trigger_comment_id)
        .bind(&context.thread_id)
        .bind(&context.community_id)
        .bind(&context.overall_summary)
        .bind(&context.overall_argument_type)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM comment_analysis WHERE analysis_id = ?1")
            .bind(&context.analysis_id)
            .execute(&mut *tx)
            .await?;

        for row in rows {
            // REPLACE also handles a comment previously analyzed under a
            // different context: the most recent write wins.
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO comment_analysis
                    (comment_id, analysis_id, author, comment_summary,
                     argument_type, fallacy_type, flaw_description)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&row.comment_id)
            .bind(&context.analysis_id)
            .bind(&row.author)
            .bind(&row.comment_summary)
            .bind(&row.argument_type)
            .bind(&row.fallacy_type)
            .bind(&row.flaw_description)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            analysis_id = context.analysis_id.as_str(),
            rows = rows.len(),
            "Analysis stored"
        );
        Ok(())
    }

    /// One context row by id, if present.
    pub async fn get_context(&self, analysis_id: &str) -> Result<Option<AnalysisContext>> {
        let row = sqlx::query_as::<_, AnalysisContext>(
            "SELECT * FROM analysis_context WHERE analysis_id = ?1",
        )
        .bind(analysis_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Everything a given author has had analyzed, joined with its context,
    /// ordered by thread then comment.
    pub async fn history(&self, author: &str) -> Result<Vec<AuthorHistoryRow>> {
        let rows = sqlx::query_as::<_, AuthorHistoryRow>(
            r#"
            SELECT
                ca.comment_id,
                ca.analysis_id,
                ca.author,
                ca.comment_summary,
                ca.argument_type,
                ca.fallacy_type,
                ca.flaw_description,
                ac.trigger_comment_id,
                ac.thread_id,
                ac.community_id,
                ac.overall_argument_type
            FROM comment_analysis AS ca
            JOIN analysis_context AS ac ON ca.analysis_id = ac.analysis_id
            WHERE ca.author = ?1
            ORDER BY ac.thread_id, ca.comment_id
            "#,
        )
        .bind(author)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> AnalysisStore {
        let path = dir.path().join("test.db");
        let store = AnalysisStore::open(path.to_str().unwrap(), "test-passphrase")
            .await
            .unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn context(analysis_id: &str) -> AnalysisContext {
        AnalysisContext {
            analysis_id: analysis_id.to_string(),
            trigger_comment_id: "t1_trigger".to_string(),
            thread_id: "t3_thread".to_string(),
            community_id: "r/debates".to_string(),
            overall_summary: "Mixed discussion.".to_string(),
            overall_argument_type: "mixed_discussion".to_string(),
        }
    }

    fn row(comment_id: &str, author: &str) -> CommentAnalysisRow {
        CommentAnalysisRow {
            comment_id: comment_id.to_string(),
            analysis_id: String::new(), // assigned by put_analysis
            author: author.to_string(),
            comment_summary: format!("summary of {comment_id}"),
            argument_type: "fallacy".to_string(),
            fallacy_type: Some("Bandwagon".to_string()),
            flaw_description: Some("Popularity is not evidence.".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_passphrase_fails_fast() {
        let err = AnalysisStore::open("unused.db", "   ").await.unwrap_err();
        assert!(matches!(err, StoreError::MissingPassphrase));
    }

    #[tokio::test]
    async fn test_roundtrip_three_findings() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let rows = vec![row("t1_a", "alice"), row("t1_b", "alice"), row("t1_c", "alice")];
        store.put_analysis(&context("reply_1"), &rows).await.unwrap();

        let history = store.history("alice").await.unwrap();
        assert_eq!(history.len(), 3);
        for (stored, original) in history.iter().zip(&rows) {
            assert_eq!(stored.comment_id, original.comment_id);
            assert_eq!(stored.analysis_id, "reply_1");
            assert_eq!(stored.comment_summary, original.comment_summary);
            assert_eq!(stored.argument_type, original.argument_type);
            assert_eq!(stored.fallacy_type, original.fallacy_type);
            assert_eq!(stored.flaw_description, original.flaw_description);
            assert_eq!(stored.thread_id, "t3_thread");
            assert_eq!(stored.community_id, "r/debates");
        }
    }

    #[tokio::test]
    async fn test_put_analysis_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let rows = vec![row("t1_a", "alice"), row("t1_b", "bob")];
        store.put_analysis(&context("reply_1"), &rows).await.unwrap();
        store.put_analysis(&context("reply_1"), &rows).await.unwrap();

        let stored = store.get_context("reply_1").await.unwrap().unwrap();
        assert_eq!(stored, context("reply_1"));

        assert_eq!(store.history("alice").await.unwrap().len(), 1);
        assert_eq!(store.history("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_replaces_rows() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store
            .put_analysis(&context("reply_1"), &[row("t1_a", "alice"), row("t1_b", "alice")])
            .await
            .unwrap();
        store
            .put_analysis(&context("reply_1"), &[row("t1_c", "alice")])
            .await
            .unwrap();

        let history = store.history("alice").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].comment_id, "t1_c");
    }

    #[tokio::test]
    async fn test_comment_moves_to_most_recent_context() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store
            .put_analysis(&context("reply_1"), &[row("t1_a", "alice")])
            .await
            .unwrap();
        store
            .put_analysis(&context("reply_2"), &[row("t1_a", "alice")])
            .await
            .unwrap();

        let history = store.history("alice").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].analysis_id, "reply_2");
    }

    #[tokio::test]
    async fn test_history_empty_for_unknown_author() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        assert!(store.history("nobody").await.unwrap().is_empty());
    }
}
