//! SQLite persistence for thread analyses.
//!
//! Two tables: one `analysis_context` row per posted reply, many
//! `comment_analysis` rows referencing it. The reply id doubles as the
//! context primary key, so redelivered events collapse onto the same row.

pub mod error;
mod store;

pub use error::{Result, StoreError};
pub use store::{AnalysisContext, AnalysisStore, AuthorHistoryRow, CommentAnalysisRow};
