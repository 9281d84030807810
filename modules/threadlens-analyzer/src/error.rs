use ai_client::ExtractError;
use threadlens_store::StoreError;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("malformed thread: {0}")]
    MalformedThread(String),

    #[error(transparent)]
    Backend(#[from] ExtractError),

    #[error("reply delivery failed: {0}")]
    ReplyDelivery(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
