/// Failures from a structured-extraction call.
///
/// Callers own the retry policy. `MalformedOutput` means the backend
/// answered but the payload did not conform to the requested schema;
/// the caller must substitute a safe default rather than propagate the
/// raw text. `BackendUnavailable` covers transport, auth, and quota
/// failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractError {
    #[error("backend returned non-conforming output: {0}")]
    MalformedOutput(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}
