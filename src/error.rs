use thiserror::Error;

/// Failures from an embedding or generation backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend answered with a non-success HTTP status.
    #[error("provider API error ({status}): {body}")]
    Api { status: u16, body: String },
    /// The request never completed (connect, timeout, body transfer).
    #[error("provider transport error: {0}")]
    Transport(String),
    /// The response parsed but did not have the agreed shape. This signals an
    /// incompatible API contract rather than a transient fault.
    #[error("provider response violated the API contract: {0}")]
    Contract(String),
}

impl ProviderError {
    /// Whether a retry has any chance of succeeding. Status and transport
    /// failures are retried up to the ceiling; contract violations signal an
    /// incompatible API and never are.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Contract(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

/// Failures from the backing vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector store error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("vector store transport error: {0}")]
    Transport(String),
    #[error("vector store returned an unexpected response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

/// Top-level error for ingestion and retrieval calls.
///
/// Empty-result conditions (no collections, nothing over the similarity
/// threshold) are not errors and live in
/// [`crate::retrieve::RetrievalOutcome`] instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or empty input. Reported immediately, nothing retried.
    #[error("invalid input: {0}")]
    Validation(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Api { status: 429, body: String::new() }.is_retryable());
        assert!(ProviderError::Api { status: 503, body: String::new() }.is_retryable());
        assert!(ProviderError::Api { status: 400, body: String::new() }.is_retryable());
        assert!(ProviderError::Api { status: 401, body: String::new() }.is_retryable());
        assert!(ProviderError::Transport("connection reset".into()).is_retryable());
        assert!(!ProviderError::Contract("missing data field".into()).is_retryable());
    }
}
