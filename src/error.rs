//! Pipeline error taxonomy.
//!
//! Every fallible operation in the crate returns [`PipelineResult`]. The
//! variants are classification boundaries: retry logic keys off
//! [`PipelineError::is_retryable`], the HTTP layer maps variants to status
//! codes, and the provider error ring records [`PipelineError::category`].

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad input or state: malformed request, inactive criteria set,
    /// unparseable model output. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The provider call itself failed (transport, 5xx, auth). Retryable
    /// with exponential backoff.
    #[error("provider invocation failed: {0}")]
    ProviderInvocation(String),

    /// The provider throttled the call. Retryable after a fixed delay.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// The model does not exist or cannot be invoked on demand. Not
    /// retryable; the configuration has to change first.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Invalid service configuration, including a rubric that does not
    /// partition the score range. Fails closed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An illegal state transition or a conflicting concurrent write.
    #[error("concurrency violation: {0}")]
    Concurrency(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl PipelineError {
    /// Whether a retry of the same call can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::ProviderInvocation(_) | PipelineError::RateLimit(_)
        )
    }

    /// Stable classification tag for structured logs and the error ring.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::ProviderInvocation(_) => "provider_invocation",
            PipelineError::RateLimit(_) => "rate_limit",
            PipelineError::ModelUnavailable(_) => "model_unavailable",
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Concurrency(_) => "concurrency",
            PipelineError::NotFound(_) => "not_found",
        }
    }
}
