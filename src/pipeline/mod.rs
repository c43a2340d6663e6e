//! Pipeline core.
//!
//! This module contains:
//! - tracker: lifecycle state machine and monotonic progress writes
//! - retry: bounded retry-with-backoff around provider calls
//! - summarizer: phase 1, per-document and combined synopses
//! - evaluator: phase 2, per-criteria retrieval, grading, and persistence
//! - synthesis: phase 3, overall narrative and aggregate score
//! - worker: consumes one job message and runs phases 1-3 sequentially

pub mod evaluator;
pub mod retry;
pub mod summarizer;
pub mod synthesis;
pub mod tracker;
pub mod worker;

use std::sync::Arc;

use crate::domain::{AiModel, AiProvider};
use crate::providers::ProviderRouter;
use crate::retrieval::DocumentIndex;
use crate::store::{CriteriaCatalog, EvaluationStore, ResultStore};

pub use retry::RetryPolicy;
pub use tracker::ProgressTracker;
pub use worker::Worker;

/// Shared dependencies threaded through all pipeline phases.
///
/// Resolved once per worker; the per-evaluation rubric and prompt bundle is
/// resolved separately per run and passed by parameter.
pub struct PipelineContext {
    pub evaluations: Arc<dyn EvaluationStore>,
    pub results: Arc<dyn ResultStore>,
    pub catalog: Arc<dyn CriteriaCatalog>,
    pub index: Arc<dyn DocumentIndex>,
    pub router: Arc<ProviderRouter>,
    pub provider: AiProvider,
    pub model: AiModel,
    pub retry: RetryPolicy,
}
