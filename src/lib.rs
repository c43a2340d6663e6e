//! appraise - Asynchronous document evaluation pipeline
//!
//! Evaluates documents against configurable criteria sets, producing
//! AI-generated, citation-grounded assessments with numeric scores and a
//! human edit overlay.
//!
//! # Architecture
//!
//! - A dispatcher validates a request, persists the evaluation header, and
//!   enqueues exactly one job message
//! - A single-threaded worker consumes one message at a time and runs three
//!   phases sequentially: summarize documents, evaluate criteria, and
//!   synthesize an overall assessment
//! - A state machine tracks lifecycle status and monotonic progress, which
//!   clients poll independently of the worker
//! - Status labels are never stored: they are derived from the numeric
//!   score through the resolved rubric at read time
//!
//! # Modules
//!
//! - `domain`: Data structures (Evaluation, CriteriaResult, ScoringRubric)
//! - `pipeline`: Worker, phases, tracker, retry policy
//! - `providers`: AI provider routing and identifier correction
//! - `retrieval`: Document index collaborator boundary
//! - `store`: Persistence traits and the in-memory store
//! - `dispatch`: Job dispatcher and work queue
//! - `server`: HTTP CRUD surface

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod store;

// Re-export main types at crate root for convenience
pub use dispatch::{JobDispatcher, JobMessage};
pub use domain::{
    CriteriaItem, CriteriaResult, CriteriaSet, Evaluation, EvaluationStatus, ResultEdit,
    ScoringRubric,
};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{PipelineContext, ProgressTracker, RetryPolicy, Worker};
pub use providers::ProviderRouter;
pub use store::MemoryStore;
