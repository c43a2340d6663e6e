//! Domain types for the evaluation pipeline.
//!
//! This module contains the core data structures:
//! - Evaluation: one evaluation run and its lifecycle state
//! - Criteria: versioned requirement collections the pipeline reads
//! - Rubric: score-to-status mapping and its resolution hierarchy
//! - Result: immutable AI results and the append-only edit overlay
//! - Provider: AI backend configuration rows

pub mod criteria;
pub mod evaluation;
pub mod provider;
pub mod result;
pub mod rubric;

// Re-export commonly used types
pub use criteria::{CriteriaItem, CriteriaSet, DocumentType};
pub use evaluation::{DocumentLink, Evaluation, EvaluationStatus};
pub use provider::{AiModel, AiProvider, ProviderFamily, ValidationCategory};
pub use result::{CriteriaResult, ResultEdit};
pub use rubric::{ResolvedEvalConfig, RubricTier, ScoringRubric};
