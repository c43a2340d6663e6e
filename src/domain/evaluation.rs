//! Evaluation rows and lifecycle state.
//!
//! An Evaluation represents a single run of the pipeline over one or more
//! documents. Its status and progress are mutated only by the worker
//! processing it; the read API observes them at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Unique identifier for this evaluation
    pub id: Uuid,

    /// Owning workspace
    pub workspace_id: Uuid,

    /// Document type the criteria set applies to
    pub doc_type_id: Uuid,

    /// Criteria set this evaluation is graded against
    pub criteria_set_id: Uuid,

    /// Lifecycle state
    pub status: EvaluationStatus,

    /// Completion percentage, 0-100, monotonic while processing
    pub progress: u8,

    /// Combined synopsis of the input documents
    pub document_summary: Option<String>,

    /// Overall assessment produced by the synthesis phase
    pub evaluation_summary: Option<String>,

    /// Weighted mean of all scored criteria, None until completed
    pub aggregate_score: Option<f64>,

    /// When processing started
    pub started_at: DateTime<Utc>,

    /// When processing reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Actionable description of why the evaluation failed
    pub error_message: Option<String>,

    /// Soft-delete marker; deleted rows are filtered from reads
    pub deleted: bool,
}

impl Evaluation {
    /// Create a new pending evaluation.
    pub fn new(workspace_id: Uuid, doc_type_id: Uuid, criteria_set_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            doc_type_id,
            criteria_set_id,
            status: EvaluationStatus::Pending,
            progress: 0,
            document_summary: None,
            evaluation_summary: None,
            aggregate_score: None,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            deleted: false,
        }
    }

    /// Check if the evaluation has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            EvaluationStatus::Completed | EvaluationStatus::Failed
        )
    }
}

/// Lifecycle state of an evaluation.
///
/// Transitions are one-directional: `Pending → Processing → Completed`,
/// with `Processing → Failed` on unrecoverable error and an explicit
/// `Failed → Pending` retry. No other transitions are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    /// Created, message enqueued, worker not yet started
    Pending,

    /// Worker is executing the pipeline phases
    Processing,

    /// All phases finished; summaries and aggregate score written
    Completed,

    /// Unrecoverable pipeline error; `error_message` populated
    Failed,
}

impl EvaluationStatus {
    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(self, next: EvaluationStatus) -> bool {
        use EvaluationStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed) | (Failed, Pending)
        )
    }
}

/// Join row linking an evaluation to one of its documents.
///
/// Created atomically with the evaluation; immutable afterwards except for
/// synopsis population by the summarize phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLink {
    pub evaluation_id: Uuid,
    pub document_id: Uuid,

    /// Per-document synopsis written by the summarize phase
    pub summary: Option<String>,
}

impl DocumentLink {
    pub fn new(evaluation_id: Uuid, document_id: Uuid) -> Self {
        Self {
            evaluation_id,
            document_id,
            summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_evaluation_is_pending() {
        let eval = Evaluation::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(eval.status, EvaluationStatus::Pending);
        assert_eq!(eval.progress, 0);
        assert!(!eval.is_finished());
        assert!(eval.aggregate_score.is_none());
    }

    #[test]
    fn test_legal_transitions() {
        use EvaluationStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));
    }

    #[test]
    fn test_illegal_transitions() {
        use EvaluationStatus::*;
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Pending));
    }
}
