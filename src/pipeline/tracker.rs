//! Evaluation lifecycle state machine and progress writes.
//!
//! All writes go through `update_evaluation`, so the transition and
//! monotonicity checks run under the store's write lock. Progress writes
//! against a terminal evaluation are a guarded no-op; a decreasing write
//! while processing is rejected as a concurrency violation.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Evaluation, EvaluationStatus};
use crate::error::{PipelineError, PipelineResult};
use crate::store::EvaluationStore;

/// Owns status transitions and numeric progress for evaluations.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn EvaluationStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn EvaluationStore>) -> Self {
        Self { store }
    }

    fn transition(
        evaluation: &mut Evaluation,
        next: EvaluationStatus,
    ) -> PipelineResult<()> {
        if !evaluation.status.can_transition_to(next) {
            return Err(PipelineError::Concurrency(format!(
                "illegal transition {:?} -> {:?} for evaluation {}",
                evaluation.status, next, evaluation.id
            )));
        }
        evaluation.status = next;
        Ok(())
    }

    /// `Pending → Processing`, stamping the start time.
    pub fn begin(&self, id: Uuid) -> PipelineResult<Evaluation> {
        info!(%id, "Evaluation processing started");
        self.store.update_evaluation(id, &mut |e| {
            Self::transition(e, EvaluationStatus::Processing)?;
            e.started_at = Utc::now();
            Ok(())
        })
    }

    /// Advance progress. Monotonic: a lower value than the stored one is
    /// rejected; writes against a terminal evaluation are no-ops.
    pub fn set_progress(&self, id: Uuid, progress: u8) -> PipelineResult<()> {
        let progress = progress.min(100);
        self.store.update_evaluation(id, &mut |e| {
            if e.is_finished() {
                return Ok(());
            }
            if e.status != EvaluationStatus::Processing {
                return Err(PipelineError::Concurrency(format!(
                    "progress write while evaluation {} is {:?}",
                    e.id, e.status
                )));
            }
            if progress < e.progress {
                return Err(PipelineError::Concurrency(format!(
                    "progress for evaluation {} would decrease from {} to {}",
                    e.id, e.progress, progress
                )));
            }
            e.progress = progress;
            Ok(())
        })?;
        Ok(())
    }

    /// `Processing → Completed`, writing the synthesis outputs.
    pub fn complete(
        &self,
        id: Uuid,
        evaluation_summary: String,
        aggregate_score: Option<f64>,
    ) -> PipelineResult<Evaluation> {
        info!(%id, ?aggregate_score, "Evaluation completed");
        self.store.update_evaluation(id, &mut |e| {
            Self::transition(e, EvaluationStatus::Completed)?;
            e.progress = 100;
            e.evaluation_summary = Some(evaluation_summary.clone());
            e.aggregate_score = aggregate_score;
            e.completed_at = Some(Utc::now());
            e.error_message = None;
            Ok(())
        })
    }

    /// `Processing → Failed`, recording an actionable error message.
    pub fn fail(&self, id: Uuid, message: String) -> PipelineResult<Evaluation> {
        info!(%id, %message, "Evaluation failed");
        self.store.update_evaluation(id, &mut |e| {
            Self::transition(e, EvaluationStatus::Failed)?;
            e.completed_at = Some(Utc::now());
            e.error_message = Some(message.clone());
            Ok(())
        })
    }

    /// `Failed → Pending` retry reset: progress back to 0, error cleared.
    /// The only path on which progress may decrease.
    pub fn reset_for_retry(&self, id: Uuid) -> PipelineResult<Evaluation> {
        info!(%id, "Evaluation reset for retry");
        self.store.update_evaluation(id, &mut |e| {
            Self::transition(e, EvaluationStatus::Pending)?;
            e.progress = 0;
            e.error_message = None;
            e.completed_at = None;
            Ok(())
        })
    }
}
