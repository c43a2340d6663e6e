//! Job dispatcher and the asynchronous work queue.
//!
//! Creation validates inputs, persists the evaluation header and document
//! links, and enqueues exactly one message; the caller gets the id back
//! immediately and polls progress separately. The queue delivers one
//! message per worker invocation so no two workers ever process the same
//! evaluation concurrently.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::{DocumentLink, Evaluation, EvaluationStatus};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{ProgressTracker, Worker};
use crate::retrieval::DocumentIndex;
use crate::store::{CriteriaCatalog, EvaluationStore, ResultStore};

/// Delivery attempts before a message goes to the dead-letter path.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// One unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    #[serde(rename = "evaluationId")]
    pub evaluation_id: Uuid,
    #[serde(rename = "workspaceId")]
    pub workspace_id: Uuid,
    #[serde(rename = "documentIds")]
    pub document_ids: Vec<Uuid>,
    #[serde(rename = "criteriaSetId")]
    pub criteria_set_id: Uuid,
    pub action: String,
}

/// Accepts evaluation requests and feeds the queue.
pub struct JobDispatcher {
    evaluations: Arc<dyn EvaluationStore>,
    results: Arc<dyn ResultStore>,
    catalog: Arc<dyn CriteriaCatalog>,
    index: Arc<dyn DocumentIndex>,
    tracker: ProgressTracker,
    queue: mpsc::Sender<JobMessage>,
}

impl JobDispatcher {
    pub fn new(
        evaluations: Arc<dyn EvaluationStore>,
        results: Arc<dyn ResultStore>,
        catalog: Arc<dyn CriteriaCatalog>,
        index: Arc<dyn DocumentIndex>,
        queue: mpsc::Sender<JobMessage>,
    ) -> Self {
        let tracker = ProgressTracker::new(evaluations.clone());
        Self {
            evaluations,
            results,
            catalog,
            index,
            tracker,
            queue,
        }
    }

    /// Validate, persist, enqueue. Returns the new evaluation id without
    /// blocking on processing. Validation failure persists nothing and
    /// enqueues nothing.
    #[instrument(skip(self), fields(%workspace_id))]
    pub async fn create_evaluation(
        &self,
        workspace_id: Uuid,
        document_ids: Vec<Uuid>,
        criteria_set_id: Uuid,
        doc_type_id: Uuid,
    ) -> PipelineResult<Uuid> {
        self.validate(workspace_id, &document_ids, criteria_set_id, doc_type_id)
            .await?;

        let evaluation = Evaluation::new(workspace_id, doc_type_id, criteria_set_id);
        let evaluation_id = evaluation.id;
        let links = document_ids
            .iter()
            .map(|d| DocumentLink::new(evaluation_id, *d))
            .collect();

        self.evaluations.insert_evaluation(evaluation, links)?;

        self.enqueue(JobMessage {
            evaluation_id,
            workspace_id,
            document_ids,
            criteria_set_id,
            action: "evaluate".to_string(),
        })
        .await?;

        info!(%evaluation_id, "Evaluation created and enqueued");
        Ok(evaluation_id)
    }

    /// Re-enqueue a failed evaluation, resetting it to pending. Disallowed
    /// for any other status.
    #[instrument(skip(self), fields(%evaluation_id))]
    pub async fn retry_evaluation(&self, evaluation_id: Uuid) -> PipelineResult<()> {
        let evaluation = self.evaluations.get_evaluation(evaluation_id)?;
        if evaluation.status != EvaluationStatus::Failed {
            return Err(PipelineError::Validation(format!(
                "evaluation {} is {:?}; only failed evaluations can be retried",
                evaluation_id, evaluation.status
            )));
        }

        // The rerun regrades every item; the previous rows (and their edits)
        // go first, or the idempotent insert would hand them straight back.
        self.results.delete_results_for_evaluation(evaluation_id)?;
        self.tracker.reset_for_retry(evaluation_id)?;

        let links = self.evaluations.document_links(evaluation_id)?;
        self.enqueue(JobMessage {
            evaluation_id,
            workspace_id: evaluation.workspace_id,
            document_ids: links.iter().map(|l| l.document_id).collect(),
            criteria_set_id: evaluation.criteria_set_id,
            action: "evaluate".to_string(),
        })
        .await?;

        info!(%evaluation_id, "Evaluation re-enqueued after retry");
        Ok(())
    }

    async fn validate(
        &self,
        _workspace_id: Uuid,
        document_ids: &[Uuid],
        criteria_set_id: Uuid,
        doc_type_id: Uuid,
    ) -> PipelineResult<()> {
        if document_ids.is_empty() {
            return Err(PipelineError::Validation(
                "at least one document is required".to_string(),
            ));
        }

        let doc_type = self
            .catalog
            .get_document_type(doc_type_id)
            .map_err(|_| PipelineError::Validation(format!("unknown document type {}", doc_type_id)))?;
        if !doc_type.active {
            return Err(PipelineError::Validation(format!(
                "document type '{}' is inactive",
                doc_type.name
            )));
        }

        let set = self
            .catalog
            .get_criteria_set(criteria_set_id)
            .map_err(|_| {
                PipelineError::Validation(format!("unknown criteria set {}", criteria_set_id))
            })?;
        if !set.active {
            return Err(PipelineError::Validation(format!(
                "criteria set '{}' is inactive",
                set.name
            )));
        }

        for document_id in document_ids {
            if !self.index.contains(*document_id).await {
                return Err(PipelineError::Validation(format!(
                    "document {} is not in the workspace index",
                    document_id
                )));
            }
        }

        Ok(())
    }

    async fn enqueue(&self, message: JobMessage) -> PipelineResult<()> {
        self.queue.send(message).await.map_err(|_| {
            PipelineError::Concurrency("work queue is closed".to_string())
        })
    }
}

/// Consume messages one at a time until the queue closes.
///
/// Each message gets a bounded number of delivery attempts; a message that
/// exhausts them takes the dead-letter path, which records the evaluation
/// as failed with a diagnostic instead of silently dropping the work.
pub async fn run_queue(
    mut receiver: mpsc::Receiver<JobMessage>,
    worker: Arc<Worker>,
    tracker: ProgressTracker,
) {
    while let Some(message) = receiver.recv().await {
        deliver(&message, &worker, &tracker).await;
    }
    info!("Work queue closed; worker loop exiting");
}

async fn deliver(message: &JobMessage, worker: &Worker, tracker: &ProgressTracker) {
    for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
        match worker.process(message).await {
            Ok(()) => return,
            Err(e) => {
                error!(
                    evaluation_id = %message.evaluation_id,
                    attempt,
                    error = %e,
                    "Worker could not record an outcome for this delivery"
                );
            }
        }
    }

    // Dead-letter path: best effort, the evaluation must not stay stuck.
    if let Err(e) = tracker.fail(
        message.evaluation_id,
        format!(
            "processing abandoned after {} delivery attempts",
            MAX_DELIVERY_ATTEMPTS
        ),
    ) {
        error!(
            evaluation_id = %message.evaluation_id,
            error = %e,
            "Dead-letter write failed; evaluation state may be stale"
        );
    }
}
