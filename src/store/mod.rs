//! Persistence boundary for evaluations, results, and edits.
//!
//! Storage is abstracted behind traits so the pipeline and server can be
//! exercised in isolation; the crate ships a locked in-memory
//! implementation whose write paths provide the row-transactional pairing
//! the edit log requires.

pub mod memory;

use uuid::Uuid;

use crate::domain::{
    CriteriaResult, CriteriaSet, DocumentLink, DocumentType, Evaluation, EvaluationStatus,
    ResultEdit, ScoringRubric,
};
use crate::error::PipelineResult;

pub use memory::MemoryStore;

/// Filter and pagination for evaluation listings.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub status: Option<EvaluationStatus>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Evaluation header and document-link storage.
pub trait EvaluationStore: Send + Sync {
    /// Insert the evaluation header and its document links atomically.
    fn insert_evaluation(
        &self,
        evaluation: Evaluation,
        links: Vec<DocumentLink>,
    ) -> PipelineResult<()>;

    fn get_evaluation(&self, id: Uuid) -> PipelineResult<Evaluation>;

    /// List a workspace's evaluations, newest first, soft-deleted excluded.
    fn list_evaluations(&self, workspace_id: Uuid, query: &ListQuery) -> PipelineResult<Vec<Evaluation>>;

    /// Read-modify-write a single evaluation row under the store's write
    /// lock. The callback may reject the update by returning an error, in
    /// which case nothing is written.
    fn update_evaluation(
        &self,
        id: Uuid,
        apply: &mut dyn FnMut(&mut Evaluation) -> PipelineResult<()>,
    ) -> PipelineResult<Evaluation>;

    fn document_links(&self, evaluation_id: Uuid) -> PipelineResult<Vec<DocumentLink>>;

    fn set_link_summary(
        &self,
        evaluation_id: Uuid,
        document_id: Uuid,
        summary: String,
    ) -> PipelineResult<()>;

    fn soft_delete(&self, id: Uuid) -> PipelineResult<()>;
}

/// Immutable AI results plus the append-only edit overlay.
pub trait ResultStore: Send + Sync {
    /// Insert a result. Idempotent: re-inserting the same idempotency key
    /// returns the existing row untouched.
    fn insert_result(&self, result: CriteriaResult) -> PipelineResult<CriteriaResult>;

    fn get_result(&self, id: Uuid) -> PipelineResult<CriteriaResult>;

    fn results_for_evaluation(&self, evaluation_id: Uuid) -> PipelineResult<Vec<CriteriaResult>>;

    /// Remove every result row for an evaluation, along with the edits that
    /// reference them. A retried run regrades from scratch; without this the
    /// idempotent insert would hand back the previous run's rows.
    fn delete_results_for_evaluation(&self, evaluation_id: Uuid) -> PipelineResult<()>;

    /// Append an edit, flipping the prior current edit's flag in the same
    /// write transaction.
    fn append_edit(&self, edit: ResultEdit) -> PipelineResult<ResultEdit>;

    /// All edits for a result, newest first.
    fn edit_history(&self, result_id: Uuid) -> PipelineResult<Vec<ResultEdit>>;

    /// The single current edit, if the result has been edited.
    fn current_edit(&self, result_id: Uuid) -> PipelineResult<Option<ResultEdit>>;
}

/// Read-only view onto administered criteria and rubric configuration.
pub trait CriteriaCatalog: Send + Sync {
    fn get_criteria_set(&self, id: Uuid) -> PipelineResult<CriteriaSet>;

    fn get_document_type(&self, id: Uuid) -> PipelineResult<DocumentType>;

    /// Organization-level rubric override for a workspace, if configured.
    fn org_rubric(&self, workspace_id: Uuid) -> Option<ScoringRubric>;
}
