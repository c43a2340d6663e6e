//! In-memory store implementation.
//!
//! A single `RwLock` over the row collections gives every write path the
//! transactional pairing it needs; in particular the edit append flips the
//! previous current flag and inserts the new row under one write guard.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::domain::{
    CriteriaResult, CriteriaSet, DocumentLink, DocumentType, Evaluation, ResultEdit, ScoringRubric,
};
use crate::error::{PipelineError, PipelineResult};

use super::{CriteriaCatalog, EvaluationStore, ListQuery, ResultStore};

#[derive(Default)]
struct Rows {
    evaluations: HashMap<Uuid, Evaluation>,
    links: Vec<DocumentLink>,
    results: HashMap<Uuid, CriteriaResult>,
    edits: Vec<ResultEdit>,
    criteria_sets: HashMap<Uuid, CriteriaSet>,
    document_types: HashMap<Uuid, DocumentType>,
    org_rubrics: HashMap<Uuid, ScoringRubric>,
}

/// Locked in-memory store backing all repository traits.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an administered criteria set (admin CRUD is out of scope).
    pub fn seed_criteria_set(&self, set: CriteriaSet) {
        self.write().criteria_sets.insert(set.id, set);
    }

    /// Seed an administered document type.
    pub fn seed_document_type(&self, doc_type: DocumentType) {
        self.write().document_types.insert(doc_type.id, doc_type);
    }

    /// Seed an organization-level rubric override for a workspace.
    pub fn seed_org_rubric(&self, workspace_id: Uuid, rubric: ScoringRubric) {
        self.write().org_rubrics.insert(workspace_id, rubric);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Rows> {
        // Writers never panic while holding the lock; recover regardless.
        self.rows.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Rows> {
        self.rows.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl EvaluationStore for MemoryStore {
    fn insert_evaluation(
        &self,
        evaluation: Evaluation,
        links: Vec<DocumentLink>,
    ) -> PipelineResult<()> {
        let mut rows = self.write();
        if rows.evaluations.contains_key(&evaluation.id) {
            return Err(PipelineError::Concurrency(format!(
                "evaluation {} already exists",
                evaluation.id
            )));
        }
        rows.evaluations.insert(evaluation.id, evaluation);
        rows.links.extend(links);
        Ok(())
    }

    fn get_evaluation(&self, id: Uuid) -> PipelineResult<Evaluation> {
        self.read()
            .evaluations
            .get(&id)
            .filter(|e| !e.deleted)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("evaluation {}", id)))
    }

    fn list_evaluations(
        &self,
        workspace_id: Uuid,
        query: &ListQuery,
    ) -> PipelineResult<Vec<Evaluation>> {
        let rows = self.read();
        let mut evaluations: Vec<Evaluation> = rows
            .evaluations
            .values()
            .filter(|e| e.workspace_id == workspace_id && !e.deleted)
            .filter(|e| query.status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();

        evaluations.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let paged = evaluations
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(paged)
    }

    fn update_evaluation(
        &self,
        id: Uuid,
        apply: &mut dyn FnMut(&mut Evaluation) -> PipelineResult<()>,
    ) -> PipelineResult<Evaluation> {
        let mut rows = self.write();
        let evaluation = rows
            .evaluations
            .get_mut(&id)
            .ok_or_else(|| PipelineError::NotFound(format!("evaluation {}", id)))?;

        // Apply against a copy so a rejected update writes nothing.
        let mut updated = evaluation.clone();
        apply(&mut updated)?;
        *evaluation = updated.clone();
        Ok(updated)
    }

    fn document_links(&self, evaluation_id: Uuid) -> PipelineResult<Vec<DocumentLink>> {
        Ok(self
            .read()
            .links
            .iter()
            .filter(|l| l.evaluation_id == evaluation_id)
            .cloned()
            .collect())
    }

    fn set_link_summary(
        &self,
        evaluation_id: Uuid,
        document_id: Uuid,
        summary: String,
    ) -> PipelineResult<()> {
        let mut rows = self.write();
        let link = rows
            .links
            .iter_mut()
            .find(|l| l.evaluation_id == evaluation_id && l.document_id == document_id)
            .ok_or_else(|| {
                PipelineError::NotFound(format!(
                    "document link {}/{}",
                    evaluation_id, document_id
                ))
            })?;
        link.summary = Some(summary);
        Ok(())
    }

    fn soft_delete(&self, id: Uuid) -> PipelineResult<()> {
        let mut rows = self.write();
        let evaluation = rows
            .evaluations
            .get_mut(&id)
            .ok_or_else(|| PipelineError::NotFound(format!("evaluation {}", id)))?;
        evaluation.deleted = true;
        Ok(())
    }
}

impl ResultStore for MemoryStore {
    fn insert_result(&self, result: CriteriaResult) -> PipelineResult<CriteriaResult> {
        let mut rows = self.write();

        // Idempotent by key so a re-delivered message never double-writes.
        if let Some(existing) = rows
            .results
            .values()
            .find(|r| r.idempotency_key == result.idempotency_key)
        {
            return Ok(existing.clone());
        }

        rows.results.insert(result.id, result.clone());
        Ok(result)
    }

    fn get_result(&self, id: Uuid) -> PipelineResult<CriteriaResult> {
        self.read()
            .results
            .get(&id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("result {}", id)))
    }

    fn results_for_evaluation(&self, evaluation_id: Uuid) -> PipelineResult<Vec<CriteriaResult>> {
        let mut results: Vec<CriteriaResult> = self
            .read()
            .results
            .values()
            .filter(|r| r.evaluation_id == evaluation_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(results)
    }

    fn delete_results_for_evaluation(&self, evaluation_id: Uuid) -> PipelineResult<()> {
        let mut rows = self.write();
        let removed: Vec<Uuid> = rows
            .results
            .values()
            .filter(|r| r.evaluation_id == evaluation_id)
            .map(|r| r.id)
            .collect();
        for id in &removed {
            rows.results.remove(id);
        }
        rows.edits.retain(|e| !removed.contains(&e.result_id));
        Ok(())
    }

    fn append_edit(&self, edit: ResultEdit) -> PipelineResult<ResultEdit> {
        let mut rows = self.write();
        if !rows.results.contains_key(&edit.result_id) {
            return Err(PipelineError::NotFound(format!(
                "result {}",
                edit.result_id
            )));
        }

        // Flip-then-insert under the same write guard: exactly one current
        // edit per result at any time.
        for prior in rows
            .edits
            .iter_mut()
            .filter(|e| e.result_id == edit.result_id)
        {
            prior.is_current = false;
        }
        rows.edits.push(edit.clone());
        Ok(edit)
    }

    fn edit_history(&self, result_id: Uuid) -> PipelineResult<Vec<ResultEdit>> {
        let mut edits: Vec<ResultEdit> = self
            .read()
            .edits
            .iter()
            .filter(|e| e.result_id == result_id)
            .cloned()
            .collect();
        edits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(edits)
    }

    fn current_edit(&self, result_id: Uuid) -> PipelineResult<Option<ResultEdit>> {
        Ok(self
            .read()
            .edits
            .iter()
            .find(|e| e.result_id == result_id && e.is_current)
            .cloned())
    }
}

impl CriteriaCatalog for MemoryStore {
    fn get_criteria_set(&self, id: Uuid) -> PipelineResult<CriteriaSet> {
        self.read()
            .criteria_sets
            .get(&id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("criteria set {}", id)))
    }

    fn get_document_type(&self, id: Uuid) -> PipelineResult<DocumentType> {
        self.read()
            .document_types
            .get(&id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("document type {}", id)))
    }

    fn org_rubric(&self, workspace_id: Uuid) -> Option<ScoringRubric> {
        self.read().org_rubrics.get(&workspace_id).cloned()
    }
}
