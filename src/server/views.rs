//! Response views for the HTTP surface.
//!
//! Results are merged with their current edit at read time: the narrative
//! and status a client sees reflect the edit overlay, while score,
//! confidence, and citations are always the AI-authored values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::{CriteriaResult, DocumentLink, Evaluation, ResultEdit, ScoringRubric};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummaryView {
    pub id: Uuid,
    pub status: crate::domain::EvaluationStatus,
    pub progress: u8,
    pub aggregate_score: Option<f64>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_message: Option<String>,
}

impl From<&Evaluation> for EvaluationSummaryView {
    fn from(e: &Evaluation) -> Self {
        Self {
            id: e.id,
            status: e.status,
            progress: e.progress,
            aggregate_score: e.aggregate_score,
            started_at: e.started_at,
            completed_at: e.completed_at,
            error_message: e.error_message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub status: crate::domain::EvaluationStatus,
    pub progress: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub document_id: Uuid,
    pub summary: Option<String>,
}

impl From<&DocumentLink> for DocumentView {
    fn from(l: &DocumentLink) -> Self {
        Self {
            document_id: l.document_id,
            summary: l.summary.clone(),
        }
    }
}

/// A result merged with its current edit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub id: Uuid,
    pub criteria_item_id: Uuid,
    pub score: Option<u8>,
    pub confidence: Option<u8>,
    /// Current edit narrative if one exists, else the AI explanation
    pub narrative: String,
    /// Edit override if one exists, else derived from score via the rubric
    pub status: Option<String>,
    pub citations: Vec<String>,
    pub extra_fields: BTreeMap<String, serde_json::Value>,
    pub edited: bool,
}

impl ResultView {
    pub fn merge(
        result: &CriteriaResult,
        current_edit: Option<&ResultEdit>,
        rubric: &ScoringRubric,
    ) -> Self {
        let derived = result
            .score
            .and_then(|s| rubric.derive_status(s).ok())
            .map(str::to_string);

        let (narrative, status, edited) = match current_edit {
            Some(edit) => (
                edit.narrative
                    .clone()
                    .unwrap_or_else(|| result.explanation.clone()),
                edit.status_override.clone().or(derived),
                true,
            ),
            None => (result.explanation.clone(), derived, false),
        };

        Self {
            id: result.id,
            criteria_item_id: result.criteria_item_id,
            score: result.score,
            confidence: result.confidence,
            narrative,
            status,
            citations: result.citations.clone(),
            extra_fields: result.extra_fields.clone(),
            edited,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDetailView {
    #[serde(flatten)]
    pub summary: EvaluationSummaryView,
    pub document_summary: Option<String>,
    pub evaluation_summary: Option<String>,
    pub documents: Vec<DocumentView>,
    pub results: Vec<ResultView>,
    /// Resolved rubric for client-side status-chip rendering
    pub score_config: ScoringRubric,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditView {
    pub id: Uuid,
    pub narrative: Option<String>,
    pub status_override: Option<String>,
    pub is_current: bool,
    pub editor_id: Uuid,
    pub note: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&ResultEdit> for EditView {
    fn from(e: &ResultEdit) -> Self {
        Self {
            id: e.id,
            narrative: e.narrative.clone(),
            status_override: e.status_override.clone(),
            is_current: e.is_current,
            editor_id: e.editor_id,
            note: e.note.clone(),
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluationRequest {
    pub document_ids: Vec<Uuid>,
    pub criteria_set_id: Uuid,
    pub doc_type_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluationResponse {
    pub evaluation_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    #[serde(default)]
    pub narrative: Option<String>,
    #[serde(default)]
    pub status_override: Option<String>,
    pub note: String,
    #[serde(default)]
    pub editor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<crate::domain::EvaluationStatus>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}
