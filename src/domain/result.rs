//! AI results and the human edit overlay.
//!
//! A `CriteriaResult` is written once by the evaluator and never mutated.
//! Human corrections are `ResultEdit` rows layered on top; the read path
//! picks the single current edit, if any, over the AI-authored fields.
//! Score, confidence, and citations have no override mechanism.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable AI result for one (evaluation, criteria item) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaResult {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub criteria_item_id: Uuid,

    /// AI-authored score, 0-100. None when the item failed.
    pub score: Option<u8>,

    /// Model self-reported confidence, 0-100
    pub confidence: Option<u8>,

    /// Narrative explanation, or an error summary for failed items
    pub explanation: String,

    /// Quoted passages grounding the assessment, in model-emitted order
    pub citations: Vec<String>,

    /// Additional top-level keys the model emitted beyond the fixed fields,
    /// preserved verbatim in key order (e.g. "risk_level")
    pub extra_fields: BTreeMap<String, serde_json::Value>,

    /// Idempotency key for the result write: {evaluation}:{item}:{input hash}
    pub idempotency_key: String,

    pub created_at: DateTime<Utc>,
}

impl CriteriaResult {
    /// Whether the item produced a usable score.
    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }
}

/// One append-only human correction to a result's narrative and/or status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEdit {
    pub id: Uuid,
    pub result_id: Uuid,

    /// Replacement narrative, if the editor changed it
    pub narrative: Option<String>,

    /// Replacement status label, if the editor overrode the derived one
    pub status_override: Option<String>,

    /// Exactly one edit per result carries `true` at any time
    pub is_current: bool,

    pub editor_id: Uuid,

    /// Free-text reason for the edit
    pub note: String,

    pub created_at: DateTime<Utc>,
}

impl ResultEdit {
    pub fn new(
        result_id: Uuid,
        narrative: Option<String>,
        status_override: Option<String>,
        editor_id: Uuid,
        note: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            result_id,
            narrative,
            status_override,
            is_current: true,
            editor_id,
            note,
            created_at: Utc::now(),
        }
    }
}
