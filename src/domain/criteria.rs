//! Criteria sets and document types.
//!
//! Criteria sets are administered outside this system and are read-only to
//! the pipeline. Items are evaluated in their stored ordering index so a
//! rerun visits them in the same order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rubric::ScoringRubric;

/// A versioned, named collection of requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaSet {
    pub id: Uuid,
    pub name: String,
    pub version: u32,

    /// Document type this set applies to
    pub doc_type_id: Uuid,

    /// Inactive sets are rejected by the dispatcher
    pub active: bool,

    /// Optional rubric override taking precedence over org and system rubrics
    pub rubric_override: Option<ScoringRubric>,

    /// Requirement rows, ordered by `order_index`
    pub items: Vec<CriteriaItem>,
}

impl CriteriaSet {
    /// Items in stored evaluation order.
    pub fn ordered_items(&self) -> Vec<&CriteriaItem> {
        let mut items: Vec<&CriteriaItem> = self.items.iter().collect();
        items.sort_by_key(|i| i.order_index);
        items
    }
}

/// One requirement row inside a criteria set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaItem {
    pub id: Uuid,

    /// Externally assigned requirement identifier (e.g. "REQ-4.2.1")
    pub external_id: String,

    /// The requirement text itself; used as the retrieval query
    pub requirement: String,

    /// Free-text elaboration shown to the model alongside the requirement
    pub description: String,

    pub category: String,

    /// Relative weight in the aggregate score
    pub weight: f64,

    /// Position within the set; evaluation order
    pub order_index: u32,
}

/// A document type criteria sets are associated with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentType {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
}
