//! HTTP surface for the evaluation pipeline.
//!
//! Request/response handlers only: create and retry go through the
//! dispatcher, reads come straight from the stores, and edits append to
//! the result edit log. Authorization is a collaborator boundary; the
//! pipeline itself never consults it.

pub mod routes;
pub mod views;

use std::sync::Arc;

use uuid::Uuid;

use crate::config::ResolvedServiceConfig;
use crate::dispatch::JobDispatcher;
use crate::domain::ScoringRubric;
use crate::store::{CriteriaCatalog, EvaluationStore, ResultStore};

pub use routes::router;

/// Membership lookup on the external organization/workspace service.
pub trait WorkspaceDirectory: Send + Sync {
    fn is_member(&self, user_id: Uuid, workspace_id: Uuid) -> bool;
}

/// Directory that admits everyone; used until a real directory is wired.
pub struct OpenDirectory;

impl WorkspaceDirectory for OpenDirectory {
    fn is_member(&self, _user_id: Uuid, _workspace_id: Uuid) -> bool {
        true
    }
}

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub evaluations: Arc<dyn EvaluationStore>,
    pub results: Arc<dyn ResultStore>,
    pub catalog: Arc<dyn CriteriaCatalog>,
    pub dispatcher: Arc<JobDispatcher>,
    pub directory: Arc<dyn WorkspaceDirectory>,
    pub system_rubric: ScoringRubric,
}

impl AppState {
    /// Resolve the effective rubric for an evaluation, read-time only.
    ///
    /// Stored scores never change; rubric changes retroactively reclassify
    /// the derived statuses returned to clients.
    pub fn resolve_rubric_for(
        &self,
        workspace_id: Uuid,
        criteria_set_id: Uuid,
    ) -> crate::error::PipelineResult<ScoringRubric> {
        let set_override = self
            .catalog
            .get_criteria_set(criteria_set_id)
            .ok()
            .and_then(|s| s.rubric_override);
        let org = self.catalog.org_rubric(workspace_id);
        crate::domain::rubric::resolve_rubric(
            set_override.as_ref(),
            org.as_ref(),
            &self.system_rubric,
        )
    }
}

/// Convenience constructor wiring state from resolved configuration.
pub fn app_state(
    evaluations: Arc<dyn EvaluationStore>,
    results: Arc<dyn ResultStore>,
    catalog: Arc<dyn CriteriaCatalog>,
    dispatcher: Arc<JobDispatcher>,
    config: &ResolvedServiceConfig,
) -> AppState {
    AppState {
        evaluations,
        results,
        catalog,
        dispatcher,
        directory: Arc::new(OpenDirectory),
        system_rubric: config.system_rubric.clone(),
    }
}
