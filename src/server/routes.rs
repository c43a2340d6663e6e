//! Route handlers for the evaluation CRUD surface.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::domain::ResultEdit;
use crate::error::PipelineError;
use crate::store::ListQuery;

use super::views::{
    CreateEvaluationRequest, CreateEvaluationResponse, EditRequest, EditView,
    EvaluationDetailView, EvaluationSummaryView, ListParams, ResultView, StatusView,
};
use super::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthcheck))
        .route(
            "/workspaces/:workspace_id/evaluations",
            post(create_evaluation).get(list_evaluations),
        )
        .route(
            "/workspaces/:workspace_id/evaluations/:id",
            get(get_evaluation).delete(delete_evaluation),
        )
        .route(
            "/workspaces/:workspace_id/evaluations/:id/status",
            get(get_status),
        )
        .route(
            "/workspaces/:workspace_id/evaluations/:id/retry",
            post(retry_evaluation),
        )
        .route(
            "/workspaces/:workspace_id/evaluations/:id/results/:result_id",
            patch(edit_result),
        )
        .route(
            "/workspaces/:workspace_id/evaluations/:id/results/:result_id/history",
            get(result_history),
        )
        .with_state(state)
}

fn error_response(error: PipelineError) -> Response {
    let status = match &error {
        PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::Concurrency(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

async fn healthcheck() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

async fn create_evaluation(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(request): Json<CreateEvaluationRequest>,
) -> Response {
    match state
        .dispatcher
        .create_evaluation(
            workspace_id,
            request.document_ids,
            request.criteria_set_id,
            request.doc_type_id,
        )
        .await
    {
        Ok(evaluation_id) => (
            StatusCode::ACCEPTED,
            Json(CreateEvaluationResponse { evaluation_id }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_evaluations(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Response {
    let query = ListQuery {
        status: params.status,
        offset: params.offset.unwrap_or(0),
        limit: params.limit,
    };

    match state.evaluations.list_evaluations(workspace_id, &query) {
        Ok(evaluations) => {
            let views: Vec<EvaluationSummaryView> =
                evaluations.iter().map(EvaluationSummaryView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Fetch an evaluation scoped to the workspace in the path.
fn scoped_evaluation(
    state: &AppState,
    workspace_id: Uuid,
    id: Uuid,
) -> Result<crate::domain::Evaluation, PipelineError> {
    let evaluation = state.evaluations.get_evaluation(id)?;
    if evaluation.workspace_id != workspace_id {
        return Err(PipelineError::NotFound(format!("evaluation {}", id)));
    }
    Ok(evaluation)
}

/// Fetch a result, rejecting ids that belong to a different evaluation.
/// Without this check any reachable evaluation would open every result row.
fn scoped_result(
    state: &AppState,
    evaluation_id: Uuid,
    result_id: Uuid,
) -> Result<crate::domain::CriteriaResult, PipelineError> {
    let result = state.results.get_result(result_id)?;
    if result.evaluation_id != evaluation_id {
        return Err(PipelineError::NotFound(format!("result {}", result_id)));
    }
    Ok(result)
}

async fn get_evaluation(
    State(state): State<AppState>,
    Path((workspace_id, id)): Path<(Uuid, Uuid)>,
) -> Response {
    let detail = (|| {
        let evaluation = scoped_evaluation(&state, workspace_id, id)?;
        let rubric = state.resolve_rubric_for(workspace_id, evaluation.criteria_set_id)?;
        let links = state.evaluations.document_links(id)?;
        let results = state.results.results_for_evaluation(id)?;

        let mut result_views = Vec::with_capacity(results.len());
        for result in &results {
            let current = state.results.current_edit(result.id)?;
            result_views.push(ResultView::merge(result, current.as_ref(), &rubric));
        }

        Ok::<_, PipelineError>(EvaluationDetailView {
            summary: EvaluationSummaryView::from(&evaluation),
            document_summary: evaluation.document_summary.clone(),
            evaluation_summary: evaluation.evaluation_summary.clone(),
            documents: links.iter().map(Into::into).collect(),
            results: result_views,
            score_config: rubric,
        })
    })();

    match detail {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Cheap polling endpoint: status and progress only.
async fn get_status(
    State(state): State<AppState>,
    Path((workspace_id, id)): Path<(Uuid, Uuid)>,
) -> Response {
    match scoped_evaluation(&state, workspace_id, id) {
        Ok(evaluation) => (
            StatusCode::OK,
            Json(StatusView {
                status: evaluation.status,
                progress: evaluation.progress,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn retry_evaluation(
    State(state): State<AppState>,
    Path((workspace_id, id)): Path<(Uuid, Uuid)>,
) -> Response {
    let outcome = match scoped_evaluation(&state, workspace_id, id) {
        Ok(_) => state.dispatcher.retry_evaluation(id).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "status": "pending" }))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn edit_result(
    State(state): State<AppState>,
    Path((workspace_id, id, result_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(request): Json<EditRequest>,
) -> Response {
    let outcome = (|| {
        scoped_evaluation(&state, workspace_id, id)?;
        scoped_result(&state, id, result_id)?;

        let editor_id = request.editor_id.unwrap_or_else(Uuid::nil);
        if !state.directory.is_member(editor_id, workspace_id) {
            return Err(PipelineError::Validation(
                "editor is not a member of this workspace".to_string(),
            ));
        }
        if request.narrative.is_none() && request.status_override.is_none() {
            return Err(PipelineError::Validation(
                "edit must change the narrative or the status".to_string(),
            ));
        }

        let edit = ResultEdit::new(
            result_id,
            request.narrative.clone(),
            request.status_override.clone(),
            editor_id,
            request.note.clone(),
        );
        state.results.append_edit(edit)
    })();

    match outcome {
        Ok(edit) => (StatusCode::OK, Json(EditView::from(&edit))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn result_history(
    State(state): State<AppState>,
    Path((workspace_id, id, result_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Response {
    let outcome = (|| {
        scoped_evaluation(&state, workspace_id, id)?;
        scoped_result(&state, id, result_id)?;
        state.results.edit_history(result_id)
    })();

    match outcome {
        Ok(edits) => {
            let views: Vec<EditView> = edits.iter().map(EditView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn delete_evaluation(
    State(state): State<AppState>,
    Path((workspace_id, id)): Path<(Uuid, Uuid)>,
) -> Response {
    let outcome = scoped_evaluation(&state, workspace_id, id)
        .and_then(|_| state.evaluations.soft_delete(id));

    match outcome {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
