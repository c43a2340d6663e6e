//! Dispatcher and queue behavior: validation before persistence, the
//! async worker loop, and the failed-then-retried lifecycle.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{fixture, item, Script, ScriptedClient};
use tokio::sync::mpsc;
use uuid::Uuid;

use appraise::dispatch::run_queue;
use appraise::domain::rubric::PromptConfig;
use appraise::domain::EvaluationStatus;
use appraise::pipeline::{PipelineContext, Worker};
use appraise::providers::ProviderRouter;
use appraise::store::{EvaluationStore, ResultStore};
use appraise::{JobDispatcher, PipelineError};

/// Poll the store until the evaluation reaches a terminal state.
async fn await_terminal(fx: &common::Fixture, id: Uuid) -> EvaluationStatus {
    for _ in 0..200 {
        let evaluation = fx.store.get_evaluation(id).unwrap();
        if evaluation.is_finished() {
            return evaluation.status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("evaluation {} never reached a terminal state", id);
}

fn dispatcher_for(fx: &common::Fixture, queue: mpsc::Sender<appraise::JobMessage>) -> JobDispatcher {
    JobDispatcher::new(
        fx.store.clone(),
        fx.store.clone(),
        fx.store.clone(),
        fx.ctx.index.clone(),
        queue,
    )
}

#[tokio::test]
async fn test_create_runs_to_completion_through_the_queue() {
    let items = vec![item("AC-1", 1.0, 0), item("AC-2", 3.0, 1)];
    let scripts = HashMap::from([
        ("AC-1".to_string(), Script::Score(80)),
        ("AC-2".to_string(), Script::Score(60)),
    ]);
    let fx = fixture(items, scripts);

    let (tx, rx) = mpsc::channel(16);
    let dispatcher = dispatcher_for(&fx, tx);
    tokio::spawn(run_queue(rx, fx.worker.clone(), fx.tracker.clone()));

    let evaluation_id = dispatcher
        .create_evaluation(
            fx.workspace_id,
            vec![fx.document_id],
            fx.criteria_set_id,
            fx.doc_type_id,
        )
        .await
        .unwrap();

    // Creation returns before processing finishes.
    let status = await_terminal(&fx, evaluation_id).await;
    assert_eq!(status, EvaluationStatus::Completed);

    let evaluation = fx.store.get_evaluation(evaluation_id).unwrap();
    assert_eq!(evaluation.aggregate_score, Some(65.0));
}

#[tokio::test]
async fn test_create_rejects_unknown_document_without_persisting() {
    let items = vec![item("AC-1", 1.0, 0)];
    let scripts = HashMap::from([("AC-1".to_string(), Script::Score(80))]);
    let fx = fixture(items, scripts);

    let (tx, mut rx) = mpsc::channel(16);
    let dispatcher = dispatcher_for(&fx, tx);

    let err = dispatcher
        .create_evaluation(
            fx.workspace_id,
            vec![fx.document_id, Uuid::new_v4()],
            fx.criteria_set_id,
            fx.doc_type_id,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));

    // Nothing was persisted or enqueued.
    assert!(fx
        .store
        .list_evaluations(fx.workspace_id, &Default::default())
        .unwrap()
        .is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_create_rejects_inactive_criteria_set() {
    let items = vec![item("AC-1", 1.0, 0)];
    let scripts = HashMap::from([("AC-1".to_string(), Script::Score(80))]);
    let fx = fixture(items, scripts);

    let (tx, _rx) = mpsc::channel(16);
    let dispatcher = dispatcher_for(&fx, tx);

    let err = dispatcher
        .create_evaluation(
            fx.workspace_id,
            vec![fx.document_id],
            Uuid::new_v4(),
            fx.doc_type_id,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(_) | PipelineError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_failed_evaluation_can_be_retried_to_completion() {
    let items = vec![item("AC-1", 1.0, 0)];
    let fx = fixture(
        items,
        HashMap::from([("AC-1".to_string(), Script::Fail)]),
    );

    let (tx, mut rx) = mpsc::channel(16);
    let dispatcher = dispatcher_for(&fx, tx);

    let evaluation_id = dispatcher
        .create_evaluation(
            fx.workspace_id,
            vec![fx.document_id],
            fx.criteria_set_id,
            fx.doc_type_id,
        )
        .await
        .unwrap();

    // First delivery, grading fails for every item.
    let message = rx.recv().await.unwrap();
    fx.worker.process(&message).await.unwrap();
    assert_eq!(
        fx.store.get_evaluation(evaluation_id).unwrap().status,
        EvaluationStatus::Failed
    );

    // Retry resets to pending and re-enqueues the same document set.
    dispatcher.retry_evaluation(evaluation_id).await.unwrap();
    let evaluation = fx.store.get_evaluation(evaluation_id).unwrap();
    assert_eq!(evaluation.status, EvaluationStatus::Pending);
    assert_eq!(evaluation.progress, 0);

    let retry_message = rx.recv().await.unwrap();
    assert_eq!(retry_message.evaluation_id, evaluation_id);
    assert_eq!(retry_message.document_ids, vec![fx.document_id]);

    // Second delivery through a worker whose provider now succeeds.
    let healthy_ctx = Arc::new(PipelineContext {
        evaluations: fx.store.clone(),
        results: fx.store.clone(),
        catalog: fx.store.clone(),
        index: fx.ctx.index.clone(),
        router: Arc::new(ProviderRouter::new(Arc::new(ScriptedClient::new(
            HashMap::from([("AC-1".to_string(), Script::Score(75))]),
        )))),
        provider: fx.ctx.provider.clone(),
        model: fx.ctx.model.clone(),
        retry: common::fast_retry(),
    });
    let healthy_worker = Worker::new(
        healthy_ctx,
        fx.tracker.clone(),
        appraise::domain::rubric::system_default_rubric(),
        PromptConfig::default(),
    );
    healthy_worker.process(&retry_message).await.unwrap();

    let evaluation = fx.store.get_evaluation(evaluation_id).unwrap();
    assert_eq!(evaluation.status, EvaluationStatus::Completed);
    assert_eq!(evaluation.aggregate_score, Some(75.0));

    // The failed run's null-score row was replaced, not handed back by the
    // idempotent insert.
    let results = fx.store.results_for_evaluation(evaluation_id).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].score, Some(75));
}

#[tokio::test]
async fn test_retry_rejected_unless_failed() {
    let items = vec![item("AC-1", 1.0, 0)];
    let scripts = HashMap::from([("AC-1".to_string(), Script::Score(80))]);
    let fx = fixture(items, scripts);

    let (tx, _rx) = mpsc::channel(16);
    let dispatcher = dispatcher_for(&fx, tx);

    let evaluation_id = dispatcher
        .create_evaluation(
            fx.workspace_id,
            vec![fx.document_id],
            fx.criteria_set_id,
            fx.doc_type_id,
        )
        .await
        .unwrap();

    // Still pending, so a retry request is invalid.
    let err = dispatcher.retry_evaluation(evaluation_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}
