//! Shared fixtures for integration tests: a scripted model client, seeded
//! stores, and a fully wired pipeline context.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use appraise::domain::provider::{AiModel, AiProvider, ProviderFamily, ValidationCategory};
use appraise::domain::rubric::PromptConfig;
use appraise::domain::{CriteriaItem, CriteriaSet, DocumentType, ScoringRubric};
use appraise::domain::{DocumentLink, Evaluation};
use appraise::pipeline::{PipelineContext, ProgressTracker, RetryPolicy, Worker};
use appraise::providers::{ModelClient, ModelRequest, ProviderRouter};
use appraise::retrieval::InMemoryIndex;
use appraise::store::EvaluationStore;
use appraise::{JobMessage, MemoryStore, PipelineError, PipelineResult};

/// Script key controlling the synthesis call rather than a requirement.
pub const SYNTHESIS_KEY: &str = "synthesis";

/// What the scripted client should do for one requirement.
#[derive(Clone)]
pub enum Script {
    Score(u8),
    Fail,
    Malformed,
}

/// Deterministic stand-in for a provider: grades by requirement id,
/// summarizes and synthesizes with fixed text.
pub struct ScriptedClient {
    scripts: HashMap<String, Script>,
}

impl ScriptedClient {
    pub fn new(scripts: HashMap<String, Script>) -> Self {
        Self { scripts }
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn invoke(
        &self,
        _provider: &AiProvider,
        request: &ModelRequest,
    ) -> PipelineResult<String> {
        let prompt = &request.user_prompt;

        if prompt.starts_with("Document content:") {
            return Ok("Synopsis: the document describes security controls.".to_string());
        }
        if prompt.starts_with("Combine the following") {
            return Ok("Combined synopsis of the document set.".to_string());
        }
        if prompt.contains("Per-requirement results:") {
            if matches!(self.scripts.get(SYNTHESIS_KEY), Some(Script::Fail)) {
                return Err(PipelineError::ProviderInvocation(
                    "scripted synthesis failure".to_string(),
                ));
            }
            return Ok("Overall assessment with findings and recommendations.".to_string());
        }

        // Grading prompt: "Requirement <external_id>: ..."
        let external_id = prompt
            .strip_prefix("Requirement ")
            .and_then(|rest| rest.split(':').next())
            .unwrap_or_default();

        match self.scripts.get(external_id) {
            Some(Script::Score(score)) => Ok(format!(
                "{{\"score\": {}, \"confidence\": 90, \"explanation\": \"assessment of {}\", \
                 \"citations\": [\"quoted passage\"], \"risk_level\": \"low\"}}",
                score, external_id
            )),
            Some(Script::Fail) => Err(PipelineError::ProviderInvocation(format!(
                "scripted failure for {}",
                external_id
            ))),
            Some(Script::Malformed) => Ok("no json here".to_string()),
            None => Err(PipelineError::Validation(format!(
                "no script for requirement '{}'",
                external_id
            ))),
        }
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub ctx: Arc<PipelineContext>,
    pub tracker: ProgressTracker,
    pub worker: Arc<Worker>,
    pub workspace_id: Uuid,
    pub document_id: Uuid,
    pub doc_type_id: Uuid,
    pub criteria_set_id: Uuid,
    pub item_ids: Vec<Uuid>,
}

pub fn provider() -> AiProvider {
    AiProvider {
        id: Uuid::new_v4(),
        name: "scripted".to_string(),
        family: ProviderFamily::Messages,
        endpoint: "http://localhost:0".to_string(),
        credential_env: "SCRIPTED_KEY".to_string(),
        region_prefix: None,
    }
}

pub fn model(provider_id: Uuid) -> AiModel {
    AiModel {
        id: Uuid::new_v4(),
        provider_id,
        identifier: "scripted-model".to_string(),
        context_window: 200_000,
        max_output_tokens: 4096,
        validation_category: ValidationCategory::Direct,
    }
}

/// Fast retry policy so exhausted-retry paths stay quick in tests.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        backoff_multiplier: 2.0,
        rate_limit_delay_ms: 1,
    }
}

pub fn item(external_id: &str, weight: f64, order_index: u32) -> CriteriaItem {
    CriteriaItem {
        id: Uuid::new_v4(),
        external_id: external_id.to_string(),
        requirement: format!("requirement text for {}", external_id),
        description: String::new(),
        category: "security".to_string(),
        weight,
        order_index,
    }
}

/// Persist a pending evaluation with one document link and build the
/// queue message a dispatcher would have produced for it.
pub fn seed_evaluation(fx: &Fixture) -> (Uuid, JobMessage) {
    let evaluation = Evaluation::new(fx.workspace_id, fx.doc_type_id, fx.criteria_set_id);
    let evaluation_id = evaluation.id;
    let links = vec![DocumentLink::new(evaluation_id, fx.document_id)];
    fx.store
        .insert_evaluation(evaluation, links)
        .expect("seed evaluation");

    let message = JobMessage {
        evaluation_id,
        workspace_id: fx.workspace_id,
        document_ids: vec![fx.document_id],
        criteria_set_id: fx.criteria_set_id,
        action: "evaluate".to_string(),
    };
    (evaluation_id, message)
}

/// Wire a complete pipeline around scripted grading behavior.
pub fn fixture(items: Vec<CriteriaItem>, scripts: HashMap<String, Script>) -> Fixture {
    fixture_with_rubric(items, scripts, None)
}

pub fn fixture_with_rubric(
    items: Vec<CriteriaItem>,
    scripts: HashMap<String, Script>,
    set_rubric: Option<ScoringRubric>,
) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let workspace_id = Uuid::new_v4();
    let doc_type_id = Uuid::new_v4();
    let criteria_set_id = Uuid::new_v4();
    let document_id = Uuid::new_v4();
    let item_ids = items.iter().map(|i| i.id).collect();

    store.seed_document_type(DocumentType {
        id: doc_type_id,
        name: "policy".to_string(),
        active: true,
    });
    store.seed_criteria_set(CriteriaSet {
        id: criteria_set_id,
        name: "controls".to_string(),
        version: 1,
        doc_type_id,
        active: true,
        rubric_override: set_rubric,
        items,
    });

    let mut index = InMemoryIndex::new();
    index.insert(
        document_id,
        "Access is gated by MFA.\n\nData at rest is encrypted with AES-256.\n\n\
         Keys rotate quarterly under a documented policy.",
    );

    let provider = provider();
    let model = model(provider.id);
    let router = Arc::new(ProviderRouter::new(Arc::new(ScriptedClient::new(scripts))));

    let ctx = Arc::new(PipelineContext {
        evaluations: store.clone(),
        results: store.clone(),
        catalog: store.clone(),
        index: Arc::new(index),
        router,
        provider,
        model,
        retry: fast_retry(),
    });

    let tracker = ProgressTracker::new(store.clone());
    let worker = Arc::new(Worker::new(
        ctx.clone(),
        tracker.clone(),
        appraise::domain::rubric::system_default_rubric(),
        PromptConfig::default(),
    ));

    Fixture {
        store,
        ctx,
        tracker,
        worker,
        workspace_id,
        document_id,
        doc_type_id,
        criteria_set_id,
        item_ids,
    }
}
