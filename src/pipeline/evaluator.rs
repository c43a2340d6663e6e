//! Phase 2: per-criteria evaluation.
//!
//! For each criteria item, in stored order: retrieve grounding passages,
//! build the grading prompt, invoke the router, parse the structured
//! response, and persist one immutable result. A single failed item is
//! recorded and the loop continues; only all items failing fails the phase.
//! Occupies the [10,90] progress band.

use std::collections::BTreeMap;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::domain::rubric::ResolvedEvalConfig;
use crate::domain::{CriteriaItem, CriteriaResult};
use crate::error::{PipelineError, PipelineResult};
use crate::retrieval::Passage;

use super::retry::with_retry;
use super::{PipelineContext, ProgressTracker};

const EVALUATE_TEMPERATURE: f32 = 0.2;

/// Evaluate all items of the criteria set against the linked documents.
#[instrument(skip(ctx, tracker, items, config), fields(%evaluation_id, items = items.len()))]
pub async fn run(
    ctx: &PipelineContext,
    tracker: &ProgressTracker,
    evaluation_id: Uuid,
    document_ids: &[Uuid],
    items: &[&CriteriaItem],
    config: &ResolvedEvalConfig,
) -> PipelineResult<Vec<CriteriaResult>> {
    let total = items.len();
    if total == 0 {
        return Err(PipelineError::Validation(
            "criteria set has no items".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(total);
    let mut failures = 0usize;

    for (done, item) in items.iter().enumerate() {
        let result = match evaluate_item(ctx, evaluation_id, document_ids, item, config).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    item = %item.external_id,
                    error = %e,
                    "Criteria item failed; continuing with remaining items"
                );
                failures += 1;
                failed_result(evaluation_id, item, &e)
            }
        };

        let stored = ctx.results.insert_result(result)?;
        results.push(stored);

        // Band [10,90] divided proportionally across the items.
        let progress = 10 + ((80.0 * (done + 1) as f64 / total as f64).round() as u8);
        tracker.set_progress(evaluation_id, progress)?;
    }

    if failures == total {
        return Err(PipelineError::ProviderInvocation(format!(
            "all {} criteria items failed",
            total
        )));
    }

    Ok(results)
}

/// Grade one item: retrieve, prompt, invoke, parse.
async fn evaluate_item(
    ctx: &PipelineContext,
    evaluation_id: Uuid,
    document_ids: &[Uuid],
    item: &CriteriaItem,
    config: &ResolvedEvalConfig,
) -> PipelineResult<CriteriaResult> {
    // Retrieval failures are not retried; they fail this item only.
    let passages = ctx.index.search(&item.requirement, document_ids).await?;

    let user_prompt = build_prompt(item, &passages, config);

    let response = with_retry(&ctx.retry, "evaluate_item", || {
        ctx.router.invoke(
            &ctx.provider,
            &ctx.model,
            &config.prompts.evaluate_system,
            &user_prompt,
            EVALUATE_TEMPERATURE,
            ctx.model.max_output_tokens,
        )
    })
    .await?;

    let parsed = parse_response(&response)?;

    Ok(CriteriaResult {
        id: Uuid::new_v4(),
        evaluation_id,
        criteria_item_id: item.id,
        score: Some(parsed.score),
        confidence: parsed.confidence,
        explanation: parsed.explanation,
        citations: parsed.citations,
        extra_fields: parsed.extra_fields,
        idempotency_key: result_idempotency_key(evaluation_id, item),
        created_at: Utc::now(),
    })
}

/// Record a failed item: null score, error summary as the narrative.
fn failed_result(evaluation_id: Uuid, item: &CriteriaItem, error: &PipelineError) -> CriteriaResult {
    CriteriaResult {
        id: Uuid::new_v4(),
        evaluation_id,
        criteria_item_id: item.id,
        score: None,
        confidence: None,
        explanation: format!("Evaluation failed: {}", error),
        citations: Vec::new(),
        extra_fields: BTreeMap::new(),
        idempotency_key: result_idempotency_key(evaluation_id, item),
        created_at: Utc::now(),
    }
}

/// Grading prompt: requirement, context passages, and the rubric rendered
/// as scoring guidance. The model outputs a raw numeric score, never a
/// status label; labels are always derived at read time.
fn build_prompt(item: &CriteriaItem, passages: &[Passage], config: &ResolvedEvalConfig) -> String {
    let context = if passages.is_empty() {
        "(no relevant passages found)".to_string()
    } else {
        passages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{}] {}", i + 1, p.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "Requirement {id}: {req}\n\n\
         Description: {desc}\n\n\
         Relevant document excerpts:\n{context}\n\n\
         Scoring guidance:\n{guidance}",
        id = item.external_id,
        req = item.requirement,
        desc = if item.description.is_empty() {
            "(none)"
        } else {
            &item.description
        },
        context = context,
        guidance = config.rubric.as_scoring_guidance(),
    )
}

/// Fixed fields parsed from the structured model response.
#[derive(Debug)]
struct ParsedResponse {
    score: u8,
    confidence: Option<u8>,
    explanation: String,
    citations: Vec<String>,
    extra_fields: BTreeMap<String, serde_json::Value>,
}

/// Parse the structured JSON response.
///
/// `score` is required and must be an integer in [0,100]; anything else is
/// a `ValidationError` for this item. Unknown top-level keys are captured
/// verbatim so the model can emit domain-specific extensions.
fn parse_response(response: &str) -> PipelineResult<ParsedResponse> {
    let json = extract_json_object(response).ok_or_else(|| {
        PipelineError::Validation("response contains no JSON object".to_string())
    })?;

    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| PipelineError::Validation(format!("malformed JSON response: {}", e)))?;

    let map = value
        .as_object()
        .ok_or_else(|| PipelineError::Validation("response is not a JSON object".to_string()))?;

    let score = map
        .get("score")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| PipelineError::Validation("missing integer 'score' field".to_string()))?;
    if !(0..=100).contains(&score) {
        return Err(PipelineError::Validation(format!(
            "score {} is outside 0-100",
            score
        )));
    }

    // Confidence is advisory; out-of-range values are clamped, not fatal.
    let confidence = map
        .get("confidence")
        .and_then(|v| v.as_i64())
        .map(|c| c.clamp(0, 100) as u8);

    let explanation = map
        .get("explanation")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let citations = map
        .get("citations")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|c| c.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let extra_fields = map
        .iter()
        .filter(|(k, _)| {
            !matches!(k.as_str(), "score" | "confidence" | "explanation" | "citations")
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(ParsedResponse {
        score: score as u8,
        confidence,
        explanation,
        citations,
        extra_fields,
    })
}

/// Locate the JSON object inside a response that may carry code fencing or
/// prose around it.
fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Key making the per-item result write idempotent across redeliveries:
/// {evaluation}:{item}:{requirement hash}.
fn result_idempotency_key(evaluation_id: Uuid, item: &CriteriaItem) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item.requirement.as_bytes());
    let digest = hasher.finalize();
    let hash: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}:{}:{}", evaluation_id, item.id, hash)
}
