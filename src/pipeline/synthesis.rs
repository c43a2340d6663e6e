//! Phase 3: evaluation summary generation.
//!
//! Synthesizes all per-criteria results and document summaries into an
//! overall narrative, computes the weighted aggregate score, and completes
//! the evaluation.

use std::collections::HashMap;

use tracing::instrument;
use uuid::Uuid;

use crate::domain::rubric::ResolvedEvalConfig;
use crate::domain::{CriteriaItem, CriteriaResult, Evaluation};
use crate::error::PipelineResult;

use super::retry::with_retry;
use super::{PipelineContext, ProgressTracker};

const SYNTHESIZE_TEMPERATURE: f32 = 0.3;

/// Generate the overall assessment and complete the evaluation.
#[instrument(skip_all, fields(%evaluation_id))]
pub async fn run(
    ctx: &PipelineContext,
    tracker: &ProgressTracker,
    evaluation_id: Uuid,
    document_summaries: &[String],
    items: &[&CriteriaItem],
    results: &[CriteriaResult],
    config: &ResolvedEvalConfig,
) -> PipelineResult<Evaluation> {
    let aggregate = aggregate_score(items, results);

    let user_prompt = build_prompt(ctx, document_summaries, items, results, config)?;

    let summary = with_retry(&ctx.retry, "synthesize_summary", || {
        ctx.router.invoke(
            &ctx.provider,
            &ctx.model,
            &config.prompts.synthesize_system,
            &user_prompt,
            SYNTHESIZE_TEMPERATURE,
            ctx.model.max_output_tokens,
        )
    })
    .await?;

    tracker.complete(evaluation_id, summary, aggregate)
}

/// Weighted mean of all successfully scored items.
///
/// Items with a null score are excluded from both numerator and
/// denominator. Returns None when nothing scored.
pub fn aggregate_score(items: &[&CriteriaItem], results: &[CriteriaResult]) -> Option<f64> {
    let weights: HashMap<Uuid, f64> = items.iter().map(|i| (i.id, i.weight)).collect();

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for result in results {
        let Some(score) = result.score else { continue };
        let weight = weights.get(&result.criteria_item_id).copied().unwrap_or(1.0);
        numerator += score as f64 * weight;
        denominator += weight;
    }

    (denominator > 0.0).then(|| numerator / denominator)
}

/// Synthesis prompt over document summaries and effective results.
///
/// Narratives reflect human edits where one is current; scores are always
/// the AI-authored values since edits cannot touch them.
fn build_prompt(
    ctx: &PipelineContext,
    document_summaries: &[String],
    items: &[&CriteriaItem],
    results: &[CriteriaResult],
    config: &ResolvedEvalConfig,
) -> PipelineResult<String> {
    let by_item: HashMap<Uuid, &&CriteriaItem> =
        items.iter().map(|i| (i.id, i)).collect();

    let mut lines = Vec::with_capacity(results.len());
    for result in results {
        let external_id = by_item
            .get(&result.criteria_item_id)
            .map(|i| i.external_id.as_str())
            .unwrap_or("?");

        let narrative = match ctx.results.current_edit(result.id)? {
            Some(edit) => edit.narrative.unwrap_or_else(|| result.explanation.clone()),
            None => result.explanation.clone(),
        };

        let score = result
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "failed".to_string());

        lines.push(format!("- {} (score {}): {}", external_id, score, narrative));
    }

    let summaries = document_summaries.join("\n\n");

    Ok(format!(
        "Document summaries:\n{summaries}\n\n\
         Per-requirement results:\n{results}\n\n\
         Scoring guidance:\n{guidance}",
        summaries = summaries,
        results = lines.join("\n"),
        guidance = config.rubric.as_scoring_guidance(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn item(weight: f64) -> CriteriaItem {
        CriteriaItem {
            id: Uuid::new_v4(),
            external_id: "REQ".to_string(),
            requirement: "r".to_string(),
            description: String::new(),
            category: "c".to_string(),
            weight,
            order_index: 0,
        }
    }

    fn result(item_id: Uuid, score: Option<u8>) -> CriteriaResult {
        CriteriaResult {
            id: Uuid::new_v4(),
            evaluation_id: Uuid::new_v4(),
            criteria_item_id: item_id,
            score,
            confidence: None,
            explanation: String::new(),
            citations: vec![],
            extra_fields: BTreeMap::new(),
            idempotency_key: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_weighted_aggregate() {
        let a = item(1.0);
        let b = item(3.0);
        let results = vec![result(a.id, Some(80)), result(b.id, Some(60))];

        let aggregate = aggregate_score(&[&a, &b], &results).unwrap();
        assert!((aggregate - 65.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_null_scores_excluded_from_both_sides() {
        let a = item(1.0);
        let b = item(9.0);
        let results = vec![result(a.id, Some(40)), result(b.id, None)];

        // The failed heavyweight item must not drag the mean.
        let aggregate = aggregate_score(&[&a, &b], &results).unwrap();
        assert!((aggregate - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_failed_yields_none() {
        let a = item(1.0);
        let results = vec![result(a.id, None)];
        assert!(aggregate_score(&[&a], &results).is_none());
    }
}
