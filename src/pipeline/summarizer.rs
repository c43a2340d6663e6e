//! Phase 1: document summarization.
//!
//! Produces a synopsis per linked document and a combined synopsis when an
//! evaluation covers more than one document. Occupies the [0,10] progress
//! band, advanced proportionally as documents finish.

use tracing::instrument;
use uuid::Uuid;

use crate::domain::rubric::ResolvedEvalConfig;
use crate::error::{PipelineError, PipelineResult};

use super::retry::with_retry;
use super::{PipelineContext, ProgressTracker};

const SUMMARIZE_TEMPERATURE: f32 = 0.3;

/// Truncation ceiling for document content fed into one summarize call.
const MAX_CONTENT_CHARS: usize = 48_000;

/// Summarize every linked document and write back per-document synopses.
///
/// Returns the combined synopsis for the evaluation header.
#[instrument(skip(ctx, tracker, config), fields(%evaluation_id))]
pub async fn run(
    ctx: &PipelineContext,
    tracker: &ProgressTracker,
    evaluation_id: Uuid,
    document_ids: &[Uuid],
    config: &ResolvedEvalConfig,
) -> PipelineResult<Vec<String>> {
    let total = document_ids.len();
    let mut summaries = Vec::with_capacity(total);

    for (done, document_id) in document_ids.iter().enumerate() {
        let summary = summarize_document(ctx, *document_id, config).await?;

        ctx.evaluations
            .set_link_summary(evaluation_id, *document_id, summary.clone())?;
        summaries.push(summary);

        let progress = ((10 * (done + 1)) / total) as u8;
        tracker.set_progress(evaluation_id, progress)?;
    }

    let combined = combine(ctx, &summaries, config).await?;
    ctx.evaluations.update_evaluation(evaluation_id, &mut |e| {
        e.document_summary = Some(combined.clone());
        Ok(())
    })?;

    Ok(summaries)
}

/// Summarize one document's indexed content.
async fn summarize_document(
    ctx: &PipelineContext,
    document_id: Uuid,
    config: &ResolvedEvalConfig,
) -> PipelineResult<String> {
    // Content fetch failures are not retried; they fail the phase.
    let content = ctx.index.fetch_content(document_id).await?;
    if content.trim().is_empty() {
        return Err(PipelineError::Validation(format!(
            "document {} has no indexed content",
            document_id
        )));
    }

    let truncated = truncate(&content, MAX_CONTENT_CHARS);
    let user_prompt = format!("Document content:\n\n{}", truncated);

    with_retry(&ctx.retry, "summarize_document", || {
        ctx.router.invoke(
            &ctx.provider,
            &ctx.model,
            &config.prompts.summarize_system,
            &user_prompt,
            SUMMARIZE_TEMPERATURE,
            ctx.model.max_output_tokens,
        )
    })
    .await
}

/// Combine per-document synopses into one. A single summary is used as-is.
pub async fn combine(
    ctx: &PipelineContext,
    summaries: &[String],
    config: &ResolvedEvalConfig,
) -> PipelineResult<String> {
    match summaries {
        [] => Err(PipelineError::Validation(
            "no document summaries produced".to_string(),
        )),
        [single] => Ok(single.clone()),
        many => {
            let listed = many
                .iter()
                .enumerate()
                .map(|(i, s)| format!("Document {}:\n{}", i + 1, s))
                .collect::<Vec<_>>()
                .join("\n\n");
            let user_prompt = format!(
                "Combine the following per-document summaries into a single \
                 coherent synopsis of the document set:\n\n{}",
                listed
            );

            with_retry(&ctx.retry, "combine_summaries", || {
                ctx.router.invoke(
                    &ctx.provider,
                    &ctx.model,
                    &config.prompts.summarize_system,
                    &user_prompt,
                    SUMMARIZE_TEMPERATURE,
                    ctx.model.max_output_tokens,
                )
            })
            .await
        }
    }
}

fn truncate(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}
