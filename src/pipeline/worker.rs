//! Stateless worker: one job message, phases 1-3, guaranteed terminal write.
//!
//! Every exit path ends with either `Completed` or `Failed` recorded on the
//! evaluation; the worker never lets an error escape that responsibility.
//! Phases run strictly sequentially inside one invocation, so external
//! calls serialize naturally.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, instrument};

use crate::dispatch::JobMessage;
use crate::domain::rubric::{resolve_rubric, PromptConfig, ResolvedEvalConfig};
use crate::domain::ScoringRubric;
use crate::error::{PipelineError, PipelineResult};

use super::{evaluator, summarizer, synthesis, PipelineContext, ProgressTracker};

/// Hard ceiling on one pipeline invocation.
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(15 * 60);

pub struct Worker {
    ctx: Arc<PipelineContext>,
    tracker: ProgressTracker,
    system_rubric: ScoringRubric,
    prompts: PromptConfig,
    run_timeout: Duration,
}

impl Worker {
    pub fn new(
        ctx: Arc<PipelineContext>,
        tracker: ProgressTracker,
        system_rubric: ScoringRubric,
        prompts: PromptConfig,
    ) -> Self {
        Self {
            ctx,
            tracker,
            system_rubric,
            prompts,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Process one message end to end.
    ///
    /// Returns `Ok` once a terminal state is recorded, including pipeline
    /// failures; `Err` only when the outcome itself could not be written,
    /// which is the queue's cue to redeliver.
    #[instrument(skip(self, message), fields(evaluation_id = %message.evaluation_id))]
    pub async fn process(&self, message: &JobMessage) -> PipelineResult<()> {
        let outcome = match tokio::time::timeout(self.run_timeout, self.run_phases(message)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(PipelineError::ProviderInvocation(format!(
                "evaluation timed out after {:?}",
                self.run_timeout
            ))),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "Pipeline failed; recording terminal state");
                self.tracker
                    .fail(message.evaluation_id, e.to_string())
                    .map(|_| ())
            }
        }
    }

    async fn run_phases(&self, message: &JobMessage) -> PipelineResult<()> {
        self.tracker.begin(message.evaluation_id)?;

        if message.action != "evaluate" {
            return Err(PipelineError::Validation(format!(
                "unknown job action '{}'",
                message.action
            )));
        }

        // Resolve rubric and prompts once; threaded through all phases.
        let set = self.ctx.catalog.get_criteria_set(message.criteria_set_id)?;
        let org_rubric = self.ctx.catalog.org_rubric(message.workspace_id);
        let rubric = resolve_rubric(
            set.rubric_override.as_ref(),
            org_rubric.as_ref(),
            &self.system_rubric,
        )?;
        let config = ResolvedEvalConfig {
            rubric,
            prompts: self.prompts.clone(),
        };

        // Phase 1: summarize documents, progress [0,10].
        let summaries = summarizer::run(
            &self.ctx,
            &self.tracker,
            message.evaluation_id,
            &message.document_ids,
            &config,
        )
        .await?;

        // Phase 2: evaluate criteria, progress [10,90].
        let items = set.ordered_items();
        let results = evaluator::run(
            &self.ctx,
            &self.tracker,
            message.evaluation_id,
            &message.document_ids,
            &items,
            &config,
        )
        .await?;

        // Phase 3: synthesize, aggregate, complete.
        synthesis::run(
            &self.ctx,
            &self.tracker,
            message.evaluation_id,
            &summaries,
            &items,
            &results,
            &config,
        )
        .await?;

        Ok(())
    }
}
