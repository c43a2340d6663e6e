//! Scoring rubrics: ordered tiers mapping a numeric score to a status label.
//!
//! Rubrics must partition the closed range [0,100] exactly. Validation runs
//! once at resolution time so the per-score lookup stays a plain linear scan.
//! The resolved rubric is bundled with the prompt configuration into an
//! immutable value threaded through all pipeline phases.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// One tier of a scoring rubric: scores in `[min, max]` carry `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricTier {
    pub min: u8,
    pub max: u8,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

/// An ordered list of tiers spanning [0,100] with no gaps or overlaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRubric {
    pub tiers: Vec<RubricTier>,
}

impl ScoringRubric {
    /// Validate that the tiers exactly partition [0,100].
    ///
    /// Fails closed: a violated rubric fails the evaluation at resolution
    /// time rather than mis-labelling individual scores.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.tiers.is_empty() {
            return Err(PipelineError::Configuration(
                "rubric has no tiers".to_string(),
            ));
        }

        let mut tiers = self.tiers.clone();
        tiers.sort_by_key(|t| t.min);

        if tiers[0].min != 0 {
            return Err(PipelineError::Configuration(format!(
                "rubric does not start at 0 (first tier starts at {})",
                tiers[0].min
            )));
        }

        for tier in &tiers {
            if tier.min > tier.max {
                return Err(PipelineError::Configuration(format!(
                    "rubric tier '{}' has min {} > max {}",
                    tier.label, tier.min, tier.max
                )));
            }
        }

        for pair in tiers.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.min != prev.max + 1 {
                return Err(PipelineError::Configuration(format!(
                    "rubric tiers '{}' and '{}' leave a gap or overlap between {} and {}",
                    prev.label, next.label, prev.max, next.min
                )));
            }
        }

        let last = tiers.last().map(|t| t.max).unwrap_or(0);
        if last != 100 {
            return Err(PipelineError::Configuration(format!(
                "rubric does not end at 100 (last tier ends at {})",
                last
            )));
        }

        Ok(())
    }

    /// Map a score to its tier label. Pure; assumes `validate()` passed.
    pub fn derive_status(&self, score: u8) -> PipelineResult<&str> {
        self.tiers
            .iter()
            .find(|t| t.min <= score && score <= t.max)
            .map(|t| t.label.as_str())
            .ok_or_else(|| {
                PipelineError::Configuration(format!("no rubric tier covers score {}", score))
            })
    }

    /// Render the rubric as scoring guidance for the model prompt.
    ///
    /// The model is told what scores mean, not what labels exist: it outputs
    /// a raw numeric score and the label is always derived at read time.
    pub fn as_scoring_guidance(&self) -> String {
        let mut tiers = self.tiers.clone();
        tiers.sort_by_key(|t| t.min);

        tiers
            .iter()
            .map(|t| {
                if t.description.is_empty() {
                    format!("- {}-{}: {}", t.min, t.max, t.label)
                } else {
                    format!("- {}-{}: {} ({})", t.min, t.max, t.label, t.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Built-in default rubric used when neither the criteria set nor the
/// organization carries an override.
pub fn system_default_rubric() -> ScoringRubric {
    ScoringRubric {
        tiers: vec![
            RubricTier {
                min: 0,
                max: 59,
                label: "Non-Compliant".to_string(),
                description: "Requirement is not met".to_string(),
            },
            RubricTier {
                min: 60,
                max: 79,
                label: "Partially Compliant".to_string(),
                description: "Requirement is partially met with gaps".to_string(),
            },
            RubricTier {
                min: 80,
                max: 100,
                label: "Compliant".to_string(),
                description: "Requirement is fully met".to_string(),
            },
        ],
    }
}

/// Prompt text bundle applied to an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// System prompt for document summarization
    pub summarize_system: String,

    /// System prompt for per-criteria evaluation
    pub evaluate_system: String,

    /// System prompt for the final synthesis
    pub synthesize_system: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            summarize_system: "You are a compliance analyst. Analyze the document and \
                summarize it in 300-500 words, focusing on compliance-relevant content: \
                controls, policies, obligations, and evidence of adherence."
                .to_string(),
            evaluate_system: "You are a compliance auditor. Assess whether the provided \
                document excerpts satisfy the requirement. Respond with a single JSON \
                object containing: score (integer 0-100), confidence (integer 0-100), \
                explanation (string), citations (array of quoted strings from the \
                excerpts). You may include additional keys for domain-specific findings."
                .to_string(),
            synthesize_system: "You are a compliance auditor writing an executive \
                assessment. Given per-requirement results and document summaries, \
                produce: an overall assessment, 3-5 key findings, areas of concern, \
                strengths, and 3-5 recommendations."
                .to_string(),
        }
    }
}

/// Effective configuration for one evaluation, resolved once and passed by
/// parameter through all phases.
#[derive(Debug, Clone)]
pub struct ResolvedEvalConfig {
    pub rubric: ScoringRubric,
    pub prompts: PromptConfig,
}

/// Resolve the effective rubric for an evaluation.
///
/// Precedence, first match wins: criteria-set override, organization
/// override, system default. The winner is validated here, once, so the
/// per-score hot path never re-checks.
pub fn resolve_rubric(
    set_override: Option<&ScoringRubric>,
    org_override: Option<&ScoringRubric>,
    system: &ScoringRubric,
) -> PipelineResult<ScoringRubric> {
    let rubric = set_override.or(org_override).unwrap_or(system).clone();
    rubric.validate()?;
    Ok(rubric)
}
