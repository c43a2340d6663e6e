//! Provider router: identifier correction, dispatch, error classification.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, instrument, warn};

use crate::domain::{AiModel, AiProvider, ProviderFamily, ValidationCategory};
use crate::error::{PipelineError, PipelineResult};

use super::client::{ModelClient, ModelRequest};

/// Region prefixes the aliased family recognizes, each followed by a dot
/// in a corrected identifier (two to four letters).
const KNOWN_REGION_PREFIXES: &[&str] = &["us", "use", "usw", "eu", "ap", "apac", "jp"];

const DEFAULT_REGION_PREFIX: &str = "us";

/// How many classified errors the operator ring retains.
const ERROR_LOG_CAPACITY: usize = 128;

/// Structured record of a classified provider failure.
///
/// Carries the model identifier attempted, the provider, and sanitized
/// request parameters only; prompt payloads are never logged.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model_identifier: String,
    pub category: &'static str,
    pub message: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Routes logical model references to concrete provider calls.
pub struct ProviderRouter {
    client: Arc<dyn ModelClient>,
    recent_errors: Mutex<VecDeque<ErrorLogEntry>>,
}

impl ProviderRouter {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            recent_errors: Mutex::new(VecDeque::with_capacity(ERROR_LOG_CAPACITY)),
        }
    }

    /// Invoke a model, correcting its identifier first where the provider
    /// family requires the region-qualified alias.
    #[instrument(skip(self, system_prompt, user_prompt), fields(provider = %provider.name, model = %model.identifier))]
    pub async fn invoke(
        &self,
        provider: &AiProvider,
        model: &AiModel,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> PipelineResult<String> {
        let identifier = effective_identifier(provider, model);
        if identifier != model.identifier {
            warn!(corrected = %identifier, "Corrected model identifier for on-demand invocation");
        }

        let request = ModelRequest {
            model_identifier: identifier,
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            temperature,
            max_tokens: max_tokens.min(model.max_output_tokens),
        };

        match self.client.invoke(provider, &request).await {
            Ok(text) => Ok(text),
            Err(e) => {
                self.record_error(provider, &request, &e);
                Err(e)
            }
        }
    }

    /// Classified errors retained for operator inspection, newest last.
    pub fn recent_errors(&self) -> Vec<ErrorLogEntry> {
        match self.recent_errors.lock() {
            Ok(ring) => ring.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn record_error(&self, provider: &AiProvider, request: &ModelRequest, e: &PipelineError) {
        error!(
            provider = %provider.name,
            model = %request.model_identifier,
            category = e.category(),
            error = %e,
            "Provider call failed"
        );

        // A poisoned ring must never mask the original provider error.
        if let Ok(mut ring) = self.recent_errors.lock() {
            if ring.len() == ERROR_LOG_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(ErrorLogEntry {
                timestamp: Utc::now(),
                provider: provider.name.clone(),
                model_identifier: request.model_identifier.clone(),
                category: e.category(),
                message: e.to_string(),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            });
        }
    }
}

/// The identifier actually sent to the provider for this model.
fn effective_identifier(provider: &AiProvider, model: &AiModel) -> String {
    match (provider.family, model.validation_category) {
        (ProviderFamily::RegionAliased, ValidationCategory::RequiresAlias) => {
            let prefix = provider.region_prefix.as_deref().unwrap_or(DEFAULT_REGION_PREFIX);
            correct_identifier(&model.identifier, prefix)
        }
        _ => model.identifier.clone(),
    }
}

/// Prepend the region prefix unless the identifier already carries one.
///
/// Applied proactively before the first call to avoid a wasted round-trip
/// on providers that reject bare identifiers for on-demand invocation.
/// Idempotent: an already-corrected identifier passes through unchanged.
pub fn correct_identifier(identifier: &str, default_prefix: &str) -> String {
    if has_region_prefix(identifier) {
        return identifier.to_string();
    }
    format!("{}.{}", default_prefix, identifier)
}

fn has_region_prefix(identifier: &str) -> bool {
    match identifier.split_once('.') {
        Some((head, _)) => KNOWN_REGION_PREFIXES.contains(&head),
        None => false,
    }
}
