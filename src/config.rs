//! Service configuration.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (APPRAISE_CONFIG for the file path)
//! 2. Config file (appraise.yaml)
//! 3. Defaults
//!
//! The file describes the AI provider and model, the system default rubric,
//! prompt overrides, and retry/queue/server settings. Credentials are never
//! stored in the file; providers reference an environment variable instead.
//! Validation runs at load so a broken rubric or provider family fails
//! startup, not a running evaluation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::rubric::{system_default_rubric, PromptConfig};
use crate::domain::{AiModel, AiProvider, ProviderFamily, ScoringRubric, ValidationCategory};
use crate::pipeline::RetryPolicy;

const CONFIG_ENV: &str = "APPRAISE_CONFIG";
const CONFIG_FILE_NAME: &str = "appraise.yaml";

/// Raw config file schema (matches YAML structure).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub model: Option<ModelConfig>,
    /// System default rubric override
    #[serde(default)]
    pub rubric: Option<ScoringRubric>,
    #[serde(default)]
    pub prompts: Option<PromptConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    /// Per provider call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,
    /// Hard ceiling on one pipeline invocation
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,
}

fn default_queue_capacity() -> usize {
    64
}
fn default_call_timeout() -> u64 {
    120
}
fn default_run_timeout() -> u64 {
    15 * 60
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            call_timeout_seconds: default_call_timeout(),
            run_timeout_seconds: default_run_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub family: ProviderFamily,
    pub endpoint: String,
    pub credential_env: String,
    #[serde(default)]
    pub region_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub identifier: String,
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    #[serde(default = "default_max_output")]
    pub max_output_tokens: u32,
    #[serde(default)]
    pub validation_category: ValidationCategory,
}

fn default_context_window() -> u32 {
    200_000
}
fn default_max_output() -> u32 {
    4096
}

/// Resolved configuration ready to wire into the service.
#[derive(Debug, Clone)]
pub struct ResolvedServiceConfig {
    pub address: String,
    pub queue_capacity: usize,
    pub call_timeout: Duration,
    pub run_timeout: Duration,
    pub retry: RetryPolicy,
    pub provider: AiProvider,
    pub model: AiModel,
    pub system_rubric: ScoringRubric,
    pub prompts: PromptConfig,
    pub config_file: Option<PathBuf>,
}

impl ResolvedServiceConfig {
    /// Load from an explicit path, the APPRAISE_CONFIG env var, or a file
    /// named `appraise.yaml` in the current directory; fall back to
    /// defaults when none exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                local.exists().then_some(local)
            });

        let file = match &path {
            Some(p) => load_config_file(p)?,
            None => ConfigFile::default(),
        };

        Self::resolve(file, path)
    }

    fn resolve(file: ConfigFile, config_file: Option<PathBuf>) -> Result<Self> {
        let provider_config = file.provider.unwrap_or_else(|| ProviderConfig {
            name: "default".to_string(),
            family: ProviderFamily::Messages,
            endpoint: "http://localhost:11434/v1/messages".to_string(),
            credential_env: "APPRAISE_API_KEY".to_string(),
            region_prefix: None,
        });
        let model_config = file.model.unwrap_or_else(|| ModelConfig {
            identifier: "default-model".to_string(),
            context_window: default_context_window(),
            max_output_tokens: default_max_output(),
            validation_category: ValidationCategory::Direct,
        });

        if provider_config.endpoint.is_empty() {
            anyhow::bail!("provider endpoint cannot be empty");
        }

        let provider_id = Uuid::new_v4();
        let provider = AiProvider {
            id: provider_id,
            name: provider_config.name,
            family: provider_config.family,
            endpoint: provider_config.endpoint,
            credential_env: provider_config.credential_env,
            region_prefix: provider_config.region_prefix,
        };
        let model = AiModel {
            id: Uuid::new_v4(),
            provider_id,
            identifier: model_config.identifier,
            context_window: model_config.context_window,
            max_output_tokens: model_config.max_output_tokens,
            validation_category: model_config.validation_category,
        };

        let system_rubric = file.rubric.unwrap_or_else(system_default_rubric);
        system_rubric
            .validate()
            .context("system default rubric is invalid")?;

        Ok(Self {
            address: file.server.address,
            queue_capacity: file.queue.capacity,
            call_timeout: Duration::from_secs(file.queue.call_timeout_seconds),
            run_timeout: Duration::from_secs(file.queue.run_timeout_seconds),
            retry: file.retry.unwrap_or_default(),
            provider,
            model,
            system_rubric,
            prompts: file.prompts.unwrap_or_default(),
            config_file,
        })
    }
}

/// Load and parse a config file.
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
