//! AI provider and model configuration rows.
//!
//! Administered outside this system; read by the provider router. A model's
//! `validation_category` records whether its raw identifier is directly
//! invocable or needs the region-qualified alias some providers require for
//! on-demand calls.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A callable AI backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProvider {
    pub id: Uuid,
    pub name: String,
    pub family: ProviderFamily,

    /// API endpoint base URL
    pub endpoint: String,

    /// Name of the environment variable holding the API key or credential
    /// reference. The key itself is never stored in configuration rows.
    pub credential_env: String,

    /// Default region prefix used for identifier correction, e.g. "us"
    #[serde(default)]
    pub region_prefix: Option<String>,
}

/// Closed set of provider API families the router can dispatch to.
///
/// Each family has its own request/response shape, normalized by the
/// router into plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// Region-aliased on-demand API; identifiers may need a region prefix
    RegionAliased,

    /// Chat-completions style API; identifiers pass through unchanged
    ChatCompletions,

    /// Messages-style API; identifiers pass through unchanged
    Messages,
}

/// Whether a model's raw identifier is invocable as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCategory {
    /// The identifier can be invoked directly
    Direct,

    /// The identifier requires the region-qualified alias
    RequiresAlias,
}

impl Default for ValidationCategory {
    fn default() -> Self {
        Self::Direct
    }
}

/// One model exposed by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiModel {
    pub id: Uuid,
    pub provider_id: Uuid,

    /// Raw model identifier as configured
    pub identifier: String,

    pub context_window: u32,
    pub max_output_tokens: u32,

    #[serde(default)]
    pub validation_category: ValidationCategory,
}
