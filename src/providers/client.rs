//! Provider-family HTTP callers.
//!
//! Each family has its own request/response shape; all of them normalize
//! into plain text. The `ModelClient` trait is the seam tests use to inject
//! scripted responses without network access.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::timeout;

use crate::domain::{AiProvider, ProviderFamily};
use crate::error::{PipelineError, PipelineResult};

/// A single model invocation, already identifier-corrected by the router.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model_identifier: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Trait for issuing one model call against a provider.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Issue the call and return the model's text output.
    async fn invoke(
        &self,
        provider: &AiProvider,
        request: &ModelRequest,
    ) -> PipelineResult<String>;
}

/// reqwest-backed client covering all provider families.
pub struct HttpModelClient {
    client: reqwest::Client,
    call_timeout: Duration,
}

impl HttpModelClient {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            call_timeout,
        }
    }

    /// Read the provider's credential from its configured env var.
    fn credential(&self, provider: &AiProvider) -> PipelineResult<String> {
        std::env::var(&provider.credential_env).map_err(|_| {
            PipelineError::Configuration(format!(
                "credential env var '{}' for provider '{}' is not set",
                provider.credential_env, provider.name
            ))
        })
    }

    fn request_body(&self, family: ProviderFamily, request: &ModelRequest) -> serde_json::Value {
        match family {
            // Region-aliased converse-style API: system block plus messages.
            ProviderFamily::RegionAliased => serde_json::json!({
                "modelId": request.model_identifier,
                "system": [{ "text": request.system_prompt }],
                "messages": [{ "role": "user", "content": [{ "text": request.user_prompt }] }],
                "inferenceConfig": {
                    "temperature": request.temperature,
                    "maxTokens": request.max_tokens,
                },
            }),
            ProviderFamily::ChatCompletions => serde_json::json!({
                "model": request.model_identifier,
                "messages": [
                    { "role": "system", "content": request.system_prompt },
                    { "role": "user", "content": request.user_prompt },
                ],
                "temperature": request.temperature,
                "max_tokens": request.max_tokens,
            }),
            ProviderFamily::Messages => serde_json::json!({
                "model": request.model_identifier,
                "system": request.system_prompt,
                "messages": [{ "role": "user", "content": request.user_prompt }],
                "temperature": request.temperature,
                "max_tokens": request.max_tokens,
            }),
        }
    }

    fn extract_text(family: ProviderFamily, body: &str) -> anyhow::Result<String> {
        match family {
            ProviderFamily::RegionAliased => {
                #[derive(Deserialize)]
                struct ConverseResponse {
                    output: ConverseOutput,
                }
                #[derive(Deserialize)]
                struct ConverseOutput {
                    message: ConverseMessage,
                }
                #[derive(Deserialize)]
                struct ConverseMessage {
                    content: Vec<ConverseContent>,
                }
                #[derive(Deserialize)]
                struct ConverseContent {
                    text: Option<String>,
                }

                let parsed: ConverseResponse =
                    serde_json::from_str(body).context("unexpected converse response shape")?;
                Ok(parsed
                    .output
                    .message
                    .content
                    .into_iter()
                    .filter_map(|c| c.text)
                    .collect::<Vec<_>>()
                    .join(""))
            }
            ProviderFamily::ChatCompletions => {
                #[derive(Deserialize)]
                struct ChatResponse {
                    choices: Vec<ChatChoice>,
                }
                #[derive(Deserialize)]
                struct ChatChoice {
                    message: ChatMessage,
                }
                #[derive(Deserialize)]
                struct ChatMessage {
                    content: String,
                }

                let parsed: ChatResponse =
                    serde_json::from_str(body).context("unexpected chat response shape")?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .context("chat response has no choices")
            }
            ProviderFamily::Messages => {
                #[derive(Deserialize)]
                struct MessagesResponse {
                    content: Vec<MessagesContent>,
                }
                #[derive(Deserialize)]
                struct MessagesContent {
                    text: Option<String>,
                }

                let parsed: MessagesResponse =
                    serde_json::from_str(body).context("unexpected messages response shape")?;
                Ok(parsed
                    .content
                    .into_iter()
                    .filter_map(|c| c.text)
                    .collect::<Vec<_>>()
                    .join(""))
            }
        }
    }

    /// Map an HTTP error status onto the pipeline taxonomy.
    fn classify_status(status: StatusCode, body: &str, model: &str) -> PipelineError {
        let summary = body.chars().take(200).collect::<String>();
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                PipelineError::RateLimit(format!("model '{}': {}", model, summary))
            }
            StatusCode::NOT_FOUND => PipelineError::ModelUnavailable(format!(
                "model '{}' rejected by provider: {}",
                model, summary
            )),
            StatusCode::BAD_REQUEST if body.contains("on-demand") || body.contains("model") => {
                PipelineError::ModelUnavailable(format!(
                    "model '{}' not invocable: {}",
                    model, summary
                ))
            }
            _ => PipelineError::ProviderInvocation(format!(
                "model '{}' returned {}: {}",
                model, status, summary
            )),
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn invoke(
        &self,
        provider: &AiProvider,
        request: &ModelRequest,
    ) -> PipelineResult<String> {
        let credential = self.credential(provider)?;
        let body = self.request_body(provider.family, request);

        let call = self
            .client
            .post(&provider.endpoint)
            .bearer_auth(credential)
            .json(&body)
            .send();

        let response = timeout(self.call_timeout, call)
            .await
            .map_err(|_| {
                PipelineError::ProviderInvocation(format!(
                    "call to '{}' timed out after {:?}",
                    provider.name, self.call_timeout
                ))
            })?
            .map_err(|e| {
                PipelineError::ProviderInvocation(format!(
                    "call to '{}' failed: {}",
                    provider.name, e
                ))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            PipelineError::ProviderInvocation(format!(
                "reading response from '{}' failed: {}",
                provider.name, e
            ))
        })?;

        if !status.is_success() {
            return Err(Self::classify_status(
                status,
                &text,
                &request.model_identifier,
            ));
        }

        Self::extract_text(provider.family, &text)
            .map_err(|e| PipelineError::Validation(format!("provider response: {:#}", e)))
    }
}
