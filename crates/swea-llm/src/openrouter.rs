//! OpenRouter chat-completions client. One HTTP request per call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::types::{ChatMessage, ChatOptions, ChatResponse, TokenUsage};
use crate::Result;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenRouter API client.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl OpenRouterClient {
    /// Build a client. A missing key is not an error here: every call then
    /// fails with [`LlmError::MissingApiKey`], so the server still starts.
    pub fn new(
        api_key: Option<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey("openrouter"))?;

        let request = OpenRouterRequest {
            model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        debug!(model = %model, messages = messages.len(), "sending chat completion");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, "chat completion response");

        if !status.is_success() {
            let message = error_message(&body);
            error!(status = status.as_u16(), message = %message, "provider error");
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited(message));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parse_response(&body)
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

// ─── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    #[serde(default)]
    choices: Vec<OpenRouterChoice>,
    #[serde(default)]
    usage: Option<OpenRouterUsage>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    error: Option<OpenRouterError>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterMessage,
}

#[derive(Debug, Deserialize)]
struct OpenRouterMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenRouterError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: OpenRouterError,
}

fn parse_response(body: &str) -> Result<ChatResponse> {
    let parsed: OpenRouterResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("{e}: {body}")))?;

    // OpenRouter reports some upstream failures inside a 200 response.
    if let Some(err) = parsed.error {
        return Err(LlmError::Api {
            status: err.code.unwrap_or(502),
            message: err.message,
        });
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

    Ok(ChatResponse {
        content,
        usage: parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        model: parsed.model,
    })
}

/// Prefer the provider's `error.message`; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// ─── Tests ────────────────────────────────────────────────────────────────
