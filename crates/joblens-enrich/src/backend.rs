//! OpenAI-compatible chat completion backend.
//!
//! The enrichment capability is treated as opaque: one synchronous call in,
//! structured JSON text out, no state assumed between calls. Retry and rate
//! limiting live in the [call gate](crate::gate), not here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use joblens_core::{defaults, CompletionBackend, Error, Result};

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct ChatBackendConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Chat model to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ChatBackendConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::LLM_BASE_URL.to_string(),
            api_key: None,
            model: defaults::LLM_MODEL.to_string(),
            timeout_seconds: defaults::LLM_TIMEOUT_SECS,
        }
    }
}

impl ChatBackendConfig {
    /// Create from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `LLM_BASE_URL` | deepseek endpoint | OpenAI-compatible base URL |
    /// | `LLM_API_KEY` | unset | Bearer token |
    /// | `LLM_MODEL` | `deepseek-chat` | Chat model name |
    /// | `LLM_TIMEOUT_SECS` | `120` | Per-request timeout |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| defaults::LLM_BASE_URL.to_string()),
            api_key: std::env::var("LLM_API_KEY").ok(),
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| defaults::LLM_MODEL.to_string()),
            timeout_seconds: std::env::var("LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::LLM_TIMEOUT_SECS),
        }
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// OpenAI-compatible chat completion backend.
pub struct ChatBackend {
    client: Client,
    config: ChatBackendConfig,
}

impl ChatBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: ChatBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        info!(
            subsystem = "enrich",
            component = "backend",
            model = %config.model,
            "Initializing chat backend: url={}",
            config.base_url
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ChatBackendConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ChatBackendConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionBackend for ChatBackend {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(ref api_key) = self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "completion request returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Request(format!("invalid completion response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Request("completion response had no choices".to_string()))?;

        debug!(
            subsystem = "enrich",
            component = "backend",
            response_len = content.len(),
            "Completion received"
        );
        Ok(content)
    }
}
