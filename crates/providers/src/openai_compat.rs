//! OpenAI-compatible inference server backend.
//!
//! Works with vLLM, SGLang and any server exposing the OpenAI
//! `/v1/completions` and `/v1/chat/completions` routes.
//!
//! Supports:
//! - Raw completions with `return_token_ids` (token-level rollouts)
//! - Tokenization through the server's `/tokenize` route
//! - Chat completions (reward judges)
//! - Health checks

use std::time::Duration;

use agentrl_core::engine::{ChatCompleter, GenerateRequest, Generation, LlmEngine};
use agentrl_core::error::EngineError;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// An OpenAI-compatible inference backend.
pub struct OpenAiCompatEngine {
    name: String,
    base_url: String,
    tokenize_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatEngine {
    /// Create a backend for `base_url` (e.g., `http://localhost:8000/v1`).
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(EngineError::NotConfigured("base_url is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: "openai-compat".into(),
            tokenize_url: format!("{}/tokenize", strip_last_segment(&base_url)),
            base_url,
            api_key: None,
            model: model.into(),
            client,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// True when `GET {base}/models` answers with a success status.
    pub async fn health_check(&self) -> Result<bool, EngineError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(map_transport_error)?;
        Ok(response.status().is_success())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    async fn post_json<T: DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T, EngineError> {
        let response = self
            .authorize(self.client.post(url))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, url, body = %error_body, "Inference server returned error");
            return Err(EngineError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Decode(format!("Failed to parse response: {e}")))
    }
}

/// `http://host/v1` → `http://host`; a bare authority is kept as-is.
fn strip_last_segment(base_url: &str) -> &str {
    let path_start = base_url.find("://").map(|i| i + 3).unwrap_or(0);
    match base_url[path_start..].rfind('/') {
        Some(i) => &base_url[..path_start + i],
        None => base_url,
    }
}

fn map_transport_error(e: reqwest::Error) -> EngineError {
    if e.is_timeout() {
        EngineError::Timeout(e.to_string())
    } else {
        EngineError::Network(e.to_string())
    }
}

#[async_trait]
impl LlmEngine for OpenAiCompatEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tokenize(&self, text: &str) -> Result<Vec<u32>, EngineError> {
        let body = json!({
            "model": self.model,
            "prompt": text,
            "add_special_tokens": true,
        });
        let response: TokenizeResponse = self.post_json(&self.tokenize_url, &body).await?;
        debug!(engine = %self.name, tokens = response.tokens.len(), "Tokenized prompt");
        Ok(response.tokens)
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, EngineError> {
        let url = format!("{}/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": request.prompt,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": false,
            "return_token_ids": true,
        });

        debug!(engine = %self.name, model = %self.model, max_tokens = request.max_tokens, "Sending completion request");

        let response: CompletionResponse = self.post_json(&url, &body).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Decode("No choices in response".into()))?;
        let token_ids = choice.token_ids.ok_or_else(|| {
            EngineError::Decode("Response has no token_ids; the server must support return_token_ids".into())
        })?;

        Ok(Generation {
            token_ids,
            text: choice.text,
        })
    }
}

#[async_trait]
impl ChatCompleter for OpenAiCompatEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });

        debug!(engine = %self.name, model = %self.model, "Sending chat request");

        let response: ChatResponse = self.post_json(&url, &body).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Decode("No choices in response".into()))?;
        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    tokens: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
    #[serde(default)]
    token_ids: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
