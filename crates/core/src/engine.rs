//! Backend traits: the abstraction over LLM inference servers.
//!
//! The runtime only needs two operations from a model backend: turn text
//! into token ids, and continue a prompt. Reward judges need even less:
//! send a prompt, get a reply.
//!
//! Implementations: OpenAI-compatible inference servers (vLLM, SGLang).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// What to continue from: raw text or an already tokenized buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Text(String),
    Tokens(Vec<u32>),
}

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: Prompt,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    10240
}

fn default_temperature() -> f32 {
    0.6
}

impl GenerateRequest {
    pub fn new(prompt: Prompt) -> Self {
        Self {
            prompt,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Generated token ids and their decoded text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub token_ids: Vec<u32>,
    pub text: String,
}

/// The LLM backend used by the interactive runtime.
#[async_trait]
pub trait LlmEngine: Send + Sync {
    /// A human-readable name (e.g., "openai-compat").
    fn name(&self) -> &str;

    /// Convert text into token ids understood by the backend.
    async fn tokenize(&self, text: &str) -> std::result::Result<Vec<u32>, EngineError>;

    /// Continue the prompt and return the generated tokens and text.
    async fn generate(&self, request: GenerateRequest) -> std::result::Result<Generation, EngineError>;
}

/// A chat endpoint used by external-judge reward strategies.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    fn name(&self) -> &str;

    /// Send a single user prompt and return the reply text.
    async fn complete(&self, prompt: &str) -> std::result::Result<String, EngineError>;
}
