//! Configuration loading, validation, and management for agentrl.
//!
//! Loads configuration from `~/.agentrl/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.agentrl/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inference server used for rollouts
    #[serde(default)]
    pub engine: EngineConfig,

    /// Environment and chat protocol selection
    #[serde(default)]
    pub agent: AgentConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Reward strategies
    #[serde(default)]
    pub reward: RewardConfig,

    /// Chat endpoint for judge-based result rewards
    #[serde(default)]
    pub judge: JudgeConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens_per_step: u32,

    /// HTTP timeout for a single generation request
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8009/v1".into()
}
fn default_model() -> String {
    "qwen3".into()
}
fn default_temperature() -> f32 {
    0.6
}
fn default_max_new_tokens() -> u32 {
    10240
}
fn default_engine_timeout() -> u64 {
    600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_new_tokens_per_step: default_max_new_tokens(),
            timeout_secs: default_engine_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Environment registry name ("function_call", "single_turn")
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Chat protocol registry name ("qwen3_thinking", "qwen3_instruct")
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Overrides the environment's step budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,

    /// Overrides the environment's system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Tool names to expose; unset keeps the environment's default catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,

    /// Drop system messages embedded in a seeded completion transcript
    #[serde(default)]
    pub drop_embedded_system_prompt: bool,
}

fn default_environment() -> String {
    "function_call".into()
}
fn default_protocol() -> String {
    "qwen3_thinking".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            protocol: default_protocol(),
            max_steps: None,
            system_prompt: None,
            tools: None,
            tool_timeout_secs: None,
            drop_embedded_system_prompt: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Retriever endpoint for `local_search`; the tool is unavailable when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_search_url: Option<String>,

    #[serde(default = "default_local_search_timeout")]
    pub local_search_timeout_secs: u64,
}

fn default_local_search_timeout() -> u64 {
    10
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            local_search_url: None,
            local_search_timeout_secs: default_local_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessRewardConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultRewardConfig>,
}

impl RewardConfig {
    pub fn is_empty(&self) -> bool {
        self.process.is_none() && self.result.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRewardConfig {
    #[serde(default = "default_process_reward")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_reward: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reward: Option<f64>,

    #[serde(default = "default_parse_error_penalty")]
    pub parse_error_penalty: f64,

    #[serde(default = "default_penalty_for_refused")]
    pub penalty_for_refused: f64,

    #[serde(default)]
    pub tool_policies: BTreeMap<String, ToolPolicyConfig>,
}

fn default_process_reward() -> String {
    "tool_call".into()
}
fn default_parse_error_penalty() -> f64 {
    -0.2
}
fn default_penalty_for_refused() -> f64 {
    -0.1
}

impl Default for ProcessRewardConfig {
    fn default() -> Self {
        Self {
            name: default_process_reward(),
            min_reward: None,
            max_reward: None,
            parse_error_penalty: default_parse_error_penalty(),
            penalty_for_refused: default_penalty_for_refused(),
            tool_policies: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPolicyConfig {
    #[serde(default = "default_reward_per_call")]
    pub reward_per_call: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_calls: Option<u32>,

    #[serde(default = "default_overuse_penalty")]
    pub overuse_penalty: f64,
}

fn default_reward_per_call() -> f64 {
    0.1
}
fn default_overuse_penalty() -> f64 {
    -0.05
}

impl Default for ToolPolicyConfig {
    fn default() -> Self {
        Self {
            reward_per_call: default_reward_per_call(),
            max_calls: None,
            overuse_penalty: default_overuse_penalty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRewardConfig {
    /// "matching", "math_matching" or "judge"
    #[serde(default = "default_result_reward")]
    pub name: String,

    #[serde(default = "default_correct_score")]
    pub correct_score: f64,

    /// Score for a wrong answer (or a judge reply without a verdict)
    #[serde(default)]
    pub miss_score: f64,

    /// Judge transport failures and missing final answers
    #[serde(default = "default_error_score")]
    pub error_score: f64,

    #[serde(default = "default_final_tool")]
    pub final_tool: String,

    /// Judge prompt with `{question}`, `{label}` and `{response}` slots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_prompt: Option<String>,
}

fn default_result_reward() -> String {
    "matching".into()
}
fn default_correct_score() -> f64 {
    1.0
}
fn default_error_score() -> f64 {
    -0.1
}
fn default_final_tool() -> String {
    "final".into()
}

impl Default for ResultRewardConfig {
    fn default() -> Self {
        Self {
            name: default_result_reward(),
            correct_score: default_correct_score(),
            miss_score: 0.0,
            error_score: default_error_score(),
            final_tool: default_final_tool(),
            judge_prompt: None,
        }
    }
}

/// Judge endpoint. Unset fields fall back to the `[engine]` values.
#[derive(Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_judge_timeout")]
    pub timeout_secs: u64,
}

fn default_judge_timeout() -> u64 {
    60
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: None,
            timeout_secs: default_judge_timeout(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_new_tokens_per_step", &self.max_new_tokens_per_step)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentrl/config.toml).
    ///
    /// Environment variable overrides:
    /// - `AGENTRL_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `OPENAI_BASE_URL`
    /// - `OPENAI_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.engine.api_key.is_none() {
            self.engine.api_key = var("AGENTRL_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            self.engine.base_url = base_url;
        }
        if let Some(model) = var("OPENAI_MODEL") {
            self.engine.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentrl")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.engine.temperature) {
            return Err(ConfigError::ValidationError(
                "engine.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.engine.max_new_tokens_per_step == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_new_tokens_per_step must be > 0".into(),
            ));
        }

        if self.agent.max_steps == Some(0) {
            return Err(ConfigError::ValidationError("agent.max_steps must be > 0".into()));
        }

        Ok(())
    }

    /// Judge endpoint with `[engine]` fallbacks applied: (base_url, api_key, model).
    pub fn judge_endpoint(&self) -> (String, Option<String>, String) {
        (
            self.judge.base_url.clone().unwrap_or_else(|| self.engine.base_url.clone()),
            self.judge.api_key.clone().or_else(|| self.engine.api_key.clone()),
            self.judge.model.clone().unwrap_or_else(|| self.engine.model.clone()),
        )
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
