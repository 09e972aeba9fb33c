//! Subcommand implementations.

pub mod doctor;
pub mod onboard;
pub mod parse;
pub mod render;
pub mod run;

use std::time::Duration;

use agentrl_config::AppConfig;
use agentrl_providers::OpenAiCompatEngine;

/// Load the config, turning failures into a readable message.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The rollout backend described by `[engine]`.
pub fn build_engine(config: &AppConfig) -> Result<OpenAiCompatEngine, Box<dyn std::error::Error>> {
    let engine = &config.engine;
    let mut backend = OpenAiCompatEngine::new(
        &engine.base_url,
        &engine.model,
        Duration::from_secs(engine.timeout_secs),
    )?;
    if let Some(key) = &engine.api_key {
        backend = backend.with_api_key(key);
    }
    Ok(backend)
}

/// The judge backend described by `[judge]`, falling back to `[engine]`.
pub fn build_judge(config: &AppConfig) -> Result<OpenAiCompatEngine, Box<dyn std::error::Error>> {
    let (base_url, api_key, model) = config.judge_endpoint();
    let mut judge = OpenAiCompatEngine::new(base_url, model, Duration::from_secs(config.judge.timeout_secs))?
        .with_name("judge");
    if let Some(key) = api_key {
        judge = judge.with_api_key(key);
    }
    Ok(judge)
}
