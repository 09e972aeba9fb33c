//! Name → constructor registries and the assembly functions built on them.
//!
//! A [`Registry`] is built once at startup (usually [`Registry::builtin`])
//! and never mutated afterwards. Custom components are added with the
//! `with_*` builders before the registry is put to use.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use agentrl_config::{AppConfig, ProcessRewardConfig, ResultRewardConfig};
use agentrl_core::{ChatCompleter, Error, EventBus, LlmEngine, Result, Tool, ToolCatalog};
use agentrl_env::{Environment, FunctionCallEnvironment, SingleTurnEnvironment};
use agentrl_protocol::{ChatProtocol, Qwen3InstructProtocol, Qwen3ThinkingProtocol};
use agentrl_rewards::{
    JudgeReward, MatchingReward, MathMatchingReward, ProcessRewardStrategy, ResultRewardStrategy,
    RewardPipeline, ToolCallReward, ToolPolicy,
};
use agentrl_tools::{CommentaryTool, FinalTool, LocalSearchTool, ThinkTool, ToolSettings};
use tracing::{debug, warn};

use crate::runtime::{AgentRuntime, RuntimeSettings};
use crate::session::{AgentSession, SystemPromptSeeding};

/// Everything an environment constructor may use.
#[derive(Default)]
pub struct EnvironmentSpec {
    pub system_prompt: Option<String>,
    pub max_steps: Option<u32>,
    /// Replaces the environment's default catalog when set
    pub catalog: Option<ToolCatalog>,
    pub tool_timeout: Option<Duration>,
    pub event_bus: Option<Arc<EventBus>>,
}

pub type EnvironmentCtor = Box<dyn Fn(EnvironmentSpec) -> Box<dyn Environment> + Send + Sync>;
pub type ProtocolCtor = Box<dyn Fn() -> Arc<dyn ChatProtocol> + Send + Sync>;
pub type ProcessRewardCtor =
    Box<dyn Fn(&ProcessRewardConfig) -> Result<Arc<dyn ProcessRewardStrategy>> + Send + Sync>;
pub type ResultRewardCtor = Box<
    dyn Fn(&ResultRewardConfig, Option<Arc<dyn ChatCompleter>>, Duration) -> Result<Arc<dyn ResultRewardStrategy>>
        + Send
        + Sync,
>;
pub type ToolCtor = Box<dyn Fn(&ToolSettings) -> Result<Arc<dyn Tool>> + Send + Sync>;

/// Lookup tables for every pluggable component.
#[derive(Default)]
pub struct Registry {
    environments: BTreeMap<String, EnvironmentCtor>,
    protocols: BTreeMap<String, ProtocolCtor>,
    process_rewards: BTreeMap<String, ProcessRewardCtor>,
    result_rewards: BTreeMap<String, ResultRewardCtor>,
    tools: BTreeMap<String, ToolCtor>,
    event_bus: Option<Arc<EventBus>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in component.
    pub fn builtin() -> Self {
        Self::new()
            .with_environment("single_turn", |spec| Box::new(single_turn(spec)))
            .with_environment("function_call", |spec| Box::new(function_call(spec)))
            .with_protocol("qwen3_thinking", || Arc::new(Qwen3ThinkingProtocol))
            .with_protocol("qwen3_instruct", || Arc::new(Qwen3InstructProtocol))
            .with_process_reward("tool_call", |config| Ok(Arc::new(tool_call_reward(config))))
            .with_result_reward("matching", |config, _, _| {
                Ok(Arc::new(
                    MatchingReward::default()
                        .with_scores(config.correct_score, config.miss_score)
                        .with_final_tool(&config.final_tool),
                ))
            })
            .with_result_reward("math_matching", |config, _, _| {
                Ok(Arc::new(
                    MathMatchingReward::default()
                        .with_scores(config.correct_score, config.miss_score)
                        .with_final_tool(&config.final_tool),
                ))
            })
            .with_result_reward("judge", judge_reward)
            .with_tool("commentary", |_| Ok(Arc::new(CommentaryTool)))
            .with_tool("final", |_| Ok(Arc::new(FinalTool)))
            .with_tool("think", |_| Ok(Arc::new(ThinkTool)))
            .with_tool("local_search", |settings| {
                let url = settings
                    .local_search_url
                    .as_deref()
                    .ok_or_else(|| Error::config("local_search requires tools.local_search_url"))?;
                Ok(Arc::new(LocalSearchTool::new(url, settings.local_search_timeout)?))
            })
    }

    pub fn with_environment(
        mut self,
        name: &str,
        ctor: impl Fn(EnvironmentSpec) -> Box<dyn Environment> + Send + Sync + 'static,
    ) -> Self {
        self.environments.insert(name.to_lowercase(), Box::new(ctor));
        self
    }

    pub fn with_protocol(
        mut self,
        name: &str,
        ctor: impl Fn() -> Arc<dyn ChatProtocol> + Send + Sync + 'static,
    ) -> Self {
        self.protocols.insert(name.to_lowercase(), Box::new(ctor));
        self
    }

    pub fn with_process_reward(
        mut self,
        name: &str,
        ctor: impl Fn(&ProcessRewardConfig) -> Result<Arc<dyn ProcessRewardStrategy>> + Send + Sync + 'static,
    ) -> Self {
        self.process_rewards.insert(name.to_lowercase(), Box::new(ctor));
        self
    }

    pub fn with_result_reward(
        mut self,
        name: &str,
        ctor: impl Fn(&ResultRewardConfig, Option<Arc<dyn ChatCompleter>>, Duration) -> Result<Arc<dyn ResultRewardStrategy>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.result_rewards.insert(name.to_lowercase(), Box::new(ctor));
        self
    }

    pub fn with_tool(
        mut self,
        name: &str,
        ctor: impl Fn(&ToolSettings) -> Result<Arc<dyn Tool>> + Send + Sync + 'static,
    ) -> Self {
        self.tools.insert(name.to_lowercase(), Box::new(ctor));
        self
    }

    /// Publish session and environment events on `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn environment_names(&self) -> Vec<&str> {
        self.environments.keys().map(String::as_str).collect()
    }

    pub fn protocol_names(&self) -> Vec<&str> {
        self.protocols.keys().map(String::as_str).collect()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn reward_names(&self) -> (Vec<&str>, Vec<&str>) {
        (
            self.process_rewards.keys().map(String::as_str).collect(),
            self.result_rewards.keys().map(String::as_str).collect(),
        )
    }

    pub fn environment(&self, name: &str, spec: EnvironmentSpec) -> Result<Box<dyn Environment>> {
        let ctor = lookup(&self.environments, "environment", name)?;
        Ok(ctor(spec))
    }

    pub fn protocol(&self, name: &str) -> Result<Arc<dyn ChatProtocol>> {
        let ctor = lookup(&self.protocols, "chat protocol", name)?;
        Ok(ctor())
    }

    pub fn tool(&self, name: &str, settings: &ToolSettings) -> Result<Arc<dyn Tool>> {
        let ctor = lookup(&self.tools, "tool", name)?;
        ctor(settings)
    }

    /// A catalog with the named tools, in the given order.
    pub fn catalog(&self, names: &[String], settings: &ToolSettings) -> Result<ToolCatalog> {
        let tools = names
            .iter()
            .map(|name| self.tool(name, settings))
            .collect::<Result<Vec<_>>>()?;
        ToolCatalog::from_tools(tools)
    }

    /// The reward pipeline described by `config`, or `None` when no
    /// strategy is configured.
    pub fn reward_pipeline(
        &self,
        config: &AppConfig,
        judge: Option<Arc<dyn ChatCompleter>>,
    ) -> Result<Option<RewardPipeline>> {
        if config.reward.is_empty() {
            return Ok(None);
        }

        let process = match &config.reward.process {
            Some(process) => {
                let ctor = lookup(&self.process_rewards, "process reward", &process.name)?;
                Some(ctor(process)?)
            }
            None => None,
        };
        let result = match &config.reward.result {
            Some(result) => {
                let ctor = lookup(&self.result_rewards, "result reward", &result.name)?;
                Some(ctor(result, judge, Duration::from_secs(config.judge.timeout_secs))?)
            }
            None => None,
        };

        RewardPipeline::new(process, result).map(Some)
    }

    /// A session configured from `config`, with a reward pipeline when the
    /// config names one.
    pub fn build_session(&self, config: &AppConfig, judge: Option<Arc<dyn ChatCompleter>>) -> Result<AgentSession> {
        let mut session = self.build_plain_session(config)?;
        if let Some(pipeline) = self.reward_pipeline(config, judge)? {
            session = session.with_reward_pipeline(Arc::new(pipeline));
        }
        Ok(session)
    }

    /// An interactive runtime over `engine`. Rewards are not computed.
    pub fn build_runtime(&self, config: &AppConfig, engine: Arc<dyn LlmEngine>) -> Result<AgentRuntime> {
        let settings = RuntimeSettings {
            max_new_tokens_per_step: config.engine.max_new_tokens_per_step,
            temperature: config.engine.temperature,
        };
        Ok(AgentRuntime::new(engine, self.build_plain_session(config)?).with_settings(settings))
    }

    /// A session without a reward pipeline (interactive use, rendering).
    pub fn build_plain_session(&self, config: &AppConfig) -> Result<AgentSession> {
        let agent = &config.agent;
        let settings = tool_settings(config);

        let catalog = match &agent.tools {
            Some(names) => Some(self.catalog(names, &settings)?),
            None => None,
        };
        let spec = EnvironmentSpec {
            system_prompt: agent.system_prompt.clone(),
            max_steps: agent.max_steps,
            catalog,
            tool_timeout: agent.tool_timeout_secs.map(Duration::from_secs),
            event_bus: self.event_bus.clone(),
        };

        let environment = self.environment(&agent.environment, spec)?;
        let protocol = self.protocol(&agent.protocol)?;
        debug!(
            environment = environment.name(),
            protocol = protocol.name(),
            tools = ?environment.tool_names(),
            "Assembled session"
        );

        let seeding = if agent.drop_embedded_system_prompt {
            SystemPromptSeeding::DropEmbedded
        } else {
            SystemPromptSeeding::KeepEmbedded
        };

        let mut session = AgentSession::new(environment, protocol).with_seeding(seeding);
        if let Some(bus) = &self.event_bus {
            session = session.with_event_bus(bus.clone());
        }
        Ok(session)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (process, result) = self.reward_names();
        f.debug_struct("Registry")
            .field("environments", &self.environment_names())
            .field("protocols", &self.protocol_names())
            .field("process_rewards", &process)
            .field("result_rewards", &result)
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// [`Registry::build_session`] over the built-in registry.
pub fn build_session(config: &AppConfig, judge: Option<Arc<dyn ChatCompleter>>) -> Result<AgentSession> {
    Registry::builtin().build_session(config, judge)
}

/// [`Registry::build_runtime`] over the built-in registry.
pub fn build_runtime(config: &AppConfig, engine: Arc<dyn LlmEngine>) -> Result<AgentRuntime> {
    Registry::builtin().build_runtime(config, engine)
}

pub fn tool_settings(config: &AppConfig) -> ToolSettings {
    ToolSettings {
        local_search_url: config.tools.local_search_url.clone(),
        local_search_timeout: Duration::from_secs(config.tools.local_search_timeout_secs),
    }
}

fn lookup<'a, T>(table: &'a BTreeMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    table.get(&name.to_lowercase()).ok_or_else(|| {
        let known: Vec<&str> = table.keys().map(String::as_str).collect();
        Error::config(format!("Unknown {kind} '{name}' (known: {}).", known.join(", ")))
    })
}

fn single_turn(spec: EnvironmentSpec) -> SingleTurnEnvironment {
    if spec.catalog.as_ref().is_some_and(|c| !c.is_empty()) {
        warn!("single_turn environment ignores configured tools");
    }
    let mut env = SingleTurnEnvironment::new();
    if let Some(prompt) = spec.system_prompt {
        env = env.with_system_prompt(prompt);
    }
    if let Some(max_steps) = spec.max_steps {
        env.counter_mut().set_max_steps(max_steps);
    }
    env
}

fn function_call(spec: EnvironmentSpec) -> FunctionCallEnvironment {
    let mut env = FunctionCallEnvironment::new();
    if let Some(catalog) = spec.catalog {
        env = env.with_catalog(catalog);
    }
    if let Some(prompt) = spec.system_prompt {
        env = env.with_system_prompt(prompt);
    }
    if let Some(max_steps) = spec.max_steps {
        env = env.with_max_steps(max_steps);
    }
    if let Some(timeout) = spec.tool_timeout {
        env = env.with_tool_timeout(timeout);
    }
    if let Some(bus) = spec.event_bus {
        env = env.with_event_bus(bus);
    }
    env
}

fn tool_call_reward(config: &ProcessRewardConfig) -> ToolCallReward {
    config.tool_policies.iter().fold(
        ToolCallReward::default()
            .with_bounds(config.min_reward, config.max_reward)
            .with_penalties(config.parse_error_penalty, config.penalty_for_refused),
        |reward, (tool, policy)| {
            reward.with_policy(
                tool,
                ToolPolicy {
                    reward_per_call: policy.reward_per_call,
                    max_calls: policy.max_calls,
                    overuse_penalty: policy.overuse_penalty,
                },
            )
        },
    )
}

fn judge_reward(
    config: &ResultRewardConfig,
    judge: Option<Arc<dyn ChatCompleter>>,
    timeout: Duration,
) -> Result<Arc<dyn ResultRewardStrategy>> {
    let judge = judge.ok_or_else(|| Error::config("result reward 'judge' requires a judge endpoint"))?;
    let mut reward = JudgeReward::new(judge)
        .with_scores(config.correct_score, config.miss_score, config.error_score)
        .with_timeout(Some(timeout))
        .with_final_tool(&config.final_tool);
    if let Some(template) = &config.judge_prompt {
        reward = reward.with_prompt_template(template);
    }
    Ok(Arc::new(reward))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrl_config::{ResultRewardConfig, ToolPolicyConfig};
    use agentrl_core::{EngineError, Message};
    use async_trait::async_trait;
    use serde_json::json;

    struct AlwaysYes;

    #[async_trait]
    impl ChatCompleter for AlwaysYes {
        fn name(&self) -> &str {
            "always_yes"
        }

        async fn complete(&self, _prompt: &str) -> std::result::Result<String, EngineError> {
            Ok("[[Yes]]".into())
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.agent.system_prompt = Some("sys".into());
        config
    }

    #[test]
    fn builtin_names() {
        let registry = Registry::builtin();
        assert_eq!(registry.environment_names(), vec!["function_call", "single_turn"]);
        assert_eq!(registry.protocol_names(), vec!["qwen3_instruct", "qwen3_thinking"]);
        assert_eq!(registry.tool_names(), vec!["commentary", "final", "local_search", "think"]);
        let (process, result) = registry.reward_names();
        assert_eq!(process, vec!["tool_call"]);
        assert_eq!(result, vec!["judge", "matching", "math_matching"]);
    }

    #[test]
    fn unknown_names_are_config_errors() {
        let registry = Registry::builtin();
        let err = registry.protocol("llama").err().unwrap();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("qwen3_thinking"));

        let mut config = config();
        config.agent.environment = "sandbox".into();
        assert!(matches!(build_session(&config, None), Err(Error::Config { .. })));
    }

    #[test]
    fn names_are_case_insensitive() {
        let registry = Registry::builtin();
        assert_eq!(registry.protocol("Qwen3_Thinking").unwrap().name(), "qwen3_thinking");
    }

    #[test]
    fn local_search_needs_url() {
        let registry = Registry::builtin();
        assert!(registry.tool("local_search", &ToolSettings::default()).is_err());
        let settings = ToolSettings {
            local_search_url: Some("http://127.0.0.1:8000/retrieve".into()),
            ..ToolSettings::default()
        };
        assert_eq!(registry.tool("local_search", &settings).unwrap().name(), "local_search");
    }

    #[test]
    fn duplicate_tools_fail_fast() {
        let mut config = config();
        config.agent.tools = Some(vec!["final".into(), "final".into()]);
        assert!(matches!(build_session(&config, None), Err(Error::Config { .. })));
    }

    #[test]
    fn session_uses_configured_tools_and_budget() {
        let mut config = config();
        config.agent.tools = Some(vec!["final".into(), "think".into()]);
        config.agent.max_steps = Some(5);
        let session = build_session(&config, None).unwrap();
        assert_eq!(session.environment().name(), "function_call");
        assert_eq!(session.environment().tool_names(), vec!["final", "think"]);
        assert_eq!(session.environment().max_steps(), 5);
        assert_eq!(session.environment().system_prompt(), "sys");
        assert_eq!(session.protocol().name(), "qwen3_thinking");
    }

    #[test]
    fn single_turn_budget_override() {
        let mut config = config();
        config.agent.environment = "single_turn".into();
        config.agent.max_steps = Some(2);
        let session = build_session(&config, None).unwrap();
        assert_eq!(session.environment().max_steps(), 2);
        assert!(session.environment().tool_names().is_empty());
    }

    #[test]
    fn judge_reward_requires_endpoint() {
        let mut config = config();
        config.reward.result = Some(ResultRewardConfig {
            name: "judge".into(),
            ..ResultRewardConfig::default()
        });
        assert!(matches!(build_session(&config, None), Err(Error::Config { .. })));
        assert!(build_session(&config, Some(Arc::new(AlwaysYes))).is_ok());
    }

    #[tokio::test]
    async fn configured_pipeline_scores_terminal_step() {
        let mut config = config();
        config.agent.tools = Some(vec!["commentary".into(), "final".into()]);
        let mut process = ProcessRewardConfig::default();
        process.tool_policies.insert("commentary".into(), ToolPolicyConfig::default());
        config.reward.process = Some(process);
        config.reward.result = Some(ResultRewardConfig::default());

        let mut session = build_session(&config, None).unwrap();
        session.initialize(vec![Message::user("2 + 2?")]);

        let call = "<tool_call>\n{\"name\": \"commentary\", \"arguments\": {\"message\": \"m\"}}\n</tool_call>";
        let text = format!("{call}\n{call}");
        let label = json!("4");
        let first = session.step_from_text(&text, Some(&label)).await.unwrap();
        assert!(!first.observation.done);
        assert!((first.reward.unwrap() - 0.2).abs() < 1e-9);

        let last = session.step_from_text("4", Some(&label)).await.unwrap();
        assert!(last.observation.done);
        assert!((last.reward.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_reward_sections_means_no_pipeline() {
        let registry = Registry::builtin();
        assert!(registry.reward_pipeline(&config(), None).unwrap().is_none());
    }
}
