//! The general-purpose tool-calling environment.
//!
//! Decision table for one action:
//!
//! | action                         | observations                 | terminates |
//! |--------------------------------|------------------------------|------------|
//! | top-level refusal              | `parse_error` diagnostic     | no         |
//! | no calls, non-empty content    | none                         | yes        |
//! | no calls, empty content        | `empty_final` diagnostic     | no         |
//! | one or more calls              | one entry per call, in order | no         |
//!
//! The `max_steps` fence overrides the last column.

use std::sync::Arc;
use std::time::{Duration, Instant};

use agentrl_core::{
    Action, DomainEvent, EventBus, Result, Tool, ToolCall, ToolCatalog, ToolError,
};
use agentrl_tools::CommentaryTool;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::{Environment, StepCounter, StepOutcome};

const SYSTEM_PROMPT_TEMPLATE: &str = "You are a helpful agent assistant.\n\n\
Keep the user informed as you work: give friendly, action-focused updates about what you're doing right now.\n\n\
Knowledge cutoff: 2023-06\n\
Current date: {date}\n\n";

const DEFAULT_MAX_STEPS: u32 = 64;

/// Tool-calling environment; plain text without calls ends the trajectory.
pub struct FunctionCallEnvironment {
    catalog: ToolCatalog,
    system_prompt: String,
    counter: StepCounter,
    tool_timeout: Option<Duration>,
    event_bus: Option<Arc<EventBus>>,
}

impl FunctionCallEnvironment {
    /// Environment with the `commentary` tool and today's date in the prompt.
    pub fn new() -> Self {
        let catalog = ToolCatalog::from_tools([Arc::new(CommentaryTool) as Arc<dyn Tool>])
            .unwrap_or_default();
        Self {
            catalog,
            system_prompt: Self::default_system_prompt(),
            counter: StepCounter::new(DEFAULT_MAX_STEPS),
            tool_timeout: None,
            event_bus: None,
        }
    }

    /// The default prompt with the current date interpolated.
    pub fn default_system_prompt() -> String {
        SYSTEM_PROMPT_TEMPLATE.replace("{date}", &Utc::now().format("%Y-%m-%d").to_string())
    }

    /// Replace the tool catalog.
    pub fn with_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Override the system prompt. An empty prompt keeps the default.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.is_empty() {
            self.system_prompt = prompt;
        }
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.counter.set_max_steps(max_steps);
        self
    }

    /// Bound every tool invocation; elapsed calls report `tool_runtime_error`.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Add a tool after construction. Duplicate names are rejected.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        self.catalog.register(tool)
    }

    fn diagnostic(&self, code: DiagnosticCode, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(code, message, self.catalog.names())
    }

    fn emit(&self, diagnostic: Diagnostic) -> String {
        debug!(code = %diagnostic.code(), "Emitting internal diagnostic");
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::DiagnosticEmitted {
                code: diagnostic.code().to_string(),
                timestamp: Utc::now(),
            });
        }
        diagnostic.to_json()
    }

    async fn run_tool_calls(&self, calls: &[ToolCall]) -> Vec<String> {
        // Calls run concurrently; join_all keeps results in call order.
        join_all(
            calls
                .iter()
                .enumerate()
                .map(|(index, call)| self.handle_call(call, index)),
        )
        .await
    }

    async fn handle_call(&self, call: &ToolCall, index: usize) -> String {
        if let Some(refusal) = &call.refusal {
            return self.emit(
                self.diagnostic(DiagnosticCode::ToolCallError, refusal.clone())
                    .with_hint("Fix the tool call JSON payload or share a commentary(status=...) call before retrying.")
                    .with_call(&call.call_id, index),
            );
        }

        let name = call.trimmed_name();
        if name.is_empty() {
            return self.emit(
                self.diagnostic(DiagnosticCode::MissingToolName, "Tool name is required.")
                    .with_hint("Provide a function name inside the tool call payload.")
                    .with_call(&call.call_id, index),
            );
        }

        let Some(tool) = self.catalog.get(name) else {
            return self.emit(
                self.diagnostic(DiagnosticCode::InvalidTool, format!("Tool '{name}' is not available."))
                    .with_hint("Choose one of the allowed tools.")
                    .with_call(&call.call_id, index),
            );
        };

        let arguments = call.arguments.clone().unwrap_or_default();
        let missing: Vec<String> = tool
            .required_arguments()
            .into_iter()
            .filter(|key| !arguments.contains_key(key))
            .collect();
        if !missing.is_empty() {
            return self.emit(
                self.diagnostic(
                    DiagnosticCode::InvalidArguments,
                    format!("Missing required arguments: {}.", missing.join(", ")),
                )
                .with_tool(name)
                .with_hint("Use key/value pairs when building tool arguments.")
                .with_call(&call.call_id, index)
                .with_arguments(Value::Object(arguments)),
            );
        }

        let start = Instant::now();
        let result = match self.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, tool.invoke(&arguments))
                .await
                .unwrap_or_else(|_| {
                    Err(ToolError::Timeout {
                        tool_name: name.to_string(),
                        timeout_secs: limit.as_secs(),
                    })
                }),
            None => tool.invoke(&arguments).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolInvoked {
                tool_name: name.to_string(),
                success: result.is_ok(),
                duration_ms,
                timestamp: Utc::now(),
            });
        }

        match result {
            Ok(output) => {
                debug!(tool = name, duration_ms, "Tool call completed");
                output
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool execution failed");
                self.emit(
                    self.diagnostic(
                        DiagnosticCode::ToolRuntimeError,
                        format!("Tool '{name}' raised an exception."),
                    )
                    .with_tool(name)
                    .with_hint("Revise the arguments or share a commentary(status=...) plan check before retrying.")
                    .with_call(&call.call_id, index)
                    .with_exception(e.to_string()),
                )
            }
        }
    }
}

impl Default for FunctionCallEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Environment for FunctionCallEnvironment {
    fn name(&self) -> &str {
        "function_call"
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn tools(&self) -> &ToolCatalog {
        &self.catalog
    }

    fn counter(&self) -> &StepCounter {
        &self.counter
    }

    fn counter_mut(&mut self) -> &mut StepCounter {
        &mut self.counter
    }

    async fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        self.counter.ensure_active()?;

        let mut observations = Vec::new();
        let mut terminated = false;

        if let Some(refusal) = &action.refusal {
            // A top-level refusal preempts every call in the action.
            observations.push(
                self.emit(
                    self.diagnostic(DiagnosticCode::ParseError, refusal.clone())
                        .with_hint("Wrap tool calls in <tool_call> tags or reply with plain text only."),
                ),
            );
        } else if action.tool_calls.is_empty() {
            if action.trimmed_content().is_empty() {
                observations.push(
                    self.emit(
                        self.diagnostic(
                            DiagnosticCode::EmptyFinal,
                            "Final response cannot be empty when no tool calls are provided.",
                        )
                        .with_hint("Share a quick commentary(status=...) call or reply with plain text to finish."),
                    ),
                );
            } else {
                terminated = true;
            }
        } else {
            debug!(tool_count = action.tool_calls.len(), "Executing tool calls");
            observations = self.run_tool_calls(&action.tool_calls).await;
        }

        let done = self.counter.finish(terminated);
        debug!(
            step = self.counter.step_index(),
            observations = observations.len(),
            done,
            "Environment step"
        );
        Ok(StepOutcome {
            observations,
            terminated: done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrl_core::Error;
    use serde_json::{Map, json};

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    /// Sleeps, then echoes its fixed output.
    struct SlowTool {
        name: &'static str,
        delay: Duration,
        output: &'static str,
    }

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str { self.name }
        fn description(&self) -> &str { "sleeps then answers" }
        fn parameters_schema(&self) -> Value { json!({"type": "object", "properties": {}}) }
        async fn invoke(&self, _arguments: &Map<String, Value>) -> std::result::Result<String, ToolError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.output.to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str { "explode" }
        fn description(&self) -> &str { "always fails" }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"q": {"type": "string"}}, "required": ["q"]})
        }
        async fn invoke(&self, _arguments: &Map<String, Value>) -> std::result::Result<String, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "explode".into(),
                reason: "kaboom".into(),
            })
        }
    }

    fn slow(name: &'static str, millis: u64, output: &'static str) -> Arc<dyn Tool> {
        Arc::new(SlowTool { name, delay: Duration::from_millis(millis), output })
    }

    fn env_with(tools: Vec<Arc<dyn Tool>>) -> FunctionCallEnvironment {
        let mut env = FunctionCallEnvironment::new()
            .with_catalog(ToolCatalog::from_tools(tools).unwrap())
            .with_system_prompt("test");
        env.reset_step();
        env
    }

    fn code_of(observation: &str) -> String {
        let value: Value = serde_json::from_str(observation).unwrap();
        value["error"]["code"].as_str().unwrap().to_string()
    }

    #[test]
    fn defaults() {
        let env = FunctionCallEnvironment::new();
        assert_eq!(env.max_steps(), 64);
        assert_eq!(env.tool_names(), vec!["commentary"]);
        assert!(env.system_prompt().starts_with("You are a helpful agent assistant.\n\n"));
        assert!(env.system_prompt().contains("Current date: 20"));
        assert!(env.system_prompt().ends_with("\n\n"));
    }

    #[test]
    fn empty_system_prompt_keeps_default() {
        let env = FunctionCallEnvironment::new().with_system_prompt("");
        assert!(env.system_prompt().starts_with("You are a helpful agent assistant.\n\n"));
        assert!(env.system_prompt().contains("Current date: 20"));

        let env = FunctionCallEnvironment::new().with_system_prompt("Be brief.");
        assert_eq!(env.system_prompt(), "Be brief.");
    }

    #[tokio::test]
    async fn stepping_before_reset_is_invalid() {
        let mut env = FunctionCallEnvironment::new();
        let err = env.step(&Action::text("hi")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn plain_text_terminates() {
        let mut env = env_with(vec![]);
        let outcome = env.step(&Action::text("The answer is 4.")).await.unwrap();
        assert!(outcome.terminated);
        assert!(outcome.observations.is_empty());
    }

    #[tokio::test]
    async fn empty_final_is_rejected() {
        let mut env = env_with(vec![]);
        let outcome = env.step(&Action::text("   ")).await.unwrap();
        assert!(!outcome.terminated);
        assert_eq!(outcome.observations.len(), 1);
        assert_eq!(code_of(&outcome.observations[0]), "empty_final");
    }

    #[tokio::test]
    async fn refusal_preempts_calls() {
        let mut env = env_with(vec![slow("a", 0, "A")]);
        let mut action = Action::calls(vec![ToolCall::new("call_1", "a", Map::new())]);
        action.refusal = Some("unparseable".into());
        let outcome = env.step(&action).await.unwrap();
        assert!(!outcome.terminated);
        assert_eq!(outcome.observations.len(), 1);
        assert_eq!(code_of(&outcome.observations[0]), "parse_error");
    }

    #[tokio::test(start_paused = true)]
    async fn observations_follow_call_order() {
        let mut env = env_with(vec![
            slow("first", 10, "one"),
            slow("second", 500, "two"),
            slow("third", 0, "three"),
        ]);
        let action = Action::calls(vec![
            ToolCall::new("call_1", "first", Map::new()),
            ToolCall::new("call_2", "second", Map::new()),
            ToolCall::new("call_3", "third", Map::new()),
        ]);
        let outcome = env.step(&action).await.unwrap();
        assert_eq!(outcome.observations, vec!["one", "two", "three"]);
        assert!(!outcome.terminated);
    }

    #[tokio::test]
    async fn per_call_failures_stay_independent() {
        let mut env = env_with(vec![slow("ok", 0, "fine"), Arc::new(FailingTool)]);
        let action = Action::calls(vec![
            ToolCall::refused("call_1", "error parse json: bad"),
            ToolCall::new("call_2", "  ", Map::new()),
            ToolCall::new("call_3", "missing", Map::new()),
            ToolCall::new("call_4", "explode", Map::new()),
            ToolCall::new("call_5", "explode", args(json!({"q": "x"}))),
            ToolCall::new("call_6", "ok", Map::new()),
        ]);
        let outcome = env.step(&action).await.unwrap();
        let codes: Vec<String> = outcome.observations[..5].iter().map(|o| code_of(o)).collect();
        assert_eq!(
            codes,
            vec![
                "tool_call_error",
                "missing_tool_name",
                "invalid_tool",
                "invalid_arguments",
                "tool_runtime_error",
            ]
        );
        assert_eq!(outcome.observations[5], "fine");

        let runtime: Value = serde_json::from_str(&outcome.observations[4]).unwrap();
        assert_eq!(runtime["tool_call_id"], "call_5");
        assert_eq!(runtime["action_index"], 4);
        assert!(runtime["exception"].as_str().unwrap().contains("kaboom"));
        assert_eq!(runtime["allowed_tools"], json!(["ok", "explode"]));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_runtime_error() {
        let mut env = env_with(vec![slow("sleepy", 60_000, "late")])
            .with_tool_timeout(Duration::from_secs(1));
        let action = Action::calls(vec![ToolCall::new("call_1", "sleepy", Map::new())]);
        let outcome = env.step(&action).await.unwrap();
        assert_eq!(code_of(&outcome.observations[0]), "tool_runtime_error");
        assert!(!outcome.terminated);
    }

    #[tokio::test]
    async fn max_steps_fence_terminates() {
        let mut env = env_with(vec![slow("ping", 0, "pong")]).with_max_steps(3);
        let action = Action::calls(vec![ToolCall::new("call_1", "ping", Map::new())]);
        assert!(!env.step(&action).await.unwrap().terminated);
        assert!(!env.step(&action).await.unwrap().terminated);
        let third = env.step(&action).await.unwrap();
        assert!(third.terminated);
        assert_eq!(third.observations, vec!["pong"]);
        assert!(env.step(&action).await.is_err());
    }

    #[tokio::test]
    async fn events_are_published() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let mut env = env_with(vec![slow("ping", 0, "pong")]).with_event_bus(bus.clone());
        let action = Action::calls(vec![
            ToolCall::new("call_1", "ping", Map::new()),
            ToolCall::new("call_2", "nope", Map::new()),
        ]);
        env.step(&action).await.unwrap();

        let mut tool_events = 0;
        let mut diagnostics = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event.as_ref() {
                DomainEvent::ToolInvoked { tool_name, success, .. } => {
                    assert_eq!(tool_name, "ping");
                    assert!(success);
                    tool_events += 1;
                }
                DomainEvent::DiagnosticEmitted { code, .. } => diagnostics.push(code.clone()),
                _ => {}
            }
        }
        assert_eq!(tool_events, 1);
        assert_eq!(diagnostics, vec!["invalid_tool"]);
    }

    #[test]
    fn register_tool_rejects_duplicates() {
        let mut env = FunctionCallEnvironment::new();
        assert!(env.register_tool(Arc::new(CommentaryTool)).is_err());
        assert!(env.register_tool(slow("extra", 0, "")).is_ok());
        assert_eq!(env.tool_names(), vec!["commentary", "extra"]);
    }
}
