//! Environments: apply a parsed [`Action`] to a tool catalog and decide
//! whether the trajectory is over.
//!
//! Every environment owns a [`StepCounter`]. The counter starts `Idle`,
//! becomes `Active` on [`Environment::reset_step`] and ends `Terminated`
//! when the environment says so or the `max_steps` fence is reached.
//! Stepping a non-active environment is an [`Error::InvalidState`].
//!
//! Recoverable problems (malformed calls, unknown tools, failing tools)
//! are reported to the model as internal [`Diagnostic`] observations,
//! never as errors.

pub mod diagnostic;
pub mod function_call;
pub mod single_turn;

pub use diagnostic::{Diagnostic, DiagnosticCode, is_internal};
pub use function_call::FunctionCallEnvironment;
pub use single_turn::SingleTurnEnvironment;

use agentrl_core::{Action, Error, Result, ToolCatalog, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Lifecycle of one trajectory inside an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvState {
    Idle,
    Active,
    Terminated,
}

impl std::fmt::Display for EnvState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EnvState::Idle => "idle",
            EnvState::Active => "active",
            EnvState::Terminated => "terminated",
        })
    }
}

/// Step index, budget and lifecycle state for one trajectory.
#[derive(Debug, Clone)]
pub struct StepCounter {
    step_index: u32,
    max_steps: u32,
    state: EnvState,
}

impl StepCounter {
    pub fn new(max_steps: u32) -> Self {
        Self {
            step_index: 0,
            max_steps,
            state: EnvState::Idle,
        }
    }

    /// Start a fresh trajectory.
    pub fn reset(&mut self) {
        self.step_index = 0;
        self.state = EnvState::Active;
    }

    pub fn ensure_active(&self) -> Result<()> {
        match self.state {
            EnvState::Active => Ok(()),
            other => Err(Error::InvalidState(format!(
                "cannot step an environment in the {other} state; call reset_step first"
            ))),
        }
    }

    /// Count the step just taken. Returns whether the trajectory is over,
    /// forcing termination once `max_steps` is reached.
    pub fn finish(&mut self, terminated: bool) -> bool {
        self.step_index += 1;
        let done = terminated || self.step_index >= self.max_steps;
        if done {
            self.state = EnvState::Terminated;
        }
        done
    }

    pub fn step_index(&self) -> u32 {
        self.step_index
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn set_max_steps(&mut self, max_steps: u32) {
        self.max_steps = max_steps;
    }

    pub fn state(&self) -> EnvState {
        self.state
    }
}

/// Result of one environment transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Tool outputs and diagnostics, in call order
    pub observations: Vec<String>,

    /// Whether the trajectory is over
    pub terminated: bool,
}

/// A tool-bearing environment driven one action at a time.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Registry name (e.g., "function_call").
    fn name(&self) -> &str;

    fn system_prompt(&self) -> &str;

    fn tools(&self) -> &ToolCatalog;

    fn counter(&self) -> &StepCounter;

    fn counter_mut(&mut self) -> &mut StepCounter;

    /// Apply one action. Fails only when the environment is not active.
    async fn step(&mut self, action: &Action) -> Result<StepOutcome>;

    fn tool_names(&self) -> Vec<String> {
        self.tools().names()
    }

    /// Tool definitions rendered into the prompt, in registration order.
    fn tools_manifest(&self) -> Vec<ToolDefinition> {
        self.tools().definitions()
    }

    fn max_steps(&self) -> u32 {
        self.counter().max_steps()
    }

    fn step_index(&self) -> u32 {
        self.counter().step_index()
    }

    fn state(&self) -> EnvState {
        self.counter().state()
    }

    fn reset_step(&mut self) {
        self.counter_mut().reset();
    }
}
