//! One reply and done. Used for plain question answering rollouts.

use agentrl_core::{Action, Result, ToolCatalog};
use async_trait::async_trait;

use crate::{Environment, StepCounter, StepOutcome};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// No tools, a budget of one step, always terminates.
pub struct SingleTurnEnvironment {
    catalog: ToolCatalog,
    system_prompt: String,
    counter: StepCounter,
}

impl SingleTurnEnvironment {
    pub fn new() -> Self {
        Self {
            catalog: ToolCatalog::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            counter: StepCounter::new(1),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

impl Default for SingleTurnEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Environment for SingleTurnEnvironment {
    fn name(&self) -> &str {
        "single_turn"
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

    async fn step(&mut self, _action: &Action) -> Result<StepOutcome> {
        self.counter.ensure_active()?;
        self.counter.finish(true);
        Ok(StepOutcome {
            observations: Vec::new(),
            terminated: true,
        })
    }
}
