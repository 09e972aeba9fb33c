use std::sync::Arc;

use agentrl_core::{Action, Error, Result, RewardSample};
use serde_json::Value;
use tracing::debug;

use crate::process::ProcessRewardStrategy;
use crate::result::ResultRewardStrategy;

/// Process and result strategies combined into one scalar per step.
///
/// Immutable after construction; share it across sessions with `Arc`.
#[derive(Clone)]
pub struct RewardPipeline {
    process: Option<Arc<dyn ProcessRewardStrategy>>,
    result: Option<Arc<dyn ResultRewardStrategy>>,
}

impl RewardPipeline {
    /// At least one strategy is required.
    pub fn new(
        process: Option<Arc<dyn ProcessRewardStrategy>>,
        result: Option<Arc<dyn ResultRewardStrategy>>,
    ) -> Result<Self> {
        if process.is_none() && result.is_none() {
            return Err(Error::config("RewardPipeline requires at least one reward strategy"));
        }
        Ok(Self { process, result })
    }

    /// Process score, plus the result score when `done`.
    pub async fn score(
        &self,
        action: &Action,
        label: Option<&Value>,
        done: bool,
        sample: Option<&RewardSample>,
    ) -> f64 {
        let mut reward = 0.0;

        if let Some(process) = &self.process {
            let score = process.score(action, label).await;
            debug!(strategy = process.name(), score, "Process reward");
            reward += score;
        }

        if done {
            if let Some(result) = &self.result {
                let score = result.score(action, label, sample).await;
                debug!(strategy = result.name(), score, "Result reward");
                reward += score;
            }
        }

        reward
    }
}

impl std::fmt::Debug for RewardPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewardPipeline")
            .field("process", &self.process.as_ref().map(|p| p.name().to_string()))
            .field("result", &self.result.as_ref().map(|r| r.name().to_string()))
            .finish()
    }
}
