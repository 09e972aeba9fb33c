//! Process rewards: shaping signals for intermediate tool use.

use std::collections::HashMap;

use agentrl_core::Action;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scores every step, terminal or not.
#[async_trait]
pub trait ProcessRewardStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, action: &Action, label: Option<&Value>) -> f64;
}

/// Per-tool scoring rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPolicy {
    #[serde(default = "default_reward_per_call")]
    pub reward_per_call: f64,

    /// Calls per step that earn `reward_per_call`; `None` is unlimited
    #[serde(default)]
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

impl ToolPolicy {
    pub fn new(reward_per_call: f64) -> Self {
        Self {
            reward_per_call,
            ..Self::default()
        }
    }

    pub fn with_max_calls(mut self, max_calls: u32) -> Self {
        self.max_calls = Some(max_calls);
        self
    }

    pub fn with_overuse_penalty(mut self, penalty: f64) -> Self {
        self.overuse_penalty = penalty;
        self
    }
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self {
            reward_per_call: default_reward_per_call(),
            max_calls: None,
            overuse_penalty: default_overuse_penalty(),
        }
    }
}

/// Rewards calls to tools that have a policy, penalizes malformed calls.
///
/// Within quota a tool earns `count * reward_per_call`. Over quota the
/// step earns only `(count - max_calls) * overuse_penalty` for that tool.
/// Tools without a policy contribute nothing.
#[derive(Debug, Clone)]
pub struct ToolCallReward {
    pub min_reward: Option<f64>,
    pub max_reward: Option<f64>,
    pub parse_error_penalty: f64,
    pub penalty_for_refused: f64,
    policies: HashMap<String, ToolPolicy>,
}

impl Default for ToolCallReward {
    fn default() -> Self {
        Self {
            min_reward: None,
            max_reward: None,
            parse_error_penalty: -0.2,
            penalty_for_refused: -0.1,
            policies: HashMap::new(),
        }
    }
}

impl ToolCallReward {
    /// Add a policy. Tool names are matched case-insensitively.
    pub fn with_policy(mut self, tool: &str, policy: ToolPolicy) -> Self {
        self.policies.insert(tool.to_lowercase(), policy);
        self
    }

    pub fn with_bounds(mut self, min_reward: Option<f64>, max_reward: Option<f64>) -> Self {
        self.min_reward = min_reward;
        self.max_reward = max_reward;
        self
    }

    pub fn with_penalties(mut self, parse_error: f64, refused: f64) -> Self {
        self.parse_error_penalty = parse_error;
        self.penalty_for_refused = refused;
        self
    }

    fn clamp(&self, mut reward: f64) -> f64 {
        if let Some(max) = self.max_reward {
            reward = reward.min(max);
        }
        if let Some(min) = self.min_reward {
            reward = reward.max(min);
        }
        reward
    }

    fn score_action(&self, action: &Action) -> f64 {
        if action.refusal.is_some() {
            return self.clamp(self.parse_error_penalty);
        }

        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut refused = 0u32;
        for call in &action.tool_calls {
            let name = call.trimmed_name();
            if call.refusal.is_some() || name.is_empty() {
                refused += 1;
                continue;
            }
            *counts.entry(name.to_lowercase()).or_default() += 1;
        }

        let mut reward = f64::from(refused) * self.penalty_for_refused;
        for (name, count) in counts {
            let Some(policy) = self.policies.get(&name) else {
                continue;
            };
            let allowed = policy.max_calls.unwrap_or(count);
            if count <= allowed {
                reward += f64::from(count) * policy.reward_per_call;
            } else {
                reward += f64::from(count - allowed) * policy.overuse_penalty;
            }
        }
        self.clamp(reward)
    }
}

#[async_trait]
impl ProcessRewardStrategy for ToolCallReward {
    fn name(&self) -> &str {
        "tool_call"
    }

    async fn score(&self, action: &Action, _label: Option<&Value>) -> f64 {
        self.score_action(action)
    }
}
