use agentrl_core::{Action, RewardSample};
use async_trait::async_trait;
use serde_json::Value;

use super::{ResultRewardStrategy, label_text};

/// Exact match of the trimmed answer against the trimmed label.
#[derive(Debug, Clone)]
pub struct MatchingReward {
    pub correct_score: f64,
    pub miss_score: f64,
    final_tool: String,
}

impl Default for MatchingReward {
    fn default() -> Self {
        Self {
            correct_score: 1.0,
            miss_score: 0.0,
            final_tool: "final".into(),
        }
    }
}

impl MatchingReward {
    pub fn with_scores(mut self, correct: f64, miss: f64) -> Self {
        self.correct_score = correct;
        self.miss_score = miss;
        self
    }

    pub fn with_final_tool(mut self, name: impl Into<String>) -> Self {
        self.final_tool = name.into();
        self
    }

    pub fn score_response(&self, response: &str, label: &Value) -> f64 {
        if response.trim() == label_text(label).trim() {
            self.correct_score
        } else {
            self.miss_score
        }
    }
}

#[async_trait]
impl ResultRewardStrategy for MatchingReward {
    fn name(&self) -> &str {
        "matching"
    }

    fn final_tool(&self) -> &str {
        &self.final_tool
    }

    async fn score(&self, action: &Action, label: Option<&Value>, _sample: Option<&RewardSample>) -> f64 {
        let Some(label) = label.filter(|l| !l.is_null()) else {
            return self.miss_score;
        };
        match self.extract_final_response(action) {
            Some(response) => self.score_response(&response, label),
            None => self.miss_score,
        }
    }
}
