//! Result rewards: score the reply that ends a trajectory.

mod judge;
mod matching;
mod math;

pub use judge::{CRITIC_PROMPT_TEMPLATE, JudgeReward};
pub use matching::MatchingReward;
pub use math::MathMatchingReward;

use agentrl_core::{Action, RewardSample};
use async_trait::async_trait;
use serde_json::Value;

/// Scores the terminal step of a trajectory.
#[async_trait]
pub trait ResultRewardStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Tool whose `answer` argument counts as the final response.
    fn final_tool(&self) -> &str {
        "final"
    }

    async fn score(&self, action: &Action, label: Option<&Value>, sample: Option<&RewardSample>) -> f64;

    fn extract_final_response(&self, action: &Action) -> Option<String> {
        extract_final_response(action, self.final_tool())
    }
}

/// The user-visible answer: trimmed content when the action has no tool
/// calls, otherwise the first non-empty `answer` passed to `final_tool`.
pub fn extract_final_response(action: &Action, final_tool: &str) -> Option<String> {
    let content = action.trimmed_content();
    if !content.is_empty() && action.tool_calls.is_empty() {
        return Some(content.to_string());
    }

    action
        .tool_calls
        .iter()
        .filter(|call| call.refusal.is_none() && call.trimmed_name() == final_tool)
        .filter_map(|call| call.arguments.as_ref()?.get("answer"))
        .map(|answer| label_text(answer).trim().to_string())
        .find(|answer| !answer.is_empty())
}

/// Text form of a label: strings as-is, anything else as JSON.
pub fn label_text(label: &Value) -> String {
    match label {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrl_core::ToolCall;
    use serde_json::{Map, json};

    #[test]
    fn plain_content_is_the_answer() {
        assert_eq!(extract_final_response(&Action::text("  42 "), "final").as_deref(), Some("42"));
        assert!(extract_final_response(&Action::text("   "), "final").is_none());
    }

    #[test]
    fn final_tool_answer_is_used_with_calls() {
        let mut args = Map::new();
        args.insert("answer".into(), json!(" Paris "));
        let mut action = Action::calls(vec![
            ToolCall::new("call_1", "commentary", Map::new()),
            ToolCall::new("call_2", "final", args),
        ]);
        action.content = Some("Submitting.".into());
        assert_eq!(extract_final_response(&action, "final").as_deref(), Some("Paris"));
        assert!(extract_final_response(&action, "submit").is_none());
    }

    #[test]
    fn label_text_forms() {
        assert_eq!(label_text(&json!("x")), "x");
        assert_eq!(label_text(&json!(12)), "12");
    }
}
