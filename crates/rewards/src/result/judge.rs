//! External judge (generative reward model) scoring.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use agentrl_core::{
    Action, ChatCompleter, EngineError, Message, Question, RewardSample, ToolCall, to_python_json,
};
use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ResultRewardStrategy, label_text};

pub const CRITIC_PROMPT_TEMPLATE: &str = "Act as an impartial evaluator to determine whether an AI assistant’s response is consistent with—or exceeds—the quality of a provided reference answer to a given question.
Consider the following factors: helpfulness, relevance, accuracy, depth, creativity, harmlessness, and overall quality. Analyze these dimensions based on the specific problem, as different tasks may emphasize different criteria.
Avoid biases related to the position of responses, response length, or assistant names. Be objective in your assessment.
Output your judgment strictly as: [[Yes]] if the assistant’s response is consistent with or better than the reference answer, [[No]] otherwise.

[User Question]
{question}

[The Start of Reference Answer]
{label}
[The End of Reference Answer]

[The Start of Assistant's Response]
{response}
[The End of Assistant's Response]";

static VERDICT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\[(yes|no)\]\]").expect("valid verdict regex"));

/// Asks a judge model whether the answer matches the reference.
///
/// | judge outcome                          | score           |
/// |----------------------------------------|-----------------|
/// | last verdict `[[Yes]]`                 | `correct_score` |
/// | last verdict `[[No]]`, or no verdict   | `format_score`  |
/// | no final answer, error, timeout, empty | `error_score`   |
pub struct JudgeReward {
    judge: Arc<dyn ChatCompleter>,
    prompt_template: String,
    pub correct_score: f64,
    pub format_score: f64,
    pub error_score: f64,
    timeout: Option<Duration>,
    final_tool: String,
}

impl JudgeReward {
    pub fn new(judge: Arc<dyn ChatCompleter>) -> Self {
        Self {
            judge,
            prompt_template: CRITIC_PROMPT_TEMPLATE.to_string(),
            correct_score: 1.0,
            format_score: 0.0,
            error_score: -0.1,
            timeout: Some(Duration::from_secs(60)),
            final_tool: "final".into(),
        }
    }

    /// Custom prompt with `{question}`, `{label}` and `{response}` slots.
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub fn with_scores(mut self, correct: f64, format: f64, error: f64) -> Self {
        self.correct_score = correct;
        self.format_score = format;
        self.error_score = error;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_final_tool(mut self, name: impl Into<String>) -> Self {
        self.final_tool = name.into();
        self
    }

    async fn ask(&self, prompt: &str) -> Result<String, EngineError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.judge.complete(prompt))
                .await
                .unwrap_or_else(|_| {
                    Err(EngineError::Timeout(format!(
                        "judge did not answer within {}s",
                        limit.as_secs()
                    )))
                }),
            None => self.judge.complete(prompt).await,
        }
    }
}

#[async_trait]
impl ResultRewardStrategy for JudgeReward {
    fn name(&self) -> &str {
        "judge"
    }

    fn final_tool(&self) -> &str {
        &self.final_tool
    }

    async fn score(&self, action: &Action, label: Option<&Value>, sample: Option<&RewardSample>) -> f64 {
        let Some(response) = self.extract_final_response(action) else {
            return self.error_score;
        };

        let question = render_question(sample);
        let label = label.map(label_text).unwrap_or_default();
        let prompt = fill_template(&self.prompt_template, &question, &label, &response);

        let reply = match self.ask(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(judge = self.judge.name(), error = %e, "Judge request failed");
                return self.error_score;
            }
        };
        if reply.trim().is_empty() {
            return self.error_score;
        }

        let verdict = extract_verdict(&reply);
        debug!(judge = self.judge.name(), ?verdict, "Judge verdict");
        match verdict {
            Some(true) => self.correct_score,
            _ => self.format_score,
        }
    }
}

/// The last `[[Yes]]`/`[[No]]` in the reply; `Some(true)` for yes.
pub fn extract_verdict(reply: &str) -> Option<bool> {
    VERDICT_RE
        .captures_iter(reply)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().eq_ignore_ascii_case("yes"))
}

/// Render the seeded question for the judge: text as-is, messages as
/// `[Role]` sections separated by blank lines.
pub fn render_question(sample: Option<&RewardSample>) -> String {
    match sample.and_then(|s| s.question.as_ref()) {
        None => String::new(),
        Some(Question::Text(text)) => text.trim().to_string(),
        Some(Question::Messages(messages)) => {
            let sections: Vec<String> = messages.iter().map(render_section).collect();
            sections.join("\n\n").trim().to_string()
        }
    }
}

fn render_section(message: &Message) -> String {
    let role = message.role.as_str();
    let mut section = String::new();
    section.push('[');
    let mut chars = role.chars();
    if let Some(first) = chars.next() {
        section.extend(first.to_uppercase());
        section.push_str(chars.as_str());
    }
    section.push_str("]\n");
    section.push_str(message.text());
    if !message.tool_calls.is_empty() {
        section.push('\n');
        let calls: Vec<String> = message.tool_calls.iter().map(render_call).collect();
        section.push_str(&calls.join("\n\n"));
    }
    section
}

fn render_call(call: &ToolCall) -> String {
    let arguments = call
        .arguments
        .as_ref()
        .and_then(|args| to_python_json(args).ok())
        .unwrap_or_else(|| "{}".to_string());
    let mut lines = vec!["<tool_call>".to_string()];
    if !call.call_id.is_empty() {
        lines.push(format!("id: {}", call.call_id));
    }
    if let Some(name) = call.name.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("name: {name}"));
    }
    lines.push(format!("arguments: {arguments}"));
    lines.push("</tool_call>".to_string());
    lines.join("\n")
}

/// Single-pass substitution, so braces inside the values are left alone.
fn fill_template(template: &str, question: &str, label: &str, response: &str) -> String {
    let slots = [("{question}", question), ("{label}", label), ("{response}", response)];
    let mut out = String::with_capacity(template.len() + question.len() + label.len() + response.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match slots.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};
    use std::sync::Mutex;

    /// Replies with a fixed result, optionally after a delay, and records
    /// the prompt it was sent.
    struct ScriptedJudge {
        reply: Result<String, EngineError>,
        delay: Duration,
        seen: Mutex<Option<String>>,
    }

    impl ScriptedJudge {
        fn replying(reply: Result<String, EngineError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                delay: Duration::ZERO,
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ChatCompleter for ScriptedJudge {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String, EngineError> {
            *self.seen.lock().unwrap() = Some(prompt.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone()
        }
    }

    fn sample() -> RewardSample {
        let mut args = Map::new();
        args.insert("q".into(), json!("x"));
        let mut assistant = Message::assistant("A");
        assistant.tool_calls.push(ToolCall::new("call_1", "search", args));
        RewardSample {
            question: Some(Question::Messages(vec![
                Message::system("S"),
                Message::user("Q"),
                assistant,
            ])),
            process_messages: vec![],
        }
    }

    #[test]
    fn question_sections() {
        assert_eq!(
            render_question(Some(&sample())),
            "[System]\nS\n\n[User]\nQ\n\n[Assistant]\nA\n<tool_call>\nid: call_1\nname: search\narguments: {\"q\": \"x\"}\n</tool_call>"
        );
        let text = RewardSample {
            question: Some(Question::Text("  What is 2+2? ".into())),
            process_messages: vec![],
        };
        assert_eq!(render_question(Some(&text)), "What is 2+2?");
        assert_eq!(render_question(None), "");
    }

    #[test]
    fn verdict_uses_last_match() {
        assert_eq!(extract_verdict("maybe [[No]] ... actually [[yes]]"), Some(true));
        assert_eq!(extract_verdict("[[Yes]] then [[NO]]"), Some(false));
        assert_eq!(extract_verdict("no brackets"), None);
    }

    #[test]
    fn template_fill_is_single_pass() {
        let filled = fill_template("Q={question} L={label} R={response} {other}", "{label}", "4", "four");
        assert_eq!(filled, "Q={label} L=4 R=four {other}");
    }

    #[tokio::test]
    async fn yes_scores_correct_and_prompt_is_filled() {
        let judge = ScriptedJudge::replying(Ok("Looks right. [[Yes]]".into()));
        let reward = JudgeReward::new(judge.clone());
        let score = reward
            .score(&Action::text("Paris"), Some(&json!("Paris, France")), Some(&sample()))
            .await;
        assert_eq!(score, 1.0);

        let prompt = judge.seen.lock().unwrap().clone().unwrap();
        assert!(prompt.starts_with("Act as an impartial evaluator"));
        assert!(prompt.contains("[User Question]\n[System]\nS"));
        assert!(prompt.contains("[The Start of Reference Answer]\nParis, France\n"));
        assert!(prompt.ends_with("Paris\n[The End of Assistant's Response]"));
    }

    #[tokio::test]
    async fn no_or_missing_verdict_scores_format() {
        let reward = JudgeReward::new(ScriptedJudge::replying(Ok("[[No]]".into())));
        assert_eq!(reward.score(&Action::text("x"), Some(&json!("y")), None).await, 0.0);

        let reward = JudgeReward::new(ScriptedJudge::replying(Ok("I refuse to answer.".into())));
        assert_eq!(reward.score(&Action::text("x"), Some(&json!("y")), None).await, 0.0);
    }

    #[tokio::test]
    async fn failures_score_error() {
        let failing = JudgeReward::new(ScriptedJudge::replying(Err(EngineError::Network("down".into()))));
        assert_eq!(failing.score(&Action::text("x"), Some(&json!("y")), None).await, -0.1);

        let empty = JudgeReward::new(ScriptedJudge::replying(Ok("   ".into())));
        assert_eq!(empty.score(&Action::text("x"), Some(&json!("y")), None).await, -0.1);

        let judge = ScriptedJudge::replying(Ok("[[Yes]]".into()));
        let no_answer = JudgeReward::new(judge.clone());
        assert_eq!(no_answer.score(&Action::text("  "), Some(&json!("y")), None).await, -0.1);
        assert!(judge.seen.lock().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_scores_error() {
        let judge = Arc::new(ScriptedJudge {
            reply: Ok("[[Yes]]".into()),
            delay: Duration::from_secs(120),
            seen: Mutex::new(None),
        });
        let reward = JudgeReward::new(judge).with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(reward.score(&Action::text("x"), Some(&json!("y")), None).await, -0.1);
    }
}
