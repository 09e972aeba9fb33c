//! Per-step value objects: the parsed assistant action, the observation
//! returned after applying it, and the reward sample snapshot.

use serde::{Deserialize, Serialize};

use crate::message::{Message, Role, ToolCall};

/// Assistant reply split into visible text, reasoning and tool calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Text outside any tool call block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls in the order the model emitted them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Top-level parse failure; preempts tool execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,

    /// Reasoning segment preceding the closing think tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

impl Action {
    /// A plain-text reply with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// An action carrying only tool calls.
    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    /// True when the action or any of its calls failed to parse.
    pub fn has_parse_error(&self) -> bool {
        self.refusal.is_some() || self.tool_calls.iter().any(|c| c.refusal.is_some())
    }

    /// Trimmed visible content, empty when absent.
    pub fn trimmed_content(&self) -> &str {
        self.content.as_deref().map(str::trim).unwrap_or("")
    }

    /// The assistant message recorded in history for this action.
    pub fn to_message(&self) -> Message {
        Message {
            role: Role::Assistant,
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            reasoning_content: self.reasoning_content.clone(),
        }
    }
}

/// Outcome of applying one action to the environment.
///
/// Both feedback views are derived from the same tool messages: the
/// messages view leads with the action message (for runtime and UI
/// consumers), the text view renders the tool messages alone (the suffix
/// appended to the next prompt).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub step_index: u32,
    pub feedback_messages: Vec<Message>,
    pub feedback_text: String,
    pub done: bool,
}

impl Observation {
    /// Build an observation. `render` turns the tool messages into the
    /// next-prompt suffix and is only called when there are any.
    pub fn new<F>(
        step_index: u32,
        action_message: Message,
        tool_messages: Vec<Message>,
        done: bool,
        render: F,
    ) -> Self
    where
        F: FnOnce(&[Message]) -> String,
    {
        let feedback_text = if tool_messages.is_empty() {
            String::new()
        } else {
            render(&tool_messages)
        };
        let mut feedback_messages = Vec::with_capacity(tool_messages.len() + 1);
        feedback_messages.push(action_message);
        feedback_messages.extend(tool_messages);
        Self {
            step_index,
            feedback_messages,
            feedback_text,
            done,
        }
    }

    /// The tool messages, without the leading action message.
    pub fn tool_messages(&self) -> &[Message] {
        self.feedback_messages
            .split_first()
            .map(|(_, rest)| rest)
            .unwrap_or(&[])
    }

    /// The assistant message this observation responds to.
    pub fn action_message(&self) -> Option<&Message> {
        self.feedback_messages
            .first()
            .filter(|m| m.role == Role::Assistant)
    }
}

/// The question a trajectory was seeded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Question {
    Text(String),
    Messages(Vec<Message>),
}

/// Read-only snapshot handed to result reward strategies that need more
/// context than the latest action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<Question>,

    #[serde(default)]
    pub process_messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_detects_refused_call() {
        let mut action = Action::calls(vec![ToolCall::refused("call_1", "bad json")]);
        assert!(action.has_parse_error());
        action.tool_calls.clear();
        assert!(!action.has_parse_error());
        action.refusal = Some("unparseable".into());
        assert!(action.has_parse_error());
    }

    #[test]
    fn to_message_keeps_calls_and_reasoning() {
        let mut action = Action::calls(vec![ToolCall::new("call_1", "final", serde_json::Map::new())]);
        action.reasoning_content = Some("plan".into());
        let msg = action.to_message();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.reasoning_content.as_deref(), Some("plan"));
        assert!(msg.content.is_none());
    }

    #[test]
    fn observation_without_tools_has_empty_feedback_text() {
        let obs = Observation::new(1, Message::assistant("done"), vec![], true, |_| {
            panic!("render must not run without tool messages")
        });
        assert!(obs.feedback_text.is_empty());
        assert_eq!(obs.feedback_messages.len(), 1);
        assert!(obs.tool_messages().is_empty());
    }

    #[test]
    fn observation_views_share_tool_messages() {
        let obs = Observation::new(
            2,
            Message::assistant("working"),
            vec![Message::tool("a"), Message::tool("b")],
            false,
            |msgs| msgs.iter().map(|m| m.text()).collect::<Vec<_>>().join("|"),
        );
        assert_eq!(obs.feedback_text, "a|b");
        assert_eq!(obs.tool_messages().len(), 2);
        assert_eq!(obs.action_message().map(|m| m.text()), Some("working"));
    }

    #[test]
    fn question_deserializes_untagged() {
        let q: Question = serde_json::from_str(r#""What is 2+2?""#).unwrap();
        assert_eq!(q, Question::Text("What is 2+2?".into()));
        let q: Question = serde_json::from_str(r#"[{"role":"user","content":"hi"}]"#).unwrap();
        assert!(matches!(q, Question::Messages(ref m) if m.len() == 1));
    }
}
