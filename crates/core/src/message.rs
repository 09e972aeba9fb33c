//! Message and Conversation domain types.
//!
//! These are the value objects that flow through one trajectory:
//! the codec parses model text into tool calls, the session appends
//! messages to the conversation, and the codec renders it back to text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    /// Parse a wire role name. Unknown roles yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tool invocation requested by the model.
///
/// A call that failed to parse carries only `call_id` and `refusal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier (`call_<n>` when the payload supplies none)
    pub call_id: String,

    /// Name of the tool to invoke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Arguments as a JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,

    /// Why the call could not be parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

impl ToolCall {
    /// A well-formed call.
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            call_id: call_id.into(),
            name: Some(name.into()),
            arguments: Some(arguments),
            refusal: None,
        }
    }

    /// A call whose payload could not be decoded.
    pub fn refused(call_id: impl Into<String>, refusal: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            name: None,
            arguments: None,
            refusal: Some(refusal.into()),
        }
    }

    /// The trimmed tool name, empty when absent.
    pub fn trimmed_name(&self) -> &str {
        self.name.as_deref().map(str::trim).unwrap_or("")
    }
}

/// A single chat turn tracked in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Reasoning emitted before the visible content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

impl Message {
    /// Create a message with text content for any role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            reasoning_content: None,
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool observation message.
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Content as a string slice, empty when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// An ordered, append-only sequence of messages owned by one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh transcript seeded with a system prompt.
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::system(system_prompt));
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append historical messages in order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages from index `from` onwards (empty when out of range).
    pub fn tail(&self, from: usize) -> &[Message] {
        self.messages.get(from..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn conversation_reset_reseeds_system_prompt() {
        let mut conv = Conversation::new();
        conv.push(Message::user("stale"));
        conv.reset("You are helpful.");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.messages()[0].text(), "You are helpful.");
    }

    #[test]
    fn conversation_tail_out_of_range_is_empty() {
        let mut conv = Conversation::new();
        conv.reset("sys");
        assert_eq!(conv.tail(1).len(), 0);
        assert_eq!(conv.tail(7).len(), 0);
    }

    #[test]
    fn message_serialization_skips_empty_fields() {
        let msg = Message::tool("{\"ok\": true}");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"role": "tool", "content": "{\"ok\": true}"}));
    }

    #[test]
    fn message_deserializes_from_chat_payload() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": "checking",
            "tool_calls": [{"call_id": "call_1", "name": "final", "arguments": {"answer": "42"}}]
        }))
        .unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].trimmed_name(), "final");
    }

    #[test]
    fn refused_call_has_no_name() {
        let call = ToolCall::refused("call_2", "error parse json: bad");
        assert!(call.name.is_none());
        assert!(call.arguments.is_none());
        assert_eq!(call.trimmed_name(), "");
    }

    #[test]
    fn role_parse_rejects_unknown() {
        assert_eq!(Role::parse("tool"), Some(Role::Tool));
        assert_eq!(Role::parse("developer"), None);
    }
}
