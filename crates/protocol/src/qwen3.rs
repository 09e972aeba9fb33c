//! Qwen3 ChatML dialect.
//!
//! Rendering reproduces the upstream Qwen3 chat template byte for byte:
//! `<|im_start|>{role}\n…<|im_end|>\n` blocks, a tool manifest inside the
//! system block, `<think>` reasoning only for assistant turns after the
//! last real user query, and consecutive tool results grouped into one
//! `user` block of `<tool_response>` entries.

use std::sync::LazyLock;

use agentrl_core::{Action, Message, Role, ToolCall, ToolDefinition};
use regex_lite::Regex;
use serde_json::{Map, Value};

use crate::ChatProtocol;
use crate::tojson::to_json;

const TOOLS_HEADER: &str = "# Tools\n\nYou may call one or more functions to assist with the user query.\n\nYou are provided with function signatures within <tools></tools> XML tags:\n<tools>";

const TOOLS_FOOTER: &str = "\n</tools>\n\nFor each function call, return a json object with function name and arguments within <tool_call></tool_call> XML tags:\n<tool_call>\n{\"name\": <function-name>, \"arguments\": <args-json-object>}\n</tool_call><|im_end|>\n";

const THINK_CLOSE: &str = "</think>";
const THINK_OPEN: &str = "<think>";

static TOOL_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<tool_call>\s*(?P<body>.*?)\s*</tool_call>").expect("valid tool call regex")
});

static MESSAGE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<\|im_start\|>(?P<role>[a-zA-Z_]+)\s*\n(?P<body>.*?)<\|im_end\|>")
        .expect("valid message block regex")
});

static TOOL_RESPONSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<tool_response>\s*(?P<body>.*?)\s*</tool_response>")
        .expect("valid tool response regex")
});

/// Qwen3 with `<think>` reasoning blocks (the default dialect).
#[derive(Debug, Clone, Copy, Default)]
pub struct Qwen3ThinkingProtocol;

impl ChatProtocol for Qwen3ThinkingProtocol {
    fn name(&self) -> &str {
        "qwen3_thinking"
    }

    fn render(&self, messages: &[Message], tools: &[ToolDefinition], add_generation_prompt: bool) -> String {
        render_chatml(messages, tools, add_generation_prompt, true)
    }

    fn parse_assistant_text(&self, raw: &str) -> Action {
        parse_assistant(raw)
    }

    fn parse_messages_from_completion_text(&self, text: &str) -> Vec<Message> {
        parse_transcript(text)
    }
}

/// Qwen3 instruct checkpoints: same blocks, no reasoning section and a
/// bare assistant generation prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct Qwen3InstructProtocol;

impl ChatProtocol for Qwen3InstructProtocol {
    fn name(&self) -> &str {
        "qwen3_instruct"
    }

    fn render(&self, messages: &[Message], tools: &[ToolDefinition], add_generation_prompt: bool) -> String {
        render_chatml(messages, tools, add_generation_prompt, false)
    }

    fn parse_assistant_text(&self, raw: &str) -> Action {
        parse_assistant(raw)
    }

    fn parse_messages_from_completion_text(&self, text: &str) -> Vec<Message> {
        parse_transcript(text)
    }
}

// ── Rendering ───────────────────────────────────────────────────────────

fn render_chatml(
    messages: &[Message],
    tools: &[ToolDefinition],
    add_generation_prompt: bool,
    thinking: bool,
) -> String {
    let mut out = String::new();
    let leading_system = messages.first().filter(|m| m.role == Role::System);

    if !tools.is_empty() {
        out.push_str("<|im_start|>system\n");
        if let Some(system) = leading_system {
            out.push_str(system.text());
            out.push_str("\n\n");
        }
        out.push_str(TOOLS_HEADER);
        for tool in tools {
            out.push('\n');
            out.push_str(&to_json(&tool.to_manifest()));
        }
        out.push_str(TOOLS_FOOTER);
    } else if let Some(system) = leading_system {
        out.push_str("<|im_start|>system\n");
        out.push_str(system.text());
        out.push_str("<|im_end|>\n");
    }

    let last_query = last_query_index(messages);

    for (index, message) in messages.iter().enumerate() {
        match message.role {
            Role::System if index == 0 => {}
            Role::System | Role::User => {
                out.push_str("<|im_start|>");
                out.push_str(message.role.as_str());
                out.push('\n');
                out.push_str(message.text());
                out.push_str("<|im_end|>\n");
            }
            Role::Assistant => {
                let after_query = index as isize > last_query;
                render_assistant(&mut out, message, after_query, thinking);
            }
            Role::Tool => {
                if index == 0 || messages[index - 1].role != Role::Tool {
                    out.push_str("<|im_start|>user");
                }
                out.push_str("\n<tool_response>\n");
                out.push_str(message.text());
                out.push_str("\n</tool_response>");
                if messages.get(index + 1).is_none_or(|next| next.role != Role::Tool) {
                    out.push_str("<|im_end|>\n");
                }
            }
        }
    }

    if add_generation_prompt {
        out.push_str(if thinking {
            "<|im_start|>assistant\n<think>\n"
        } else {
            "<|im_start|>assistant\n"
        });
    }
    out
}

/// Index of the last user message that is a real query rather than a
/// wrapped tool response. Falls back to the last index.
fn last_query_index(messages: &[Message]) -> isize {
    messages
        .iter()
        .enumerate()
        .rev()
        .find(|(_, m)| {
            m.role == Role::User
                && m.content.as_deref().is_some_and(|c| {
                    !(c.starts_with("<tool_response>") && c.ends_with("</tool_response>"))
                })
        })
        .map(|(i, _)| i as isize)
        .unwrap_or(messages.len() as isize - 1)
}

fn render_assistant(out: &mut String, message: &Message, after_query: bool, thinking: bool) {
    let mut content = message.text();
    let mut reasoning = "";

    if let Some(explicit) = message.reasoning_content.as_deref() {
        reasoning = explicit;
    } else if thinking && content.contains(THINK_CLOSE) {
        let before = content.split(THINK_CLOSE).next().unwrap_or_default();
        reasoning = before
            .trim_end_matches('\n')
            .rsplit(THINK_OPEN)
            .next()
            .unwrap_or_default()
            .trim_start_matches('\n');
        content = content
            .rsplit(THINK_CLOSE)
            .next()
            .unwrap_or_default()
            .trim_start_matches('\n');
    }
    let reasoning = reasoning.trim_matches('\n');

    out.push_str("<|im_start|>assistant\n");
    if thinking && after_query && !reasoning.is_empty() {
        out.push_str("<think>\n");
        out.push_str(reasoning);
        out.push_str("\n</think>\n\n");
        out.push_str(content.trim_start_matches('\n'));
    } else {
        out.push_str(content);
    }

    for (i, call) in message.tool_calls.iter().enumerate() {
        if i > 0 || !content.is_empty() {
            out.push('\n');
        }
        let arguments = call
            .arguments
            .as_ref()
            .map(|args| to_json(&Value::Object(args.clone())))
            .unwrap_or_else(|| "{}".to_string());
        out.push_str("<tool_call>\n{\"name\": \"");
        out.push_str(call.name.as_deref().unwrap_or_default());
        out.push_str("\", \"arguments\": ");
        out.push_str(&arguments);
        out.push_str("}\n</tool_call>");
    }
    out.push_str("<|im_end|>\n");
}

// ── Parsing ─────────────────────────────────────────────────────────────

fn parse_assistant(raw: &str) -> Action {
    let (reasoning, text) = split_reasoning(raw);

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    let mut cursor = 0;

    for (idx, caps) in TOOL_CALL_RE.captures_iter(text).enumerate() {
        let Some(block) = caps.get(0) else { continue };
        content.push_str(&text[cursor..block.start()]);
        let payload = caps.name("body").map_or("", |m| m.as_str()).trim();
        tool_calls.push(parse_call(payload, idx + 1));
        cursor = block.end();
    }
    content.push_str(&text[cursor..]);

    let content = content.trim();
    Action {
        content: (!content.is_empty()).then(|| content.to_string()),
        tool_calls,
        refusal: None,
        reasoning_content: reasoning,
    }
}

/// Everything before the first `</think>` (any case) is reasoning.
fn split_reasoning(raw: &str) -> (Option<String>, &str) {
    let Some(end) = raw.to_ascii_lowercase().find(THINK_CLOSE) else {
        return (None, raw);
    };
    let mut reasoning = raw[..end].trim();
    if reasoning.len() >= THINK_OPEN.len()
        && reasoning.is_char_boundary(THINK_OPEN.len())
        && reasoning[..THINK_OPEN.len()].eq_ignore_ascii_case(THINK_OPEN)
    {
        reasoning = reasoning[THINK_OPEN.len()..].trim();
    }
    let remainder = raw[end + THINK_CLOSE.len()..].trim_start();
    let reasoning = (!reasoning.is_empty()).then(|| reasoning.to_string());
    (reasoning, remainder)
}

fn parse_call(payload: &str, idx: usize) -> ToolCall {
    let fallback_id = format!("call_{idx}");

    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => return ToolCall::refused(fallback_id, format!("error parse json: {e}")),
    };
    let Value::Object(mut object) = value else {
        return ToolCall::refused(fallback_id, "error parse json: payload must be an object.");
    };

    let call_id = match object.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        _ => fallback_id,
    };
    let name = match object.remove("name") {
        Some(Value::String(name)) => name,
        _ => return ToolCall::refused(call_id, "error parse json: name must be string."),
    };
    let arguments: Map<String, Value> = match object.remove("arguments") {
        Some(Value::Object(arguments)) => arguments,
        _ => return ToolCall::refused(call_id, "error parse json: arguments must be an object."),
    };

    ToolCall::new(call_id, name, arguments)
}

fn parse_transcript(text: &str) -> Vec<Message> {
    let mut messages = Vec::new();

    for block in MESSAGE_BLOCK_RE.captures_iter(text) {
        let role_name = block.name("role").map_or("", |m| m.as_str()).trim();
        let body = block.name("body").map_or("", |m| m.as_str()).trim_matches('\n');

        let Some(role) = Role::parse(role_name) else {
            tracing::debug!(role = role_name, "Skipping block with unknown role");
            continue;
        };
        if body.is_empty() && role != Role::Assistant {
            continue;
        }

        match role {
            Role::Assistant => messages.push(parse_assistant(body).to_message()),
            Role::User if body.contains("<tool_response>") => {
                for response in TOOL_RESPONSE_RE.captures_iter(body) {
                    let payload = response.name("body").map_or("", |m| m.as_str()).trim();
                    if !payload.is_empty() {
                        messages.push(Message::tool(payload));
                    }
                }
            }
            _ => messages.push(Message::new(role, body.trim())),
        }
    }

    messages
}
