//! Chat protocol codecs.
//!
//! A protocol is a deterministic two-way mapping between a structured
//! conversation and the flat text a model family is trained on:
//!
//! ```text
//!   [Message] + [ToolDefinition] ──render──▶  "<|im_start|>system\n…"
//!   "<think>…</think>\n\n<tool_call>…"  ──parse_assistant_text──▶  Action
//!   "<|im_start|>user\n…<|im_end|>…"    ──parse_messages_…──▶  [Message]
//! ```
//!
//! Parsing never fails. Malformed tool call payloads degrade to calls
//! carrying a `refusal`, which the environment turns into a diagnostic the
//! model can react to.

mod qwen3;
mod tojson;

pub use qwen3::{Qwen3InstructProtocol, Qwen3ThinkingProtocol};
pub use tojson::to_json;

use agentrl_core::{Action, Message, ToolDefinition};

/// A wire dialect for one model family.
pub trait ChatProtocol: Send + Sync {
    /// Registry name (e.g., "qwen3_thinking").
    fn name(&self) -> &str;

    /// Render messages and tool schemas into prompt text. An empty `tools`
    /// slice renders no tool preamble. Output is byte-identical for
    /// identical inputs.
    fn render(&self, messages: &[Message], tools: &[ToolDefinition], add_generation_prompt: bool) -> String;

    /// Split raw assistant text into reasoning, visible content and tool calls.
    fn parse_assistant_text(&self, raw: &str) -> Action;

    /// Decode a rendered transcript back into messages.
    fn parse_messages_from_completion_text(&self, text: &str) -> Vec<Message>;
}
