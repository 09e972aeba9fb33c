//! `agentrl render`: Render a JSON message list into prompt text.

use std::path::Path;

use agentrl_agent::{AgentSession, Registry};
use agentrl_core::Message;
use agentrl_protocol::ChatProtocol;
use tracing::debug;

use super::load_config;

pub async fn run(input: &Path, no_tools: bool, generation_prompt: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let raw = std::fs::read_to_string(input).map_err(|e| format!("Failed to read {}: {e}", input.display()))?;
    let messages: Vec<Message> =
        serde_json::from_str(&raw).map_err(|e| format!("{} is not a JSON message list: {e}", input.display()))?;

    let session = Registry::builtin().build_plain_session(&config)?;
    print!("{}", render_messages(&session, &messages, no_tools, generation_prompt));
    Ok(())
}

/// Render with the session's protocol, and its tools unless `no_tools`.
pub fn render_messages(session: &AgentSession, messages: &[Message], no_tools: bool, generation_prompt: bool) -> String {
    let tools = if no_tools {
        Vec::new()
    } else {
        session.environment().tools_manifest()
    };
    debug!(
        protocol = session.protocol().name(),
        messages = messages.len(),
        tools = tools.len(),
        "Rendering transcript"
    );
    session.protocol().render(messages, &tools, generation_prompt)
}
