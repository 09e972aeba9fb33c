//! `agentrl parse`: Parse model text from stdin and print it as JSON.

use agentrl_agent::Registry;
use agentrl_protocol::ChatProtocol;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::load_config;

pub async fn run(completion: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let protocol = Registry::builtin().protocol(&config.agent.protocol)?;

    let mut text = String::new();
    tokio::io::stdin().read_to_string(&mut text).await?;

    debug!(protocol = protocol.name(), bytes = text.len(), completion, "Parsing model text");

    let json = if completion {
        serde_json::to_string_pretty(&protocol.parse_messages_from_completion_text(&text))?
    } else {
        serde_json::to_string_pretty(&protocol.parse_assistant_text(&text))?
    };
    println!("{json}");
    Ok(())
}
