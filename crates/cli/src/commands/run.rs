//! `agentrl run`: Stream trajectories against the configured server.

use std::sync::Arc;

use agentrl_agent::{Registry, RuntimeEvent};
use agentrl_config::AppConfig;
use agentrl_core::{Message, Role};
use agentrl_env::is_internal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::{build_engine, load_config};

pub async fn run(message: Option<String>, show_internal: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let registry = Registry::builtin();

    if let Some(msg) = message {
        return trajectory(&registry, &config, &msg, show_internal).await;
    }

    println!();
    println!("  agentrl — Interactive Mode");
    println!();
    println!("  Server:       {}", config.engine.base_url);
    println!("  Model:        {}", config.engine.model);
    println!("  Environment:  {}", config.agent.environment);
    println!("  Protocol:     {}", config.agent.protocol);
    println!();
    println!("  Each message starts a new trajectory. Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        if let Err(e) = trajectory(&registry, &config, line, show_internal).await {
            eprintln!("  [Error] {e}");
        }
        println!();
    }

    println!();
    Ok(())
}

async fn trajectory(
    registry: &Registry,
    config: &AppConfig,
    message: &str,
    show_internal: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(build_engine(config)?);
    let runtime = registry.build_runtime(config, engine)?;

    info!(
        environment = %config.agent.environment,
        protocol = %config.agent.protocol,
        model = %config.engine.model,
        "Starting trajectory"
    );

    let mut rx = runtime.run_stream(vec![Message::user(message)]);
    while let Some(event) = rx.recv().await {
        debug!(event = event.event_type(), "Runtime event");
        if let RuntimeEvent::Error { message } = &event {
            return Err(message.clone().into());
        }
        if let Some(line) = format_event(&event, show_internal) {
            println!("{line}");
        }
    }
    Ok(())
}

/// One printable line per event; `None` for hidden events.
pub fn format_event(event: &RuntimeEvent, show_internal: bool) -> Option<String> {
    match event {
        RuntimeEvent::Message { message } => format_message(message, show_internal),
        RuntimeEvent::Done { steps, terminated } => {
            let status = if *terminated { "done" } else { "stopped" };
            Some(format!("  [{status} after {steps} step(s)]"))
        }
        RuntimeEvent::Error { message } => Some(format!("  [Error] {message}")),
    }
}

fn format_message(message: &Message, show_internal: bool) -> Option<String> {
    match message.role {
        Role::Assistant => {
            let mut lines = Vec::new();
            if let Some(reasoning) = message.reasoning_content.as_deref().filter(|r| !r.trim().is_empty()) {
                lines.push(format!("  Thinking > {}", reasoning.trim()));
            }
            for call in &message.tool_calls {
                match (&call.name, &call.refusal) {
                    (Some(name), None) => {
                        let args = call
                            .arguments
                            .as_ref()
                            .map(|a| serde_json::Value::Object(a.clone()).to_string())
                            .unwrap_or_else(|| "{}".into());
                        lines.push(format!("  Tool call > {name}({args})"));
                    }
                    (_, Some(refusal)) => lines.push(format!("  Tool call > [malformed] {refusal}")),
                    (None, None) => lines.push("  Tool call > [missing name]".to_string()),
                }
            }
            let content = message.text().trim();
            if !content.is_empty() {
                lines.extend(content.lines().map(|line| format!("  Assistant > {line}")));
            }
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        Role::Tool => {
            let text = message.text();
            if is_internal(text) {
                show_internal.then(|| format!("  [internal] {text}"))
            } else {
                Some(format!("  Tool result > {text}"))
            }
        }
        Role::System | Role::User => None,
    }
}
