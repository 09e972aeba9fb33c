//! agentrl CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write the default config
//! - `run`: Stream a trajectory against the configured inference server
//! - `render`: Render a JSON message list with the configured protocol
//! - `parse`: Parse model output or a rendered transcript from stdin
//! - `doctor`: Diagnose config and server health

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agentrl",
    about = "agentrl — tool-using LLM trajectories",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Onboard,

    /// Run the agent against the configured inference server
    Run {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Also print internal diagnostics fed back to the model
        #[arg(long)]
        show_internal: bool,
    },

    /// Render a JSON list of messages into prompt text
    Render {
        /// JSON file with `[{"role": ..., "content": ...}, ...]`
        #[arg(short, long)]
        input: PathBuf,

        /// Leave the tool preamble out
        #[arg(long)]
        no_tools: bool,

        /// Append the assistant generation prompt
        #[arg(long)]
        generation_prompt: bool,
    },

    /// Parse stdin into an action (or messages with --completion) as JSON
    Parse {
        /// Treat stdin as a rendered transcript instead of one assistant turn
        #[arg(long)]
        completion: bool,
    },

    /// Diagnose config and inference server health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so `render` and `parse` output stays pipeable
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Run { message, show_internal } => commands::run::run(message, show_internal).await?,
        Commands::Render {
            input,
            no_tools,
            generation_prompt,
        } => commands::render::run(&input, no_tools, generation_prompt).await?,
        Commands::Parse { completion } => commands::parse::run(completion).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
