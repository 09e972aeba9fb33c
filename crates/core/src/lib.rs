//! # agentrl Core
//!
//! Domain types, traits, and error definitions for the agentrl trajectory
//! runtime. Every other crate depends inward on this one.
//!
//! The seams are traits: [`Tool`] for environment capabilities,
//! [`LlmEngine`] for inference backends and [`ChatCompleter`] for reward
//! judges. Implementations live in their own crates.

pub mod action;
pub mod engine;
pub mod error;
pub mod event;
pub mod json;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use action::{Action, Observation, Question, RewardSample};
pub use engine::{ChatCompleter, GenerateRequest, Generation, LlmEngine, Prompt};
pub use error::{EngineError, Error, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use json::{PythonFormatter, to_python_json};
pub use message::{Conversation, Message, Role, ToolCall};
pub use tool::{Tool, ToolCatalog, ToolDefinition};
