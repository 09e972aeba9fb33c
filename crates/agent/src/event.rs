//! Runtime streaming events.
//!
//! `RuntimeEvent` is what [`AgentRuntime`](crate::AgentRuntime) sends to
//! its caller while a trajectory unfolds:
//! - `message`: an assistant action or a tool observation
//! - `done`: the loop stopped
//! - `error`: the backend failed and the loop was aborted

use agentrl_core::Message;
use serde::{Deserialize, Serialize};

/// Events emitted by the runtime during a streaming run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// A message produced by one step, in history order.
    Message { message: Message },

    /// The loop is over.
    Done { steps: u32, terminated: bool },

    /// A backend or state error ended the run early.
    Error { message: String },
}

impl RuntimeEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Message { message } => Some(message),
            _ => None,
        }
    }
}
