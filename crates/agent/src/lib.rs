//! Agent sessions and the interactive runtime.
//!
//! A session owns one trajectory:
//!
//! 1. **Initialize** with prior turns (messages or a rendered transcript)
//! 2. **Render** the prompt through the chat protocol
//! 3. **Step** with model text: parse, apply to the environment, score
//! 4. **Feed back** the rendered tool messages as the next prompt suffix
//!
//! The runtime drives that loop against an LLM backend until the
//! environment terminates or the step budget runs out.

pub mod event;
pub mod factory;
pub mod runtime;
pub mod session;

pub use event::RuntimeEvent;
pub use factory::{EnvironmentSpec, Registry, build_runtime, build_session, tool_settings};
pub use runtime::{AgentRuntime, RuntimeSettings};
pub use session::{AgentSession, SessionInput, StepResult, SystemPromptSeeding};
