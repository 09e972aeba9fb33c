//! LLM backend implementations for agentrl.
//!
//! Backends implement `agentrl_core::LlmEngine` (token-level generation for
//! the runtime) and `agentrl_core::ChatCompleter` (plain chat for reward
//! judges).

pub mod openai_compat;

pub use openai_compat::OpenAiCompatEngine;
