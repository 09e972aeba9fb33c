//! Error types for the agentrl domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Only configuration mistakes, invalid environment state and backend
//! failures surface as errors. Malformed model output, policy violations,
//! tool failures and judge failures are recovered into observations or
//! fallback scores and never reach this type.

use thiserror::Error;

/// The top-level error type for all agentrl operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- LLM backend errors ---
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- State machine misuse ---
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Engine not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_displays_correctly() {
        let err = Error::Engine(EngineError::ApiError {
            status_code: 503,
            message: "model is loading".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model is loading"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::Timeout {
            tool_name: "local_search".into(),
            timeout_secs: 10,
        });
        assert!(err.to_string().contains("local_search"));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn tool_errors_name_the_tool() {
        let errors = [
            ToolError::ExecutionFailed {
                tool_name: "final".into(),
                reason: "bad answer".into(),
            },
            ToolError::Timeout {
                tool_name: "final".into(),
                timeout_secs: 1,
            },
        ];
        for err in errors {
            match &err {
                ToolError::ExecutionFailed { tool_name, .. } | ToolError::Timeout { tool_name, .. } => {
                    assert_eq!(tool_name, "final");
                }
            }
            assert!(err.to_string().contains("final"));
        }
    }

    #[test]
    fn config_shorthand() {
        let err = Error::config("duplicate tool 'final'");
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("duplicate tool"));
    }
}
