//! Built-in tools.
//!
//! Tools are what a model calls from inside an environment: post a status
//! update, submit a final answer, jot a private note, or query a local
//! retriever. Every tool reports its whole effect through the string it
//! returns.

pub mod commentary;
pub mod final_answer;
pub mod local_search;
pub mod think;

pub use commentary::CommentaryTool;
pub use final_answer::FinalTool;
pub use local_search::LocalSearchTool;
pub use think::ThinkTool;

use std::time::Duration;

/// Settings for tools that talk to external services.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Retriever endpoint for `local_search`; the tool is unavailable without it
    pub local_search_url: Option<String>,
    pub local_search_timeout: Duration,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            local_search_url: None,
            local_search_timeout: Duration::from_secs(10),
        }
    }
}
