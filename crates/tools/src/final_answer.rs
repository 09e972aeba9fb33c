//! Explicit final-answer tool for structured outputs.

use agentrl_core::{Tool, ToolError, to_python_json};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};

pub struct FinalTool;

#[derive(Serialize)]
struct FinalOutcome<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[async_trait]
impl Tool for FinalTool {
    fn name(&self) -> &str {
        "final"
    }

    fn description(&self) -> &str {
        "Return the final answer that will be shown to the user."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "Plain-text answer for the user."
                }
            },
            "required": ["answer"]
        })
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let answer = match arguments.get("answer") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let outcome = if answer.is_empty() {
            FinalOutcome {
                ok: false,
                answer: None,
                error: Some("answer must be a non-empty string."),
            }
        } else {
            FinalOutcome {
                ok: true,
                answer: Some(&answer),
                error: None,
            }
        };
        to_python_json(&outcome).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}
