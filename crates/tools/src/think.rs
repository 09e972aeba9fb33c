//! Private planning note. The note never reaches the user.

use agentrl_core::{Tool, ToolError};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

pub struct ThinkTool;

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "Write down private note before taking a visible action."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "note": {
                    "type": "string",
                    "description": "Short plan or reasoning that stays internal."
                }
            },
            "required": ["note"]
        })
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        Ok(String::new())
    }
}
