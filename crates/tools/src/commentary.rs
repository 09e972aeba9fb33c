//! Commentary tool: short progress updates shown to the user.

use agentrl_core::{Tool, ToolError, to_python_json};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

pub struct CommentaryTool;

#[async_trait]
impl Tool for CommentaryTool {
    fn name(&self) -> &str {
        "commentary"
    }

    fn description(&self) -> &str {
        "Send a short status update about current actions or progress. \
         Do not use this tool for the final answer or key content."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Short status message about the current action, e.g. \
                        \"Checking recent data\", \"Reviewing code\". \
                        Do not include final answers or long explanations."
                }
            },
            "required": ["message"]
        })
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        to_python_json(&json!({"ok": true})).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acknowledges() {
        let output = CommentaryTool.invoke(&Map::new()).await.unwrap();
        assert_eq!(output, r#"{"ok": true}"#);
    }

    #[test]
    fn schema_requires_message() {
        assert_eq!(CommentaryTool.required_arguments(), vec!["message".to_string()]);
        let description = CommentaryTool.parameters_schema()["properties"]["message"]["description"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(description.starts_with("Short status message about the current action, e.g. \"Checking"));
    }
}
