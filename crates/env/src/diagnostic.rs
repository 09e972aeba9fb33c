//! Internal diagnostic observations.
//!
//! When the model does something the environment cannot act on, it gets a
//! machine-readable JSON payload back instead of a tool result. The payload
//! is marked `__internal` and not user-visible so UIs can hide it while the
//! model still sees it.

use agentrl_core::to_python_json;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    ParseError,
    EmptyFinal,
    ToolCallError,
    MissingToolName,
    InvalidTool,
    InvalidArguments,
    ToolRuntimeError,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::ParseError => "parse_error",
            DiagnosticCode::EmptyFinal => "empty_final",
            DiagnosticCode::ToolCallError => "tool_call_error",
            DiagnosticCode::MissingToolName => "missing_tool_name",
            DiagnosticCode::InvalidTool => "invalid_tool",
            DiagnosticCode::InvalidArguments => "invalid_arguments",
            DiagnosticCode::ToolRuntimeError => "tool_runtime_error",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
struct DiagnosticError {
    code: DiagnosticCode,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
struct Policy {
    planning_requires_tools: bool,
    final_response_must_be_plain_text: bool,
}

/// One internal diagnostic. Field order is the wire order.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    #[serde(rename = "__internal")]
    internal: bool,
    visible_to_user: bool,
    ok: bool,
    error: DiagnosticError,
    policy: Policy,
    allowed_tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, allowed_tools: Vec<String>) -> Self {
        Self {
            internal: true,
            visible_to_user: false,
            ok: false,
            error: DiagnosticError {
                code,
                message: message.into(),
            },
            policy: Policy {
                planning_requires_tools: true,
                final_response_must_be_plain_text: true,
            },
            allowed_tools,
            hint: None,
            tool: None,
            tool_call_id: None,
            action_index: None,
            arguments: None,
            exception: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Attach the offending call's id and position within the action.
    pub fn with_call(mut self, call_id: impl Into<String>, action_index: usize) -> Self {
        self.tool_call_id = Some(call_id.into());
        self.action_index = Some(action_index);
        self
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn code(&self) -> DiagnosticCode {
        self.error.code
    }

    /// The observation text handed to the model.
    pub fn to_json(&self) -> String {
        to_python_json(self).unwrap_or_default()
    }
}

/// True when an observation is an internal diagnostic payload.
pub fn is_internal(observation: &str) -> bool {
    let trimmed = observation.trim_start();
    if !trimmed.starts_with('{') {
        return false;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|v| v.get("__internal").and_then(Value::as_bool))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_layout() {
        let text = Diagnostic::new(DiagnosticCode::EmptyFinal, "empty", vec!["commentary".into()])
            .with_hint("say something")
            .to_json();
        assert_eq!(
            text,
            concat!(
                r#"{"__internal": true, "visible_to_user": false, "ok": false, "#,
                r#""error": {"code": "empty_final", "message": "empty"}, "#,
                r#""policy": {"planning_requires_tools": true, "final_response_must_be_plain_text": true}, "#,
                r#""allowed_tools": ["commentary"], "hint": "say something"}"#,
            )
        );
    }

    #[test]
    fn optional_fields_follow_in_order() {
        let value: Value = serde_json::from_str(
            &Diagnostic::new(DiagnosticCode::ToolRuntimeError, "boom", vec![])
                .with_hint("retry")
                .with_tool("final")
                .with_call("call_2", 1)
                .with_exception("bad input")
                .to_json(),
        )
        .unwrap();
        assert_eq!(value["error"]["code"], "tool_runtime_error");
        assert_eq!(value["tool"], "final");
        assert_eq!(value["tool_call_id"], "call_2");
        assert_eq!(value["action_index"], 1);
        assert_eq!(value["exception"], "bad input");
        assert!(value.get("arguments").is_none());
    }

    #[test]
    fn detects_internal_payloads() {
        let diag = Diagnostic::new(DiagnosticCode::InvalidTool, "nope", vec![])
            .with_arguments(json!({"q": 1}))
            .to_json();
        assert!(is_internal(&diag));
        assert!(!is_internal(r#"{"ok": true}"#));
        assert!(!is_internal("plain tool output"));
    }
}
