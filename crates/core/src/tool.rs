//! Tool trait: the abstraction over environment capabilities.
//!
//! Tools are what the model can call from inside an environment: post a
//! status update, submit a final answer, query a retriever, etc. Their
//! whole effect is described by the string they return.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, ToolError};

/// A tool definition rendered into the prompt so the model knows what it
/// can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// OpenAI function-tool manifest:
    /// `{"type": "function", "function": {name, description, parameters}}`.
    pub fn to_manifest(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in a [`ToolCatalog`]
/// owned by an environment.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "commentary", "final").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Invoke the tool with validated arguments.
    async fn invoke(&self, arguments: &Map<String, Value>) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for the prompt.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// Argument keys listed under `required` in the schema.
    fn required_arguments(&self) -> Vec<String> {
        self.parameters_schema()
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| k.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// An ordered set of tools available in one environment.
///
/// Registration order is preserved so the rendered manifest is stable.
/// Tools are reference counted; a catalog can be cloned and shared
/// across sessions.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, failing on duplicate names.
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<Self, Error> {
        let mut catalog = Self::new();
        for tool in tools {
            catalog.register(tool)?;
        }
        Ok(catalog)
    }

    /// Register a tool. Duplicate names are a configuration error.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), Error> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::config(format!("Tool '{name}' already exists.")));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// All tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn invoke(&self, arguments: &Map<String, Value>) -> std::result::Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str { self.0 }
        fn description(&self) -> &str { "noop" }
        fn parameters_schema(&self) -> Value { serde_json::json!({"type": "object"}) }
        async fn invoke(&self, _arguments: &Map<String, Value>) -> std::result::Result<String, ToolError> {
            Ok(String::new())
        }
    }

    #[test]
    fn catalog_register_and_lookup() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Arc::new(EchoTool)).unwrap();
        assert!(catalog.get("echo").is_some());
        assert!(catalog.get("nonexistent").is_none());
        assert!(catalog.contains("echo"));
    }

    #[test]
    fn catalog_rejects_duplicates() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Arc::new(EchoTool)).unwrap();
        let err = catalog.register(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn catalog_preserves_registration_order() {
        let catalog = ToolCatalog::from_tools([
            Arc::new(NamedTool("zeta")) as Arc<dyn Tool>,
            Arc::new(NamedTool("alpha")),
            Arc::new(NamedTool("mid")),
        ])
        .unwrap();
        assert_eq!(catalog.names(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn definition_manifest_shape() {
        let manifest = EchoTool.to_definition().to_manifest();
        assert_eq!(manifest["type"], "function");
        assert_eq!(manifest["function"]["name"], "echo");
        assert_eq!(manifest["function"]["parameters"]["required"][0], "text");
    }

    #[test]
    fn required_arguments_from_schema() {
        assert_eq!(EchoTool.required_arguments(), vec!["text".to_string()]);
        assert!(NamedTool("x").required_arguments().is_empty());
    }

    #[tokio::test]
    async fn invoke_echo_tool() {
        let catalog = ToolCatalog::from_tools([Arc::new(EchoTool) as Arc<dyn Tool>]).unwrap();
        let mut args = Map::new();
        args.insert("text".into(), Value::String("hello world".into()));
        let output = catalog.get("echo").unwrap().invoke(&args).await.unwrap();
        assert_eq!(output, "hello world");
    }
}
