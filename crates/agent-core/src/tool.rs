//! Tool System
//!
//! Named capabilities the reasoning engine may invoke. Tools are registered
//! once at startup; the registry is then shared read-only across sessions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool invocation request emitted by the reasoning engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation id, assigned by the reasoning adapter and never rewritten
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Structured arguments
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of exactly one tool invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Invocation this result resolves
    pub invocation_id: String,

    /// Tool that was called
    pub tool_name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Structured payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Failure reason on error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ToolResult {
    pub fn success(invocation: &ToolInvocation, payload: serde_json::Value) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            success: true,
            payload: Some(payload),
            reason: None,
        }
    }

    pub fn failure(invocation: &ToolInvocation, reason: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            success: false,
            payload: None,
            reason: Some(reason.into()),
        }
    }

    /// Text form of the outcome, used as tool-result message content
    pub fn render(&self) -> String {
        match (&self.payload, &self.reason) {
            (Some(serde_json::Value::String(s)), _) => s.clone(),
            (Some(value), _) => value.to_string(),
            (None, Some(reason)) => reason.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
}

impl ParameterSchema {
    /// Required parameter of the given JSON type
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    /// Optional parameter of the given JSON type
    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<serde_json::Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Tool definition schema advertised to the reasoning engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with structured arguments.
    ///
    /// Tool-level failures should be reported as [`AgentError::Invocation`].
    async fn execute(&self, arguments: &serde_json::Value) -> Result<serde_json::Value>;

    /// Validate arguments before execution (optional)
    fn validate(&self, arguments: &serde_json::Value) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && arguments.get(&param.name).is_none() {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_shared(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        tracing::debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Invoke a tool by name
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;

        tool.validate(arguments)?;

        tool.execute(arguments).await
    }

    /// All tool schemas, ordered by name
    pub fn describe(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Get tool names, ordered
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Echo the text argument".into(),
                parameters: vec![ParameterSchema::required("text", "string", "Text to echo")],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, arguments: &serde_json::Value) -> Result<serde_json::Value> {
            Ok(arguments["text"].clone())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "fail".into(),
                description: "Always fails".into(),
                parameters: vec![],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, _arguments: &serde_json::Value) -> Result<serde_json::Value> {
            Err(AgentError::Invocation("nope".into()))
        }
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        let err = registry.register(EchoTool).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_describe_is_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(FailingTool).unwrap();
        registry.register(EchoTool).unwrap();

        let names: Vec<String> = registry.describe().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["echo", "fail"]);
        assert_eq!(registry.names(), vec!["echo", "fail"]);
    }

    #[tokio::test]
    async fn test_invoke() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        registry.register(FailingTool).unwrap();

        let out = registry
            .invoke("echo", &serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!("hi"));

        let missing = registry.invoke("echo", &serde_json::json!({})).await;
        assert!(matches!(missing, Err(AgentError::ToolValidation(_))));

        let unknown = registry.invoke("nope", &serde_json::json!({})).await;
        assert!(matches!(unknown, Err(AgentError::UnknownTool(_))));

        let failed = registry.invoke("fail", &serde_json::json!({})).await;
        assert!(matches!(failed, Err(AgentError::Invocation(reason)) if reason == "nope"));
    }
}
