//! Turn Executor
//!
//! Runs one tool invocation against the registry and always produces a
//! [`ToolResult`] for it. Every failure, including a timeout, becomes data
//! the reasoning engine can see on its next decision.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::tool::{ToolInvocation, ToolRegistry, ToolResult};

pub struct TurnExecutor {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
}

impl TurnExecutor {
    pub const fn new(tools: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { tools, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Execute one invocation to completion or failure
    pub async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.tools.invoke(&invocation.name, &invocation.arguments),
        )
        .await;

        let result = match outcome {
            Ok(Ok(payload)) => ToolResult::success(invocation, payload),
            Ok(Err(e)) => {
                if !e.is_tool_level() {
                    tracing::warn!(tool = %invocation.name, error = %e, "Tool raised a non tool-level error");
                }
                ToolResult::failure(invocation, failure_reason(&e))
            }
            Err(_) => ToolResult::failure(
                invocation,
                format!(
                    "tool '{}' timed out after {}ms",
                    invocation.name,
                    self.timeout.as_millis()
                ),
            ),
        };

        tracing::debug!(
            tool = %invocation.name,
            invocation_id = %invocation.id,
            success = result.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool invocation finished"
        );
        result
    }
}

/// Tool-level errors carry their own reason; anything else keeps its display form
fn failure_reason(err: &crate::AgentError) -> String {
    match err {
        crate::AgentError::Invocation(reason) => reason.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgentError, Result};
    use crate::tool::{Tool, ToolSchema};
    use async_trait::async_trait;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "slow".into(),
                description: "Sleeps for a minute".into(),
                parameters: vec![],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, _arguments: &serde_json::Value) -> Result<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(serde_json::json!("done"))
        }
    }

    struct DivideTool;

    #[async_trait]
    impl Tool for DivideTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "divide".into(),
                description: "a / b".into(),
                parameters: vec![],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, arguments: &serde_json::Value) -> Result<serde_json::Value> {
            let a = arguments["a"].as_f64().unwrap_or_default();
            let b = arguments["b"].as_f64().unwrap_or_default();
            if b == 0.0 {
                return Err(AgentError::Invocation("division by zero".into()));
            }
            Ok(serde_json::json!(a / b))
        }
    }

    fn executor(timeout: Duration) -> TurnExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool).unwrap();
        registry.register(DivideTool).unwrap();
        TurnExecutor::new(Arc::new(registry), timeout)
    }

    #[tokio::test]
    async fn test_success_is_tied_to_invocation() {
        let exec = executor(Duration::from_secs(1));
        let call = ToolInvocation::new("c7", "divide", serde_json::json!({"a": 9, "b": 3}));

        let result = exec.execute(&call).await;
        assert!(result.success);
        assert_eq!(result.invocation_id, "c7");
        assert_eq!(result.payload, Some(serde_json::json!(3.0)));
    }

    #[tokio::test]
    async fn test_invocation_error_becomes_failed_result() {
        let exec = executor(Duration::from_secs(1));
        let call = ToolInvocation::new("c1", "divide", serde_json::json!({"a": 1, "b": 0}));

        let result = exec.execute(&call).await;
        assert!(!result.success);
        assert_eq!(result.reason.as_deref(), Some("division by zero"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_failed_result() {
        let exec = executor(Duration::from_secs(1));
        let call = ToolInvocation::new("c1", "teleport", serde_json::json!({}));

        let result = exec.execute(&call).await;
        assert!(!result.success);
        assert_eq!(result.reason.as_deref(), Some("Unknown tool: teleport"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_failed_result() {
        let exec = executor(Duration::from_millis(250));
        let call = ToolInvocation::new("c1", "slow", serde_json::json!({}));

        let result = exec.execute(&call).await;
        assert!(!result.success);
        assert_eq!(
            result.reason.as_deref(),
            Some("tool 'slow' timed out after 250ms")
        );
    }
}
