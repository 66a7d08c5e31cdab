//! DateTime tool - returns current time

use async_trait::async_trait;

use agent_core::{Result as CoreResult, Tool, ToolSchema, tool::ParameterSchema};

use crate::error::ToolError;

pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "datetime".into(),
            description: "Get the current date and time (UTC)".into(),
            parameters: vec![
                ParameterSchema::optional("format", "string", "Output format: 'iso', 'human', or 'unix'")
                    .with_default(serde_json::json!("human"))
                    .with_enum(vec![
                        serde_json::json!("iso"),
                        serde_json::json!("human"),
                        serde_json::json!("unix"),
                    ]),
            ],
            category: Some("time".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, arguments: &serde_json::Value) -> CoreResult<serde_json::Value> {
        let format = arguments
            .get("format")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("human");

        let now = chrono::Utc::now();

        let output = match format {
            "iso" => serde_json::json!(now.to_rfc3339()),
            "unix" => serde_json::json!(now.timestamp()),
            "human" => serde_json::json!(now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string()),
            other => {
                return Err(ToolError::InvalidArgument(format!("unknown format '{other}'")).into());
            }
        };

        Ok(output)
    }
}
