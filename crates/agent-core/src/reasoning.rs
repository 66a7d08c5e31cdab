//! Reasoning Adapter
//!
//! The loop only ever asks one question of the reasoning engine: given the
//! history and the advertised tools, answer or act?
//!
//! [`PromptedReasoner`] answers it with any plain-text [`LlmProvider`] by
//! describing the tools in a system prompt and parsing fenced ```` ```tool ````
//! blocks out of the reply.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::provider::{GenerationOptions, LlmProvider, PromptMessage};
use crate::tool::{ToolInvocation, ToolSchema};

/// What the reasoning engine wants to do next
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    /// Stop and answer the user
    FinalAnswer(String),
    /// Run these tools, in this order, then ask again
    ToolInvocations(Vec<ToolInvocation>),
}

/// Reasoning capability consumed by the loop controller
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Decide on the next step.
    ///
    /// Fails with [`AgentError::AdapterUnavailable`] or [`AgentError::AdapterContract`].
    async fn decide(&self, history: &[Message], tools: &[ToolSchema]) -> Result<Decision>;
}

const TOOL_FENCE: &str = "```tool";
const FENCE_END: &str = "```";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant.

When you need to use a tool, respond with one JSON block per call in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

Several blocks in one reply are executed in order. After receiving tool
results, synthesize them into a helpful response.
If you can answer directly without tools, do so.
Be concise and accurate."#;

/// Text-protocol adapter over an [`LlmProvider`]
pub struct PromptedReasoner {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    system_prompt: String,
}

impl PromptedReasoner {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self {
            provider,
            options,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Build the full system prompt including tool descriptions
    fn build_system_prompt(&self, tools: &[ToolSchema]) -> String {
        let mut prompt = self.system_prompt.clone();

        if !tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&tool_prompt_section(tools));
        }

        prompt
    }

    /// Render history in provider terms; tool results appear as user context.
    ///
    /// Invocation ids stay out of the prompt: they are minted per reply.
    fn build_prompt(&self, history: &[Message], tools: &[ToolSchema]) -> Vec<PromptMessage> {
        let mut prompt = Vec::with_capacity(history.len() + 1);
        prompt.push(PromptMessage::system(self.build_system_prompt(tools)));

        let mut tool_names: HashMap<&str, &str> = HashMap::new();

        for message in history {
            match message.role {
                Role::User => prompt.push(PromptMessage::user(&message.content)),
                Role::Assistant if message.has_tool_calls() => {
                    for call in &message.tool_calls {
                        tool_names.insert(call.id.as_str(), call.name.as_str());
                    }
                    prompt.push(PromptMessage::assistant(render_tool_calls(
                        &message.content,
                        &message.tool_calls,
                    )));
                }
                Role::Assistant => prompt.push(PromptMessage::assistant(&message.content)),
                Role::Tool => {
                    let id = message.invocation_id.as_deref().unwrap_or_default();
                    let name = tool_names.get(id).copied().unwrap_or("unknown");
                    let verb = if message.success == Some(false) { "failed" } else { "returned" };
                    prompt.push(PromptMessage::user(format!(
                        "[Tool '{name}' {verb}]\n{}",
                        message.content
                    )));
                }
            }
        }

        prompt
    }
}

#[async_trait]
impl ReasoningEngine for PromptedReasoner {
    async fn decide(&self, history: &[Message], tools: &[ToolSchema]) -> Result<Decision> {
        let prompt = self.build_prompt(history, tools);

        let completion = self
            .provider
            .complete(&prompt, &self.options)
            .await
            .map_err(|e| match e {
                AgentError::AdapterContract(_) | AgentError::AdapterUnavailable(_) => e,
                other => AgentError::AdapterUnavailable(other.to_string()),
            })?;

        parse_decision(&completion.content)
    }
}

/// Generate system prompt section describing available tools
pub fn tool_prompt_section(tools: &[ToolSchema]) -> String {
    use std::fmt::Write;

    let mut prompt = String::from("## Available Tools\n\n");

    for schema in tools {
        let _ = writeln!(prompt, "### {}", schema.name);
        let _ = writeln!(prompt, "{}", schema.description);

        if !schema.parameters.is_empty() {
            prompt.push_str("**Parameters:**\n");
            for param in &schema.parameters {
                let required = if param.required { " (required)" } else { "" };
                let _ = writeln!(
                    prompt,
                    "- `{}` ({}){}: {}",
                    param.name, param.param_type, required, param.description
                );
            }
        }
        prompt.push('\n');
    }

    prompt
}

fn render_tool_calls(preamble: &str, calls: &[ToolInvocation]) -> String {
    let mut out = String::from(preamble);
    for call in calls {
        let block = serde_json::json!({
            "tool": call.name,
            "arguments": call.arguments,
        });
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(TOOL_FENCE);
        out.push('\n');
        out.push_str(&block.to_string());
        out.push('\n');
        out.push_str(FENCE_END);
    }
    out
}

#[derive(Deserialize)]
struct RawToolCall {
    #[serde(alias = "name")]
    tool: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Parse a model reply into a decision.
///
/// Fenced tool blocks win over surrounding prose; a block that is not valid
/// JSON is a contract violation rather than a silent final answer. Every
/// block gets a fresh invocation id, whatever the model wrote.
pub fn parse_decision(content: &str) -> Result<Decision> {
    let mut invocations = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find(TOOL_FENCE) {
        let after_marker = &rest[start + TOOL_FENCE.len()..];
        let end = after_marker.find(FENCE_END).ok_or_else(|| {
            AgentError::AdapterContract("unterminated tool block".into())
        })?;

        let json_str = after_marker[..end].trim();
        let raw: RawToolCall = serde_json::from_str(json_str).map_err(|e| {
            AgentError::AdapterContract(format!("invalid tool block: {e}"))
        })?;

        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        let arguments = if raw.arguments.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            raw.arguments
        };
        invocations.push(ToolInvocation::new(id, raw.tool, arguments));

        rest = &after_marker[end + FENCE_END.len()..];
    }

    if !invocations.is_empty() {
        return Ok(Decision::ToolInvocations(invocations));
    }

    let text = content.trim();
    if text.is_empty() {
        return Err(AgentError::AdapterContract(
            "reply contained neither text nor tool calls".into(),
        ));
    }

    Ok(Decision::FinalAnswer(text.to_string()))
}
