//! Conversation Messages
//!
//! Standard message format persisted in checkpoints and handed to the
//! reasoning engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::tool::{ToolInvocation, ToolResult};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input
    User,
    /// Assistant (reasoning engine) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Tool invocations requested (assistant only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,

    /// Invocation this message resolves (tool only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,

    /// Structured payload (tool only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Whether the tool succeeded (tool only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role
            && self.content == other.content
            && self.tool_calls == other.tool_calls
            && self.invocation_id == other.invocation_id
            && self.data == other.data
            && self.success == other.success
    }
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            invocation_id: None,
            data: None,
            success: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool invocations
    pub fn assistant_with_calls(calls: Vec<ToolInvocation>) -> Self {
        let mut msg = Self::new(Role::Assistant, String::new());
        msg.tool_calls = calls;
        msg
    }

    /// Create a tool result message
    pub fn tool_result(result: &ToolResult) -> Self {
        let mut msg = Self::new(Role::Tool, result.render());
        msg.invocation_id = Some(result.invocation_id.clone());
        msg.data.clone_from(&result.payload);
        msg.success = Some(result.success);
        msg
    }

    /// Whether this assistant message requests tools
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Conversation history with utility methods
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a tool result, enforcing that it resolves a pending invocation
    pub fn push_tool_result(&mut self, result: &ToolResult) -> Result<()> {
        if !self.pending_invocations().contains(&result.invocation_id.as_str()) {
            return Err(AgentError::AdapterContract(format!(
                "tool result for unknown or already resolved invocation '{}'",
                result.invocation_id
            )));
        }
        self.messages.push(Message::tool_result(result));
        Ok(())
    }

    /// Invocation ids of the latest assistant message that have no result yet
    pub fn pending_invocations(&self) -> Vec<&str> {
        let Some(pos) = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::Assistant)
        else {
            return Vec::new();
        };

        let resolved: Vec<&str> = self.messages[pos + 1..]
            .iter()
            .filter_map(|m| m.invocation_id.as_deref())
            .collect();

        self.messages[pos]
            .tool_calls
            .iter()
            .map(|c| c.id.as_str())
            .filter(|id| !resolved.contains(id))
            .collect()
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Drop everything after the first `len` messages
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc(id: &str) -> ToolInvocation {
        ToolInvocation::new(id, "calculator", serde_json::json!({"expr": "1+1"}))
    }

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_pending_invocations() {
        let mut conv = Conversation::new();
        conv.push(Message::user("Hi"));
        assert!(conv.pending_invocations().is_empty());

        conv.push(Message::assistant_with_calls(vec![calc("c1"), calc("c2")]));
        assert_eq!(conv.pending_invocations(), vec!["c1", "c2"]);

        conv.push_tool_result(&ToolResult::success(&calc("c1"), serde_json::json!(2)))
            .unwrap();
        assert_eq!(conv.pending_invocations(), vec!["c2"]);
    }

    #[test]
    fn test_tool_result_must_reference_pending_invocation() {
        let mut conv = Conversation::new();
        conv.push(Message::assistant_with_calls(vec![calc("c1")]));

        let stray = ToolResult::success(&calc("zz"), serde_json::json!(0));
        assert!(conv.push_tool_result(&stray).is_err());

        let ok = ToolResult::failure(&calc("c1"), "division by zero");
        conv.push_tool_result(&ok).unwrap();
        assert!(conv.push_tool_result(&ok).is_err(), "resolved twice");

        let last = conv.last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.success, Some(false));
        assert_eq!(last.content, "division by zero");
    }

    #[test]
    fn test_serde_round_trip_preserves_history() {
        let mut conv = Conversation::new();
        conv.push(Message::user("Calculate 25 * 4"));
        conv.push(Message::assistant_with_calls(vec![calc("c1")]));
        conv.push_tool_result(&ToolResult::success(&calc("c1"), serde_json::json!(100)))
            .unwrap();

        let json = serde_json::to_string(&conv).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conv);
    }
}
