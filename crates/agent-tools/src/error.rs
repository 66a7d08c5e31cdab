//! Error Types for Built-in Tools

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("cannot evaluate expression: {0}")]
    Evaluation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Every tool failure reaches the loop as an invocation error, reported back to the engine
impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        Self::Invocation(err.to_string())
    }
}

/// Fetch a string argument under its name or any alias
pub(crate) fn str_arg<'a>(
    arguments: &'a serde_json::Value,
    name: &'static str,
    aliases: &[&str],
) -> Result<&'a str> {
    std::iter::once(name)
        .chain(aliases.iter().copied())
        .find_map(|key| arguments.get(key).and_then(serde_json::Value::as_str))
        .ok_or(ToolError::MissingArgument(name))
}

/// Fetch a positive integer id, accepting either a number or a numeric string
pub(crate) fn id_arg(arguments: &serde_json::Value, name: &'static str) -> Result<u64> {
    let value = arguments.get(name).ok_or(ToolError::MissingArgument(name))?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| ToolError::InvalidArgument(format!("{name} must be a positive integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_invocation_error() {
        let err: AgentError = ToolError::DivisionByZero.into();
        assert!(matches!(err, AgentError::Invocation(ref msg) if msg == "division by zero"));
    }

    #[test]
    fn test_argument_helpers() {
        let args = serde_json::json!({"expression": "1+1", "id": "7"});
        assert_eq!(str_arg(&args, "expr", &["expression"]).unwrap(), "1+1");
        assert_eq!(id_arg(&args, "id").unwrap(), 7);
        assert!(matches!(
            str_arg(&args, "title", &[]),
            Err(ToolError::MissingArgument("title"))
        ));
    }
}
