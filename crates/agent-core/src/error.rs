//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Reasoning engine unreachable, timed out, or returned a transport error
    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Reasoning engine returned a malformed or empty decision
    #[error("Adapter contract violated: {0}")]
    AdapterContract(String),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool registered twice under the same name
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    /// Tool arguments failed schema validation
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool-level failure, fed back to the reasoning engine
    #[error("Invocation error: {0}")]
    Invocation(String),

    /// Another writer advanced the checkpoint first
    #[error("Version conflict: expected {expected}, actual {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    /// Checkpoint storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Session id unusable by the store
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable by the caller (the loop itself never retries)
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AdapterUnavailable(_) | Self::VersionConflict { .. } | Self::Io(_)
        )
    }

    /// Tool-level failures are recovered inside the loop; everything else aborts a turn
    pub const fn is_tool_level(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_) | Self::ToolValidation(_) | Self::Invocation(_)
        )
    }

    /// Stable machine-readable code for the transport layer
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AdapterUnavailable(_) => "ADAPTER_UNAVAILABLE",
            Self::AdapterContract(_) => "ADAPTER_CONTRACT",
            Self::UnknownTool(_) => "UNKNOWN_TOOL",
            Self::DuplicateTool(_) => "DUPLICATE_TOOL",
            Self::ToolValidation(_) => "TOOL_VALIDATION",
            Self::Invocation(_) => "INVOCATION_ERROR",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::Storage(_) | Self::Io(_) | Self::Json(_) => "STORAGE_ERROR",
            Self::InvalidSessionId(_) => "INVALID_SESSION_ID",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::AdapterUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::AdapterContract(_) => "The AI service returned an unusable response.".into(),
            Self::UnknownTool(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::Invocation(msg) => format!("Tool error: {msg}"),
            Self::VersionConflict { .. } => {
                "This conversation was updated by another request. Please retry.".into()
            }
            Self::InvalidSessionId(id) => format!("Invalid session id: {id}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
