//! Checkpoint Store
//!
//! Durable, versioned session history. The loop controller loads a
//! checkpoint at the start of a turn and writes exactly one new version when
//! the turn ends; the store rejects a write whose expected version is stale.

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::message::Message;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Use the caller's id when present, otherwise generate one
    pub fn or_generate(s: Option<String>) -> Self {
        s.filter(|s| !s.trim().is_empty())
            .map_or_else(Self::new, Self::from_string)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Versioned snapshot of one session's history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: SessionId,
    pub messages: Vec<Message>,
    /// 0 means nothing has ever been written for this session
    pub version: u64,
}

impl Checkpoint {
    /// Sentinel returned for a session that has never been saved
    pub const fn empty(session_id: SessionId) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            version: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.version == 0
    }
}

/// Persistence contract for session history
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest checkpoint, or [`Checkpoint::empty`] for an unknown session
    async fn load(&self, session_id: &SessionId) -> Result<Checkpoint>;

    /// Replace the history if the stored version still equals `expected`.
    ///
    /// Returns the new version (`expected + 1`) or
    /// [`AgentError::VersionConflict`](crate::AgentError::VersionConflict).
    async fn save(
        &self,
        session_id: &SessionId,
        messages: &[Message],
        expected: u64,
    ) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_generation() {
        let given = SessionId::or_generate(Some("s1".into()));
        assert_eq!(given.as_str(), "s1");

        let blank = SessionId::or_generate(Some("  ".into()));
        assert_eq!(blank.as_str().len(), 36);
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_session_id_serializes_as_string() {
        let json = serde_json::to_string(&SessionId::from_string("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
