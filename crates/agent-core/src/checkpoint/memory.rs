//! In-memory checkpoint store (for development/testing)

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Checkpoint, CheckpointStore, SessionId};
use crate::error::{AgentError, Result};
use crate::message::Message;

struct Entry {
    messages: Vec<Message>,
    version: u64,
}

#[derive(Default)]
pub struct MemoryCheckpointStore {
    sessions: RwLock<HashMap<SessionId, Entry>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with at least one saved version
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, session_id: &SessionId) -> Result<Checkpoint> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).map_or_else(
            || Checkpoint::empty(session_id.clone()),
            |entry| Checkpoint {
                session_id: session_id.clone(),
                messages: entry.messages.clone(),
                version: entry.version,
            },
        ))
    }

    async fn save(
        &self,
        session_id: &SessionId,
        messages: &[Message],
        expected: u64,
    ) -> Result<u64> {
        // Compare and swap under a single write lock
        let mut sessions = self.sessions.write().await;
        let actual = sessions.get(session_id).map_or(0, |e| e.version);
        if actual != expected {
            return Err(AgentError::VersionConflict { expected, actual });
        }

        let version = expected + 1;
        sessions.insert(
            session_id.clone(),
            Entry {
                messages: messages.to_vec(),
                version,
            },
        );
        tracing::debug!(session_id = %session_id, version, "Checkpoint saved");
        Ok(version)
    }
}
