//! File-backed checkpoint store
//!
//! One pretty-printed JSON document per session. Writes go to a temporary
//! file that is renamed over the target, so readers see either the old or
//! the new version and never a torn one.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{Checkpoint, CheckpointStore, SessionId};
use crate::error::{AgentError, Result};
use crate::message::Message;

pub struct FileCheckpointStore {
    base_path: PathBuf,
    /// Serialises compare-and-swap between writers in this process
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    /// Create a new file store rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn session_path(&self, session_id: &SessionId) -> Result<PathBuf> {
        validate_session_id(session_id.as_str())?;
        Ok(self.base_path.join(format!("{session_id}.json")))
    }

    async fn read(&self, session_id: &SessionId) -> Result<Option<Checkpoint>> {
        let path = self.session_path(session_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AgentError::Storage(format!("{}: {e}", path.display()))),
        };
        let checkpoint = serde_json::from_str(&content)
            .map_err(|e| AgentError::Storage(format!("corrupt checkpoint {}: {e}", path.display())))?;
        Ok(Some(checkpoint))
    }

    async fn write(&self, checkpoint: &Checkpoint) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        let path = self.session_path(&checkpoint.session_id)?;
        let content = serde_json::to_string_pretty(checkpoint)?;

        let tmp_path = self.base_path.join(format!(
            ".{}.{}.tmp",
            checkpoint.session_id,
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(AgentError::Storage(format!("{}: {e}", path.display())));
        }
        Ok(())
    }
}

/// Reject ids that cannot be used verbatim as a file name
fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(AgentError::InvalidSessionId("session id cannot be empty".into()));
    }
    if id.contains(['/', '\\', '\0']) || id.contains("..") || id.starts_with('.') {
        return Err(AgentError::InvalidSessionId(format!(
            "session id contains invalid characters: {id:?}"
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(AgentError::InvalidSessionId(format!(
            "session id contains control characters: {id:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, session_id: &SessionId) -> Result<Checkpoint> {
        Ok(self
            .read(session_id)
            .await?
            .unwrap_or_else(|| Checkpoint::empty(session_id.clone())))
    }

    async fn save(
        &self,
        session_id: &SessionId,
        messages: &[Message],
        expected: u64,
    ) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let actual = self.read(session_id).await?.map_or(0, |c| c.version);
        if actual != expected {
            return Err(AgentError::VersionConflict { expected, actual });
        }

        let checkpoint = Checkpoint {
            session_id: session_id.clone(),
            messages: messages.to_vec(),
            version: expected + 1,
        };
        self.write(&checkpoint).await?;
        tracing::debug!(session_id = %session_id, version = checkpoint.version, "Checkpoint written");
        Ok(checkpoint.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::from_string("s3");

        {
            let store = FileCheckpointStore::new(dir.path());
            let version = store
                .save(&id, &[Message::user("my name is Alice"), Message::assistant("Hi Alice")], 0)
                .await
                .unwrap();
            assert_eq!(version, 1);
        }

        let reopened = FileCheckpointStore::new(dir.path());
        let loaded = reopened.load(&id).await.unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.messages[0].content, "my name is Alice");
        assert_eq!(loaded.messages[1].content, "Hi Alice");
    }

    #[tokio::test]
    async fn test_missing_directory_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("not-yet"));

        let loaded = store.load(&SessionId::from_string("fresh")).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let id = SessionId::from_string("s1");

        store.save(&id, &[Message::user("first")], 0).await.unwrap();
        let err = store.save(&id, &[Message::user("second")], 0).await.unwrap_err();
        assert!(matches!(err, AgentError::VersionConflict { expected: 0, actual: 1 }));

        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].content, "first");
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        for bad in ["../escape", "a/b", "", ".hidden"] {
            let result = store.load(&SessionId::from_string(bad)).await;
            assert!(
                matches!(result, Err(AgentError::InvalidSessionId(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let id = SessionId::from_string("s1");
        store.save(&id, &[Message::user("x")], 0).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["s1.json"]);
    }
}
