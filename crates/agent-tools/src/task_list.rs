//! Task List Tool
//!
//! A small to-do list the agent can manage: add, list, complete, remove.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use agent_core::{Result as CoreResult, Tool, ToolSchema, tool::ParameterSchema};

use crate::error::{Result, ToolError, id_arg, str_arg};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct TaskBook {
    next_id: u64,
    tasks: BTreeMap<u64, Task>,
}

/// Tool for tracking tasks
#[derive(Default)]
pub struct TaskListTool {
    book: Arc<RwLock<TaskBook>>,
}

impl TaskListTool {
    pub fn new() -> Self {
        Self::default()
    }

    async fn add(&self, title: &str) -> Result<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ToolError::InvalidArgument("title cannot be empty".into()));
        }

        let mut book = self.book.write().await;
        book.next_id += 1;
        let task = Task {
            id: book.next_id,
            title: title.to_string(),
            done: false,
            created_at: Utc::now(),
        };
        book.tasks.insert(task.id, task.clone());
        tracing::debug!(task_id = task.id, "Task added");
        Ok(task)
    }

    async fn list(&self) -> Vec<Task> {
        self.book.read().await.tasks.values().cloned().collect()
    }

    async fn complete(&self, id: u64) -> Result<Task> {
        let mut book = self.book.write().await;
        let task = book
            .tasks
            .get_mut(&id)
            .ok_or_else(|| ToolError::NotFound(format!("task {id}")))?;
        task.done = true;
        Ok(task.clone())
    }

    async fn remove(&self, id: u64) -> Result<Task> {
        self.book
            .write()
            .await
            .tasks
            .remove(&id)
            .ok_or_else(|| ToolError::NotFound(format!("task {id}")))
    }
}

#[async_trait]
impl Tool for TaskListTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "task_list".into(),
            description: "Manage a to-do list: add tasks, list them, mark them complete, or remove them.".into(),
            parameters: vec![
                ParameterSchema::required("action", "string", "Action: 'add', 'list', 'complete', or 'remove'")
                    .with_enum(vec![
                        serde_json::json!("add"),
                        serde_json::json!("list"),
                        serde_json::json!("complete"),
                        serde_json::json!("remove"),
                    ]),
                ParameterSchema::optional("title", "string", "Task title (for add)"),
                ParameterSchema::optional("id", "integer", "Task id (for complete/remove)"),
            ],
            category: Some("productivity".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, arguments: &serde_json::Value) -> CoreResult<serde_json::Value> {
        let action = str_arg(arguments, "action", &[])?;

        let payload = match action {
            "add" => {
                let task = self.add(str_arg(arguments, "title", &[])?).await?;
                serde_json::to_value(task).map_err(ToolError::from)?
            }
            "list" => {
                let tasks = self.list().await;
                let open = tasks.iter().filter(|t| !t.done).count();
                serde_json::json!({ "tasks": tasks, "open": open })
            }
            "complete" => {
                let task = self.complete(id_arg(arguments, "id")?).await?;
                serde_json::to_value(task).map_err(ToolError::from)?
            }
            "remove" => {
                let task = self.remove(id_arg(arguments, "id")?).await?;
                serde_json::json!({ "removed": task.id })
            }
            other => {
                return Err(ToolError::InvalidArgument(format!("unknown action '{other}'")).into());
            }
        };

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::AgentError;

    #[tokio::test]
    async fn test_add_complete_list() {
        let tool = TaskListTool::new();

        let added = tool
            .execute(&serde_json::json!({"action": "add", "title": "buy milk"}))
            .await
            .unwrap();
        assert_eq!(added["id"], 1);
        assert_eq!(added["done"], false);

        tool.execute(&serde_json::json!({"action": "add", "title": "call Bob"}))
            .await
            .unwrap();
        tool.execute(&serde_json::json!({"action": "complete", "id": 1}))
            .await
            .unwrap();

        let listed = tool
            .execute(&serde_json::json!({"action": "list"}))
            .await
            .unwrap();
        assert_eq!(listed["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(listed["tasks"][0]["done"], true);
        assert_eq!(listed["open"], 1);
    }

    #[tokio::test]
    async fn test_remove_and_missing_ids() {
        let tool = TaskListTool::new();
        tool.execute(&serde_json::json!({"action": "add", "title": "x"}))
            .await
            .unwrap();

        let removed = tool
            .execute(&serde_json::json!({"action": "remove", "id": "1"}))
            .await
            .unwrap();
        assert_eq!(removed, serde_json::json!({"removed": 1}));

        let err = tool
            .execute(&serde_json::json!({"action": "complete", "id": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Invocation(ref m) if m == "task 1 not found"));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let tool = TaskListTool::new();
        for args in [
            serde_json::json!({"action": "add", "title": "   "}),
            serde_json::json!({"action": "add"}),
            serde_json::json!({"action": "explode"}),
            serde_json::json!({"action": "remove", "id": -3}),
        ] {
            assert!(tool.execute(&args).await.is_err(), "accepted {args}");
        }
    }
}
