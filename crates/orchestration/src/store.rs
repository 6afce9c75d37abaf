//! Persistence collaborator for tasks and executions
//!
//! Durability is best-effort: callers log store failures and keep the
//! in-memory run authoritative. A durable backend plugs in behind the same
//! trait.

use async_trait::async_trait;
use std::collections::HashMap;
use swarmforge_common::{ExecutionId, Result, Task, TaskId, WorkflowExecution};
use tokio::sync::RwLock;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save_task(&self, task: &Task) -> Result<()>;
    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<()>;
    async fn load_tasks(&self, execution_id: ExecutionId) -> Result<Vec<Task>>;
    async fn load_execution(&self, execution_id: ExecutionId) -> Result<Option<WorkflowExecution>>;
}

/// Process-local store, also the test double
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
    executions: RwLock<HashMap<ExecutionId, WorkflowExecution>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save_task(&self, task: &Task) -> Result<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn load_tasks(&self, execution_id: ExecutionId) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut found: Vec<Task> = tasks
            .values()
            .filter(|t| t.execution_id == execution_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        Ok(found)
    }

    async fn load_execution(&self, execution_id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        Ok(self.executions.read().await.get(&execution_id).cloned())
    }
}
