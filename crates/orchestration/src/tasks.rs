//! Task manager: owns task records and their status transitions
//!
//! The in-memory map is authoritative for a live run; every mutation is also
//! pushed to the persistence collaborator best-effort. A store failure is
//! logged and never raised, so a flaky backend cannot stall the scheduler.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use swarmforge_common::{
    AgentId, ExecutionId, Result, SwarmError, Task, TaskDefinition, TaskId, TaskStatus,
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::store::TaskStore;

pub struct TaskManager {
    tasks: RwLock<HashMap<TaskId, Task>>,
    /// Creation order per execution, so listings are stable
    order: RwLock<Vec<TaskId>>,
    store: Arc<dyn TaskStore>,
}

impl TaskManager {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            store,
        }
    }

    /// Create one batch of tasks for an execution
    ///
    /// Symbolic dependency references (definition task types) are resolved to
    /// the fresh task ids within the batch; a reference that matches nothing
    /// in the batch is rejected, since every dependency must identify another
    /// task in the same execution.
    pub async fn create_tasks(
        &self,
        execution_id: ExecutionId,
        definitions: &[TaskDefinition],
    ) -> Result<Vec<Task>> {
        let mut created: Vec<Task> = definitions
            .iter()
            .map(|def| Task::from_definition(execution_id, def))
            .collect();

        let by_type: HashMap<&str, TaskId> = definitions
            .iter()
            .zip(created.iter())
            .map(|(def, task)| (def.task_type.as_str(), task.id))
            .collect();

        for (def, task) in definitions.iter().zip(created.iter_mut()) {
            for dep_ref in &def.dependencies {
                let dep_id = by_type.get(dep_ref.as_str()).ok_or_else(|| {
                    SwarmError::UnknownDependency {
                        task_type: def.task_type.clone(),
                        dependency: dep_ref.clone(),
                    }
                })?;
                task.dependencies.push(*dep_id);
            }
        }

        let mut tasks = self.tasks.write().await;
        let mut order = self.order.write().await;
        for task in &created {
            tasks.insert(task.id, task.clone());
            order.push(task.id);
            self.persist(task).await;
        }

        debug!(
            "Created {} tasks for execution {}",
            created.len(),
            execution_id
        );
        Ok(created)
    }

    /// Advance a task along the forward-only status lattice
    ///
    /// `result` is stored on terminal transitions; the actual duration is
    /// measured from the moment the task entered `in_progress`.
    pub async fn update_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        result: Option<Value>,
    ) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(SwarmError::TaskNotFound(task_id))?;

        if !task.status.can_transition_to(status) {
            return Err(SwarmError::InvalidTransition {
                task: task_id,
                from: task.status,
                to: status,
            });
        }

        let now = Utc::now();
        if status.is_terminal() {
            // updated_at was last stamped when the task entered in_progress
            let elapsed = (now - task.updated_at).num_milliseconds().max(0) as u64;
            task.actual_duration_ms = Some(elapsed);
            if let Some(result) = result {
                task.result = Some(result);
            }
        }
        task.status = status;
        task.updated_at = now;

        let snapshot = task.clone();
        drop(tasks);
        self.persist(&snapshot).await;
        Ok(snapshot)
    }

    /// Record (or clear) the agent assignment for a task
    pub async fn assign_agent(&self, task_id: TaskId, agent: Option<AgentId>) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(SwarmError::TaskNotFound(task_id))?;
        task.assigned_agent = agent;
        task.updated_at = Utc::now();

        let snapshot = task.clone();
        drop(tasks);
        self.persist(&snapshot).await;
        Ok(())
    }

    pub async fn get_task(&self, task_id: TaskId) -> Option<Task> {
        self.tasks.read().await.get(&task_id).cloned()
    }

    /// All tasks of an execution, in creation order
    pub async fn get_tasks(&self, execution_id: ExecutionId) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let order = self.order.read().await;
        order
            .iter()
            .filter_map(|id| tasks.get(id))
            .filter(|t| t.execution_id == execution_id)
            .cloned()
            .collect()
    }

    pub async fn get_tasks_by_agent(&self, agent_id: &AgentId) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let order = self.order.read().await;
        order
            .iter()
            .filter_map(|id| tasks.get(id))
            .filter(|t| t.assigned_agent.as_ref() == Some(agent_id))
            .cloned()
            .collect()
    }

    async fn persist(&self, task: &Task) {
        if let Err(e) = self.store.save_task(task).await {
            warn!("Failed to persist task {}: {}", task.id, e);
        }
    }
}
