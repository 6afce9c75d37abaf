use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use strum_macros::{Display, EnumIter};
use uuid::Uuid;

/// Unique identifier for tasks
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for one end-to-end run of a task graph
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for agents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Task priority levels
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Task lifecycle status
///
/// Transitions only advance forward: `Pending -> InProgress -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the forward-only status lattice allows moving to `next`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// A task definition as produced by the reasoning service
///
/// Dependencies are symbolic references to other definitions in the same
/// decomposition (by task type); they are resolved to real task ids when the
/// batch is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_type: String,
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_estimated_duration_ms")]
    pub estimated_duration_ms: u64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

fn default_estimated_duration_ms() -> u64 {
    5_000
}

impl TaskDefinition {
    pub fn new(task_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            description: description.into(),
            priority: TaskPriority::default(),
            dependencies: Vec::new(),
            estimated_duration_ms: default_estimated_duration_ms(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimated_duration_ms(mut self, ms: u64) -> Self {
        self.estimated_duration_ms = ms;
        self
    }
}

/// A unit of work with a type, dependencies, and a terminal outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub execution_id: ExecutionId,
    pub task_type: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskId>,
    pub assigned_agent: Option<AgentId>,
    pub result: Option<Value>,
    pub estimated_duration_ms: u64,
    pub actual_duration_ms: Option<u64>,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn from_definition(execution_id: ExecutionId, def: &TaskDefinition) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            execution_id,
            task_type: def.task_type.clone(),
            description: def.description.clone(),
            priority: def.priority,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            assigned_agent: None,
            result: None,
            estimated_duration_ms: def.estimated_duration_ms,
            actual_duration_ms: None,
            metadata: def.metadata.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Agent availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Offline,
    Paused,
}

impl AgentStatus {
    pub fn is_active(self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Busy)
    }
}

/// Rolling performance metrics per agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub success_rate: f64,
    pub avg_execution_ms: f64,
}

impl AgentMetrics {
    pub fn record_success(&mut self, duration_ms: u64) {
        self.tasks_completed += 1;
        self.fold_duration(duration_ms);
        self.refresh_rate();
    }

    pub fn record_failure(&mut self, duration_ms: u64) {
        self.tasks_failed += 1;
        self.fold_duration(duration_ms);
        self.refresh_rate();
    }

    fn fold_duration(&mut self, duration_ms: u64) {
        let total = self.tasks_completed + self.tasks_failed;
        // running mean over every finished task
        self.avg_execution_ms =
            (self.avg_execution_ms * (total - 1) as f64 + duration_ms as f64) / total as f64;
    }

    fn refresh_rate(&mut self) {
        let total = self.tasks_completed + self.tasks_failed;
        self.success_rate = self.tasks_completed as f64 / total as f64;
    }
}

/// A capability-bearing worker entity to which tasks are delegated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    pub agent_type: String,
    pub capabilities: Vec<String>,
    pub status: AgentStatus,
    pub current_task_count: usize,
    pub max_concurrent_tasks: usize,
    pub metrics: AgentMetrics,
    pub last_activity: DateTime<Utc>,
}

impl AgentProfile {
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        agent_type: impl Into<String>,
        capabilities: Vec<String>,
        max_concurrent_tasks: usize,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            agent_type: agent_type.into(),
            capabilities,
            status: AgentStatus::Idle,
            current_task_count: 0,
            max_concurrent_tasks,
            metrics: AgentMetrics::default(),
            last_activity: Utc::now(),
        }
    }

    /// Whether the agent can take one more task right now
    pub fn has_capacity(&self) -> bool {
        self.status.is_active() && self.current_task_count < self.max_concurrent_tasks
    }
}

/// Workflow execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// How coordination plans are communicated to agents
///
/// The strategy changes the announcement style only; phase structure is
/// identical across all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStrategy {
    Centralized,
    Distributed,
    Hybrid,
}

impl Default for CoordinationStrategy {
    fn default() -> Self {
        Self::Centralized
    }
}

/// One end-to-end run of a task graph derived from a single user request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Complete partition of the task set; every task appears in exactly one
    /// phase, strictly after every phase containing one of its dependencies.
    pub phases: Vec<Vec<TaskId>>,
    pub id: ExecutionId,
    pub current_phase: usize,
    pub status: ExecutionStatus,
    pub progress: f32,
    pub error: Option<String>,
    pub strategy: CoordinationStrategy,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(id: ExecutionId, phases: Vec<Vec<TaskId>>, strategy: CoordinationStrategy) -> Self {
        Self {
            id,
            phases,
            current_phase: 0,
            status: ExecutionStatus::Running,
            progress: 0.0,
            error: None,
            strategy,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn total_tasks(&self) -> usize {
        self.phases.iter().map(|p| p.len()).sum()
    }

    pub fn recompute_progress(&mut self, completed: usize) {
        let total = self.total_tasks();
        self.progress = if total == 0 {
            1.0
        } else {
            completed as f32 / total as f32
        };
    }
}

/// Coordination event types exchanged between orchestrator and agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationEventType {
    TaskAssignment,
    StatusUpdate,
    ResourceRequest,
    Collaboration,
    Error,
}

/// An asynchronous message exchanged between orchestrator and agents
///
/// Never mutated after creation; retained in a bounded history for
/// observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationEvent {
    pub id: Uuid,
    pub source: AgentId,
    /// `None` means broadcast to every subscriber of `event_type`
    pub target: Option<AgentId>,
    pub event_type: CoordinationEventType,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    pub priority: TaskPriority,
}

impl CoordinationEvent {
    pub fn new(
        source: AgentId,
        target: Option<AgentId>,
        event_type: CoordinationEventType,
        payload: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            event_type,
            payload,
            timestamp: Utc::now(),
            priority: TaskPriority::Medium,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Payload of an inbound `task_assignment` message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: TaskId,
    pub execution_id: ExecutionId,
    pub task_type: String,
    pub description: String,
    pub estimated_duration_ms: u64,
    pub metadata: HashMap<String, Value>,
}

impl TaskAssignment {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            execution_id: task.execution_id,
            task_type: task.task_type.clone(),
            description: task.description.clone(),
            estimated_duration_ms: task.estimated_duration_ms,
            metadata: task.metadata.clone(),
        }
    }
}

/// Decomposition returned by the reasoning service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    pub tasks: Vec<TaskDefinition>,
    pub summary: String,
}
