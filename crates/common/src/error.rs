use crate::types::{AgentId, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwarmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent already registered: {0}")]
    DuplicateAgent(AgentId),

    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Unknown message recipient: {0}")]
    UnknownRecipient(AgentId),

    #[error("Invalid status transition for task {task}: {from} -> {to}")]
    InvalidTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Dependency cycle detected: {unplaced} task(s) could not be placed in any phase")]
    DependencyCycle { unplaced: usize },

    #[error("Task '{task_type}' references unknown dependency '{dependency}'")]
    UnknownDependency { task_type: String, dependency: String },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(crate::types::ExecutionId),

    #[error("No agent available: {0}")]
    AgentUnavailable(String),

    #[error("Agent execution failed for task {task}: {detail}")]
    AgentExecution { task: TaskId, detail: String },

    #[error("Decomposition failed: {0}")]
    Decomposition(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SwarmError>;

/// Coarse failure categories the recovery policy keys on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    AgentUnavailable,
    ResourceExhausted,
    ValidationFailed,
    Timeout,
    Other,
}

/// What the executor does about a categorized failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Reassign the task to a backup agent
    Reassign,
    /// Queue the task for a later retry
    QueueRetry,
    /// Roll back the task's partial result and retry with a fresh slot
    RollbackAndFix,
    /// Extend the soft deadline and keep waiting
    ExtendDeadline,
    /// Log, stop retrying, and let the execution fail
    Escalate,
}

impl FailureCategory {
    /// Static recovery table; unmatched categories escalate.
    pub fn recovery_action(self) -> RecoveryAction {
        match self {
            FailureCategory::AgentUnavailable => RecoveryAction::Reassign,
            FailureCategory::ResourceExhausted => RecoveryAction::QueueRetry,
            FailureCategory::ValidationFailed => RecoveryAction::RollbackAndFix,
            FailureCategory::Timeout => RecoveryAction::ExtendDeadline,
            FailureCategory::Other => RecoveryAction::Escalate,
        }
    }

    /// Classify a task-level error message into a recovery category.
    pub fn classify(detail: &str) -> Self {
        let lower = detail.to_lowercase();
        if lower.contains("unavailable") || lower.contains("no agent") {
            FailureCategory::AgentUnavailable
        } else if lower.contains("resource") || lower.contains("exhausted") {
            FailureCategory::ResourceExhausted
        } else if lower.contains("validation") || lower.contains("invalid") {
            FailureCategory::ValidationFailed
        } else if lower.contains("timeout") || lower.contains("timed out") {
            FailureCategory::Timeout
        } else {
            FailureCategory::Other
        }
    }
}

impl RecoveryAction {
    /// Whether the action allows another attempt at the same task
    pub fn is_retryable(self) -> bool {
        !matches!(self, RecoveryAction::Escalate)
    }
}
