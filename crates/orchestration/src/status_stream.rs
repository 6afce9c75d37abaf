//! Real-time status streaming via channels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use swarmforge_common::{AgentId, ExecutionId, TaskId};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub event_type: StatusEventType,
    pub execution_id: ExecutionId,
    pub task_id: Option<TaskId>,
    pub agent_id: Option<AgentId>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusEventType {
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionPaused,
    ExecutionResumed,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
}

pub struct StatusStream {
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusStream {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self { sender }
    }

    /// Emit status event
    pub fn emit(&self, event: StatusEvent) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to status events
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    pub fn emit_execution(&self, execution_id: ExecutionId, event_type: StatusEventType, message: String) {
        self.emit(StatusEvent {
            event_type,
            execution_id,
            task_id: None,
            agent_id: None,
            message,
            timestamp: Utc::now(),
        });
    }

    pub fn emit_task(
        &self,
        execution_id: ExecutionId,
        task_id: TaskId,
        agent_id: Option<AgentId>,
        event_type: StatusEventType,
        message: String,
    ) {
        self.emit(StatusEvent {
            event_type,
            execution_id,
            task_id: Some(task_id),
            agent_id,
            message,
            timestamp: Utc::now(),
        });
    }
}

impl Default for StatusStream {
    fn default() -> Self {
        Self::new()
    }
}
