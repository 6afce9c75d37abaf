//! Built-in specialized agents
//!
//! Each specialization produces a deterministic, opaque deliverable payload
//! for its task type; real content generation lives behind an external
//! service and is out of scope here. The simulated work sleeps a small
//! fraction of the estimated duration so ordering and concurrency behave
//! like the real thing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use swarmforge_common::{AgentId, AgentProfile, AgentSpec, Result, TaskAssignment};
use tracing::debug;

use super::SwarmAgent;

pub struct SpecializedAgent {
    id: AgentId,
    name: String,
    agent_type: String,
    capabilities: Vec<String>,
    max_concurrent_tasks: usize,
}

impl SpecializedAgent {
    pub fn new(
        name: impl Into<String>,
        agent_type: impl Into<String>,
        capabilities: Vec<String>,
        max_concurrent_tasks: usize,
    ) -> Self {
        let name = name.into();
        Self {
            id: AgentId::new(name.clone()),
            name,
            agent_type: agent_type.into(),
            capabilities,
            max_concurrent_tasks,
        }
    }

    pub fn from_spec(spec: &AgentSpec) -> Self {
        Self::new(
            spec.name.clone(),
            spec.agent_type.clone(),
            spec.capabilities.clone(),
            spec.max_concurrent_tasks,
        )
    }

    fn deliverable(&self, assignment: &TaskAssignment) -> Value {
        let artifacts: Vec<String> = match assignment.task_type.as_str() {
            "architecture" => vec!["component-diagram".into(), "tech-stack".into()],
            "frontend" => vec!["ui-components".into(), "routes".into()],
            "backend" => vec!["api-endpoints".into(), "data-model".into()],
            "integration" => vec!["wiring".into(), "contract-checks".into()],
            "validation" => vec!["test-report".into(), "coverage".into()],
            "optimization" => vec!["profile".into(), "tuning-notes".into()],
            "knowledge" => vec!["docs".into(), "references".into()],
            other => vec![format!("{}-output", other)],
        };

        json!({
            "agent_id": self.id.0,
            "task_id": assignment.task_id.to_string(),
            "task_type": assignment.task_type,
            "summary": format!("{} deliverable for: {}", self.agent_type, assignment.description),
            "artifacts": artifacts,
        })
    }
}

#[async_trait]
impl SwarmAgent for SpecializedAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn profile(&self) -> AgentProfile {
        AgentProfile::new(
            self.id.clone(),
            self.name.clone(),
            self.agent_type.clone(),
            self.capabilities.clone(),
            self.max_concurrent_tasks,
        )
    }

    async fn execute(&self, assignment: TaskAssignment) -> Result<Value> {
        debug!(
            "Agent {} executing '{}' task {}",
            self.id, assignment.task_type, assignment.task_id
        );

        // 1% of the estimate, clamped so tests stay fast but interleave
        let work_ms = (assignment.estimated_duration_ms / 100).clamp(5, 50);
        tokio::time::sleep(Duration::from_millis(work_ms)).await;

        Ok(self.deliverable(&assignment))
    }
}
