//! Workflow coordinator: phase partitioning and agent assignment
//!
//! Builds a dependency graph from a task batch, partitions it into phases of
//! concurrently runnable tasks, and records provisional agent assignments.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::NodeIndex;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use swarmforge_common::{
    AgentId, CoordinationEvent, CoordinationEventType, CoordinationStrategy, ExecutionId, Result,
    SwarmError, Task, TaskAssignment, TaskId, WorkflowExecution,
};
use tracing::{debug, info, warn};

use crate::bus::MessageBus;
use crate::delegation::DelegationManager;
use crate::store::TaskStore;
use crate::tasks::TaskManager;
use crate::workflow::WorkflowGraph;

pub struct WorkflowCoordinator {
    tasks: Arc<TaskManager>,
    delegation: Arc<DelegationManager>,
    bus: Arc<MessageBus>,
    store: Arc<dyn TaskStore>,
}

impl WorkflowCoordinator {
    pub fn new(
        tasks: Arc<TaskManager>,
        delegation: Arc<DelegationManager>,
        bus: Arc<MessageBus>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            tasks,
            delegation,
            bus,
            store,
        }
    }

    /// Partition a task set into dependency-ordered phases
    ///
    /// Iterative frontier extraction: each round collects every not-yet-placed
    /// task whose dependencies are all already placed. A round that makes no
    /// progress while tasks remain means a cycle; that is fatal and no
    /// partial phase list escapes.
    pub fn partition_phases(tasks: &[Task]) -> Result<Vec<Vec<TaskId>>> {
        let graph = Self::build_graph(tasks);
        if is_cyclic_directed(&graph) {
            return Err(SwarmError::DependencyCycle {
                unplaced: tasks.len(),
            });
        }

        let deps: HashMap<TaskId, &Vec<TaskId>> =
            tasks.iter().map(|t| (t.id, &t.dependencies)).collect();

        let mut placed: HashSet<TaskId> = HashSet::new();
        let mut phases: Vec<Vec<TaskId>> = Vec::new();

        while placed.len() < tasks.len() {
            let frontier: Vec<TaskId> = tasks
                .iter()
                .filter(|t| !placed.contains(&t.id))
                .filter(|t| t.dependencies.iter().all(|d| placed.contains(d)))
                .map(|t| t.id)
                .collect();

            if frontier.is_empty() {
                // unreachable after the cycle check, kept as a hard stop
                return Err(SwarmError::DependencyCycle {
                    unplaced: tasks.len() - placed.len(),
                });
            }

            placed.extend(frontier.iter().copied());
            phases.push(frontier);
        }

        debug!(
            "Partitioned {} tasks into {} phases (deps: {})",
            tasks.len(),
            phases.len(),
            deps.len()
        );
        Ok(phases)
    }

    fn build_graph(tasks: &[Task]) -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        let indices: HashMap<TaskId, NodeIndex> =
            tasks.iter().map(|t| (t.id, graph.add_node(t.id))).collect();

        for task in tasks {
            for dep in &task.dependencies {
                if let (Some(&from), Some(&to)) = (indices.get(dep), indices.get(&task.id)) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        graph
    }

    /// Build a coordination plan for a task batch
    ///
    /// Tasks with no scoring agent stay unassigned and are retried at
    /// execution time. The strategy only changes how assignments are
    /// announced on the bus; the phase structure is identical.
    pub async fn coordinate(
        &self,
        execution_id: ExecutionId,
        tasks: &[Task],
        strategy: CoordinationStrategy,
    ) -> Result<WorkflowExecution> {
        let phases = Self::partition_phases(tasks)?;
        info!(
            "Coordinated execution {}: {} tasks in {} phases ({})",
            execution_id,
            tasks.len(),
            phases.len(),
            strategy
        );

        let mut assignments: Vec<(Task, AgentId)> = Vec::new();
        for task in tasks {
            match self.delegation.find_agent(&task.task_type).await {
                Some(agent) => {
                    self.tasks
                        .assign_agent(task.id, Some(agent.id.clone()))
                        .await?;
                    assignments.push((task.clone(), agent.id));
                }
                None => {
                    debug!(
                        "Task {} ('{}') left unassigned, will retry at execution time",
                        task.id, task.task_type
                    );
                }
            }
        }

        self.announce(execution_id, &phases, &assignments, strategy)
            .await;

        let execution = WorkflowExecution::new(execution_id, phases, strategy);
        if let Err(e) = self.store.save_execution(&execution).await {
            warn!("Failed to persist execution {}: {}", execution_id, e);
        }
        Ok(execution)
    }

    async fn announce(
        &self,
        execution_id: ExecutionId,
        phases: &[Vec<TaskId>],
        assignments: &[(Task, AgentId)],
        strategy: CoordinationStrategy,
    ) {
        let coordinator = AgentId::from("orchestrator");

        let broadcast_plan = matches!(
            strategy,
            CoordinationStrategy::Centralized | CoordinationStrategy::Hybrid
        );
        let direct_assignments = matches!(
            strategy,
            CoordinationStrategy::Distributed | CoordinationStrategy::Hybrid
        );

        if broadcast_plan {
            let payload = json!({
                "execution_id": execution_id.to_string(),
                "phases": phases
                    .iter()
                    .map(|p| p.iter().map(|t| t.to_string()).collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
                "assignments": assignments
                    .iter()
                    .map(|(t, a)| json!({"task_id": t.id.to_string(), "agent_id": a.0}))
                    .collect::<Vec<_>>(),
            });
            let event = CoordinationEvent::new(
                coordinator.clone(),
                None,
                CoordinationEventType::StatusUpdate,
                payload,
            );
            if let Err(e) = self.bus.send(event).await {
                warn!("Plan broadcast failed: {}", e);
            }
        }

        if direct_assignments {
            for (task, agent_id) in assignments {
                let event = CoordinationEvent::new(
                    coordinator.clone(),
                    Some(agent_id.clone()),
                    CoordinationEventType::TaskAssignment,
                    serde_json::to_value(TaskAssignment::from_task(task)).unwrap_or_default(),
                );
                if let Err(e) = self.bus.send(event).await {
                    warn!("Assignment announcement to {} failed: {}", agent_id, e);
                }
            }
        }
    }
}
