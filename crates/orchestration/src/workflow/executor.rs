//! Workflow execution engine
//!
//! Drives a coordination plan to a terminal state with bounded parallelism.
//! Scheduling is event-driven: every task completion wakes the loop and
//! re-evaluates which dependents became ready, so there is no polling.
//! Failure is partial; a failed task blocks its transitive dependents while
//! independent branches run to completion.

use chrono::Utc;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use swarmforge_common::{
    AgentId, CoordinationEvent, CoordinationEventType, ExecutionId, ExecutionStatus,
    FailureCategory, OrchestrationConfig, Result, SwarmError, TaskAssignment, TaskId, TaskStatus,
    WorkflowExecution,
};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

use crate::agents::{AgentPool, SwarmAgent};
use crate::bus::MessageBus;
use crate::delegation::DelegationManager;
use crate::registry::AgentRegistry;
use crate::status_stream::{StatusEventType, StatusStream};
use crate::store::TaskStore;
use crate::tasks::TaskManager;

/// Outcome of one in-flight task, reported back over the completion channel
struct TaskOutcome {
    task_id: TaskId,
    agent_id: AgentId,
    duration_ms: u64,
    result: std::result::Result<serde_json::Value, String>,
}

pub struct WorkflowExecutor {
    tasks: Arc<TaskManager>,
    registry: Arc<AgentRegistry>,
    delegation: Arc<DelegationManager>,
    bus: Arc<MessageBus>,
    pool: Arc<AgentPool>,
    status: Arc<StatusStream>,
    store: Arc<dyn TaskStore>,
    concurrency_limit: usize,
    max_retries: usize,
}

impl WorkflowExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<TaskManager>,
        registry: Arc<AgentRegistry>,
        delegation: Arc<DelegationManager>,
        bus: Arc<MessageBus>,
        pool: Arc<AgentPool>,
        status: Arc<StatusStream>,
        store: Arc<dyn TaskStore>,
        config: &OrchestrationConfig,
    ) -> Self {
        Self {
            tasks,
            registry,
            delegation,
            bus,
            pool,
            status,
            store,
            concurrency_limit: config.max_concurrent_tasks,
            max_retries: config.default_max_retries,
        }
    }

    /// Run an execution to a terminal state
    ///
    /// Pause is cooperative: observed before launching new work, never
    /// preempting in-flight tasks. The shared execution record is updated in
    /// place so control-surface reads always see live progress.
    pub async fn run(
        &self,
        execution: Arc<RwLock<WorkflowExecution>>,
        mut pause_rx: watch::Receiver<bool>,
    ) -> Result<ExecutionStatus> {
        let (execution_id, phases) = {
            let exec = execution.read().await;
            (exec.id, exec.phases.clone())
        };

        let all_tasks = self.tasks.get_tasks(execution_id).await;
        let total = all_tasks.len();
        let deps: HashMap<TaskId, Vec<TaskId>> = all_tasks
            .iter()
            .map(|t| (t.id, t.dependencies.clone()))
            .collect();

        info!(
            "Executing workflow {} ({} tasks, limit {})",
            execution_id, total, self.concurrency_limit
        );

        let mut completed: HashSet<TaskId> = HashSet::new();
        let mut failed: HashSet<TaskId> = HashSet::new();
        let mut in_flight: HashSet<TaskId> = HashSet::new();
        let mut stalled = false;
        let mut pause_closed = false;

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<TaskOutcome>();
        let mut slots_rx = self.registry.subscribe_slots();

        loop {
            let paused = *pause_rx.borrow();
            let doomed = Self::doomed_tasks(&deps, &failed);
            let settled = completed.len() + failed.len() + doomed.len();

            if in_flight.is_empty() && settled == total {
                break;
            }

            let mut launched = 0;
            if !paused {
                // mark the current capacity generation as seen before trying
                // to place work, so a release racing the launch pass still
                // registers as a change below
                slots_rx.borrow_and_update();
                launched = self
                    .launch_ready(
                        execution_id,
                        &phases,
                        &deps,
                        &completed,
                        &failed,
                        &doomed,
                        &mut in_flight,
                        &done_tx,
                    )
                    .await?;
            }

            if !paused && in_flight.is_empty() && launched == 0 {
                if !self.registry.any_slot_in_use().await {
                    if slots_rx.has_changed().unwrap_or(false) {
                        // capacity moved between the launch pass and this
                        // check; run another pass before giving up
                        continue;
                    }
                    // remaining tasks have no agent and no release is coming;
                    // waiting would never make progress
                    stalled = true;
                    break;
                }
                // the roster is serving other executions; park until a slot
                // frees, then re-evaluate
                tokio::select! {
                    changed = slots_rx.changed() => {
                        if changed.is_err() {
                            stalled = true;
                            break;
                        }
                    }
                    changed = pause_rx.changed(), if !pause_closed => {
                        if changed.is_err() {
                            pause_closed = true;
                            continue;
                        }
                        let now_paused = *pause_rx.borrow();
                        self.toggle_pause(&execution, now_paused).await;
                    }
                }
                continue;
            }

            tokio::select! {
                Some(outcome) = done_rx.recv() => {
                    in_flight.remove(&outcome.task_id);
                    self.settle(execution_id, outcome, &mut completed, &mut failed).await?;
                    self.refresh_execution(&execution, &phases, &completed, &failed).await;
                }
                changed = pause_rx.changed(), if !pause_closed => {
                    if changed.is_err() {
                        // controller dropped; the last observed value stands
                        pause_closed = true;
                        continue;
                    }
                    let now_paused = *pause_rx.borrow();
                    self.toggle_pause(&execution, now_paused).await;
                }
            }
        }

        let doomed = Self::doomed_tasks(&deps, &failed);
        let unassigned = total - completed.len() - failed.len() - doomed.len();
        let success = failed.is_empty() && doomed.is_empty() && !stalled && completed.len() == total;

        let final_status = {
            let mut exec = execution.write().await;
            exec.recompute_progress(completed.len());
            exec.current_phase = Self::current_phase_index(&phases, &completed, &failed);
            exec.finished_at = Some(Utc::now());
            if success {
                exec.status = ExecutionStatus::Completed;
            } else {
                exec.status = ExecutionStatus::Failed;
                let mut reasons = Vec::new();
                if !failed.is_empty() {
                    reasons.push(format!("{} task(s) failed", failed.len()));
                }
                if !doomed.is_empty() {
                    reasons.push(format!("{} task(s) blocked by failed dependencies", doomed.len()));
                }
                if stalled && unassigned > 0 {
                    reasons.push(format!("no agent available for {} task(s)", unassigned));
                }
                exec.error = Some(reasons.join("; "));
            }
            self.persist_execution(&exec).await;
            exec.status
        };

        match final_status {
            ExecutionStatus::Completed => {
                info!("Workflow {} completed", execution_id);
                self.status.emit_execution(
                    execution_id,
                    StatusEventType::ExecutionCompleted,
                    format!("{}/{} tasks completed", completed.len(), total),
                );
            }
            _ => {
                let error = execution.read().await.error.clone().unwrap_or_default();
                warn!("Workflow {} failed: {}", execution_id, error);
                self.status.emit_execution(
                    execution_id,
                    StatusEventType::ExecutionFailed,
                    error,
                );
            }
        }

        Ok(final_status)
    }

    /// Launch ready tasks up to the free in-flight capacity
    ///
    /// Tasks are considered in phase order, which keeps launches
    /// deterministic. A task with no scoring agent is skipped this pass and
    /// retried when the next completion frees a slot.
    #[allow(clippy::too_many_arguments)]
    async fn launch_ready(
        &self,
        execution_id: ExecutionId,
        phases: &[Vec<TaskId>],
        deps: &HashMap<TaskId, Vec<TaskId>>,
        completed: &HashSet<TaskId>,
        failed: &HashSet<TaskId>,
        doomed: &HashSet<TaskId>,
        in_flight: &mut HashSet<TaskId>,
        done_tx: &mpsc::UnboundedSender<TaskOutcome>,
    ) -> Result<usize> {
        let mut launched = 0;

        for task_id in phases.iter().flatten() {
            if in_flight.len() >= self.concurrency_limit {
                break;
            }
            if completed.contains(task_id)
                || failed.contains(task_id)
                || doomed.contains(task_id)
                || in_flight.contains(task_id)
            {
                continue;
            }
            let ready = deps
                .get(task_id)
                .map(|ds| ds.iter().all(|d| completed.contains(d)))
                .unwrap_or(true);
            if !ready {
                continue;
            }

            let task = self
                .tasks
                .get_task(*task_id)
                .await
                .ok_or(SwarmError::TaskNotFound(*task_id))?;

            // Re-delegate when the provisional assignee lost its capacity
            let chosen = match &task.assigned_agent {
                Some(id) => match self.registry.get(id).await {
                    Some(profile) if profile.has_capacity() => Some(id.clone()),
                    _ => self.delegation.find_agent(&task.task_type).await.map(|p| p.id),
                },
                None => self.delegation.find_agent(&task.task_type).await.map(|p| p.id),
            };

            let Some(agent_id) = chosen else {
                debug!(
                    "Task {} ('{}') stays pending: no agent available",
                    task_id, task.task_type
                );
                continue;
            };

            if self.registry.reserve_slot(&agent_id).await.is_err() {
                debug!("Task {} stays pending: {} lost its slot", task_id, agent_id);
                continue;
            }

            let Some(agent) = self.pool.get(&agent_id) else {
                // registered but not pooled; give the slot back
                self.registry.release_slot(&agent_id, false, 0).await?;
                warn!("Agent {} has no pool entry", agent_id);
                continue;
            };

            self.tasks
                .assign_agent(*task_id, Some(agent_id.clone()))
                .await?;
            self.tasks
                .update_status(*task_id, TaskStatus::InProgress, None)
                .await?;

            let assignment = TaskAssignment::from_task(&task);
            let assignment_event = CoordinationEvent::new(
                AgentId::from("orchestrator"),
                Some(agent_id.clone()),
                CoordinationEventType::TaskAssignment,
                serde_json::to_value(&assignment)?,
            );
            if let Err(e) = self.bus.send(assignment_event).await {
                debug!("Assignment message for {} not delivered: {}", task_id, e);
            }

            self.status.emit_task(
                execution_id,
                *task_id,
                Some(agent_id.clone()),
                StatusEventType::TaskStarted,
                task.description.clone(),
            );

            in_flight.insert(*task_id);
            launched += 1;

            let tx = done_tx.clone();
            let max_retries = self.max_retries;
            let spawned_id = *task_id;
            tokio::spawn(async move {
                let start = Instant::now();
                let result = run_with_recovery(agent, assignment, max_retries).await;
                let _ = tx.send(TaskOutcome {
                    task_id: spawned_id,
                    agent_id,
                    duration_ms: start.elapsed().as_millis() as u64,
                    result,
                });
            });
        }

        Ok(launched)
    }

    /// Fold one outcome into task state, agent metrics, and the bus
    async fn settle(
        &self,
        execution_id: ExecutionId,
        outcome: TaskOutcome,
        completed: &mut HashSet<TaskId>,
        failed: &mut HashSet<TaskId>,
    ) -> Result<()> {
        let success = outcome.result.is_ok();
        self.registry
            .release_slot(&outcome.agent_id, success, outcome.duration_ms)
            .await?;

        match outcome.result {
            Ok(value) => {
                self.tasks
                    .update_status(outcome.task_id, TaskStatus::Completed, Some(value.clone()))
                    .await?;
                completed.insert(outcome.task_id);

                let event = CoordinationEvent::new(
                    outcome.agent_id.clone(),
                    None,
                    CoordinationEventType::StatusUpdate,
                    json!({
                        "task_id": outcome.task_id.to_string(),
                        "status": "completed",
                        "duration_ms": outcome.duration_ms,
                    }),
                );
                let _ = self.bus.send(event).await;

                self.status.emit_task(
                    execution_id,
                    outcome.task_id,
                    Some(outcome.agent_id),
                    StatusEventType::TaskCompleted,
                    format!("completed in {} ms", outcome.duration_ms),
                );
            }
            Err(detail) => {
                self.tasks
                    .update_status(
                        outcome.task_id,
                        TaskStatus::Failed,
                        Some(json!({ "error": detail })),
                    )
                    .await?;
                failed.insert(outcome.task_id);

                let event = CoordinationEvent::new(
                    outcome.agent_id.clone(),
                    None,
                    CoordinationEventType::Error,
                    json!({
                        "task_id": outcome.task_id.to_string(),
                        "error": detail,
                    }),
                );
                let _ = self.bus.send(event).await;

                self.status.emit_task(
                    execution_id,
                    outcome.task_id,
                    Some(outcome.agent_id),
                    StatusEventType::TaskFailed,
                    detail,
                );
            }
        }
        Ok(())
    }

    async fn refresh_execution(
        &self,
        execution: &Arc<RwLock<WorkflowExecution>>,
        phases: &[Vec<TaskId>],
        completed: &HashSet<TaskId>,
        failed: &HashSet<TaskId>,
    ) {
        let mut exec = execution.write().await;
        exec.recompute_progress(completed.len());
        exec.current_phase = Self::current_phase_index(phases, completed, failed);
        self.persist_execution(&exec).await;
    }

    async fn toggle_pause(&self, execution: &Arc<RwLock<WorkflowExecution>>, paused: bool) {
        let mut exec = execution.write().await;
        match (paused, exec.status) {
            (true, ExecutionStatus::Running) => {
                exec.status = ExecutionStatus::Paused;
                info!("Workflow {} paused; in-flight tasks drain", exec.id);
                self.status.emit_execution(
                    exec.id,
                    StatusEventType::ExecutionPaused,
                    "paused".to_string(),
                );
            }
            (false, ExecutionStatus::Paused) => {
                exec.status = ExecutionStatus::Running;
                info!("Workflow {} resumed", exec.id);
                self.status.emit_execution(
                    exec.id,
                    StatusEventType::ExecutionResumed,
                    "resumed".to_string(),
                );
            }
            _ => {}
        }
        self.persist_execution(&exec).await;
    }

    async fn persist_execution(&self, execution: &WorkflowExecution) {
        if let Err(e) = self.store.save_execution(execution).await {
            warn!("Failed to persist execution {}: {}", execution.id, e);
        }
    }

    /// Pending tasks with a (transitively) failed dependency; they can never
    /// start and stay `pending` forever
    fn doomed_tasks(
        deps: &HashMap<TaskId, Vec<TaskId>>,
        failed: &HashSet<TaskId>,
    ) -> HashSet<TaskId> {
        let mut doomed: HashSet<TaskId> = HashSet::new();
        loop {
            let mut changed = false;
            for (id, ds) in deps {
                if failed.contains(id) || doomed.contains(id) {
                    continue;
                }
                if ds.iter().any(|d| failed.contains(d) || doomed.contains(d)) {
                    doomed.insert(*id);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        doomed
    }

    /// First phase that still has unsettled work, clamped to the last phase
    fn current_phase_index(
        phases: &[Vec<TaskId>],
        completed: &HashSet<TaskId>,
        failed: &HashSet<TaskId>,
    ) -> usize {
        phases
            .iter()
            .position(|p| {
                p.iter()
                    .any(|t| !completed.contains(t) && !failed.contains(t))
            })
            .unwrap_or_else(|| phases.len().saturating_sub(1))
    }
}

/// Execute one assignment with the failure-recovery policy applied
///
/// The estimated duration acts as a soft deadline: an overrun is logged and
/// the slot stays occupied, but the task is never cancelled. Retryable
/// failure categories consume the retry budget before the failure becomes
/// terminal.
async fn run_with_recovery(
    agent: Arc<dyn SwarmAgent>,
    assignment: TaskAssignment,
    max_retries: usize,
) -> std::result::Result<serde_json::Value, String> {
    let soft_deadline = Duration::from_millis(assignment.estimated_duration_ms.max(1));
    let mut attempt = 0;

    loop {
        let fut = agent.execute(assignment.clone());
        tokio::pin!(fut);

        let outcome = match tokio::time::timeout(soft_deadline, &mut fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Task {} overran its {} ms soft deadline; waiting it out",
                    assignment.task_id, assignment.estimated_duration_ms
                );
                (&mut fut).await
            }
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                let detail = e.to_string();
                let category = FailureCategory::classify(&detail);
                let action = category.recovery_action();
                if attempt < max_retries && action.is_retryable() {
                    attempt += 1;
                    debug!(
                        "Task {} attempt {} failed ({:?} -> {:?}): {}",
                        assignment.task_id, attempt, category, action, detail
                    );
                    continue;
                }
                return Err(detail);
            }
        }
    }
}
