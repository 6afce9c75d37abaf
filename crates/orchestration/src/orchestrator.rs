//! Top-level orchestration facade
//!
//! Wires the registry, bus, task manager, delegation, coordinator, and
//! executor together and exposes the control surface callers interact with:
//! submit a request, observe progress, pause and resume, reset.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use swarmforge_common::{
    CoordinationStrategy, ExecutionId, Result, SwarmError, SystemConfig, Task, WorkflowExecution,
};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use crate::agents::AgentPool;
use crate::bus::MessageBus;
use crate::delegation::DelegationManager;
use crate::reasoning::{HeuristicDecomposer, ReasoningService};
use crate::registry::AgentRegistry;
use crate::status_stream::{StatusEventType, StatusStream};
use crate::store::{InMemoryTaskStore, TaskStore};
use crate::tasks::TaskManager;
use crate::workflow::{WorkflowCoordinator, WorkflowExecutor};

/// Live control state for one running workflow
struct ExecutionHandle {
    pause_tx: watch::Sender<bool>,
    execution: Arc<RwLock<WorkflowExecution>>,
}

pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    bus: Arc<MessageBus>,
    tasks: Arc<TaskManager>,
    pool: Arc<AgentPool>,
    reasoning: Arc<dyn ReasoningService>,
    status: Arc<StatusStream>,
    coordinator: Arc<WorkflowCoordinator>,
    executor: Arc<WorkflowExecutor>,
    default_strategy: CoordinationStrategy,
    executions: RwLock<HashMap<ExecutionId, ExecutionHandle>>,
}

impl Orchestrator {
    /// Build an orchestrator from configuration with the default in-memory
    /// store and heuristic decomposer
    pub async fn new(config: SystemConfig) -> Result<Self> {
        Self::with_services(
            config,
            Arc::new(HeuristicDecomposer::new()),
            Arc::new(InMemoryTaskStore::new()),
        )
        .await
    }

    /// Build with injected reasoning and persistence services
    pub async fn with_services(
        config: SystemConfig,
        reasoning: Arc<dyn ReasoningService>,
        store: Arc<dyn TaskStore>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(AgentRegistry::new());
        let bus = Arc::new(MessageBus::new(config.orchestration.bus_history_limit));
        let tasks = Arc::new(TaskManager::new(Arc::clone(&store)));
        let delegation = Arc::new(DelegationManager::new(Arc::clone(&registry)));
        let status = Arc::new(StatusStream::new());

        let pool = Arc::new(AgentPool::from_roster(&config.roster, &registry, &bus).await?);
        info!("Orchestrator initialized with {} agents", pool.len());

        let coordinator = Arc::new(WorkflowCoordinator::new(
            Arc::clone(&tasks),
            Arc::clone(&delegation),
            Arc::clone(&bus),
            Arc::clone(&store),
        ));
        let executor = Arc::new(WorkflowExecutor::new(
            Arc::clone(&tasks),
            Arc::clone(&registry),
            Arc::clone(&delegation),
            Arc::clone(&bus),
            Arc::clone(&pool),
            Arc::clone(&status),
            Arc::clone(&store),
            &config.orchestration,
        ));

        Ok(Self {
            registry,
            bus,
            tasks,
            pool,
            reasoning,
            status,
            coordinator,
            executor,
            default_strategy: CoordinationStrategy::Hybrid,
            executions: RwLock::new(HashMap::new()),
        })
    }

    /// Decompose a natural-language request and start executing it
    ///
    /// Returns as soon as the workflow is coordinated and launched; progress
    /// is observed through [`Orchestrator::get_execution`] and the status
    /// stream.
    pub async fn process_request(&self, prompt: &str) -> Result<ExecutionId> {
        self.process_request_with(prompt, Value::Null, self.default_strategy)
            .await
    }

    pub async fn process_request_with(
        &self,
        prompt: &str,
        context: Value,
        strategy: CoordinationStrategy,
    ) -> Result<ExecutionId> {
        let decomposition = self.reasoning.decompose(prompt, &context).await?;
        info!(
            "Decomposed request into {} task(s): {}",
            decomposition.tasks.len(),
            decomposition.summary
        );

        let execution_id = ExecutionId::new();
        let tasks = self
            .tasks
            .create_tasks(execution_id, &decomposition.tasks)
            .await?;

        let execution = self
            .coordinator
            .coordinate(execution_id, &tasks, strategy)
            .await?;

        self.status.emit_execution(
            execution_id,
            StatusEventType::ExecutionStarted,
            decomposition.summary,
        );

        let execution = Arc::new(RwLock::new(execution));
        let (pause_tx, pause_rx) = watch::channel(false);

        self.executions.write().await.insert(
            execution_id,
            ExecutionHandle {
                pause_tx,
                execution: Arc::clone(&execution),
            },
        );

        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            if let Err(e) = executor.run(execution, pause_rx).await {
                tracing::error!("Execution {} aborted: {}", execution_id, e);
            }
        });

        Ok(execution_id)
    }

    /// Request a cooperative pause; in-flight tasks finish, nothing new starts
    ///
    /// Idempotent: pausing an already paused execution is a no-op.
    pub async fn pause(&self, execution_id: ExecutionId) -> Result<()> {
        let executions = self.executions.read().await;
        let handle = executions
            .get(&execution_id)
            .ok_or(SwarmError::ExecutionNotFound(execution_id))?;
        let _ = handle.pause_tx.send(true);
        debug!("Pause requested for {}", execution_id);
        Ok(())
    }

    /// Lift a pause; also idempotent
    pub async fn resume(&self, execution_id: ExecutionId) -> Result<()> {
        let executions = self.executions.read().await;
        let handle = executions
            .get(&execution_id)
            .ok_or(SwarmError::ExecutionNotFound(execution_id))?;
        let _ = handle.pause_tx.send(false);
        debug!("Resume requested for {}", execution_id);
        Ok(())
    }

    /// Snapshot of an execution's live state
    pub async fn get_execution(&self, execution_id: ExecutionId) -> Result<WorkflowExecution> {
        let executions = self.executions.read().await;
        let handle = executions
            .get(&execution_id)
            .ok_or(SwarmError::ExecutionNotFound(execution_id))?;
        let snapshot = handle.execution.read().await.clone();
        Ok(snapshot)
    }

    /// All tasks of an execution, in creation order
    pub async fn get_tasks(&self, execution_id: ExecutionId) -> Vec<Task> {
        self.tasks.get_tasks(execution_id).await
    }

    /// Drop tracking state for finished executions
    ///
    /// Running and paused executions are left alone; their handles stay valid
    /// so they remain controllable.
    pub async fn reset(&self) -> usize {
        let mut executions = self.executions.write().await;
        let mut cleared = 0;
        let mut keep = HashMap::new();
        for (id, handle) in executions.drain() {
            let status = handle.execution.read().await.status;
            if status.is_terminal() {
                cleared += 1;
            } else {
                keep.insert(id, handle);
            }
        }
        *executions = keep;
        info!("Reset cleared {} finished execution(s)", cleared);
        cleared
    }

    pub fn status_stream(&self) -> &StatusStream {
        &self.status
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn agent_count(&self) -> usize {
        self.pool.len()
    }
}
