//! Integration tests for workflow coordination and execution

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swarmforge_common::{
    AgentId, AgentProfile, CoordinationStrategy, ExecutionId, ExecutionStatus, OrchestrationConfig,
    Result, SwarmError, Task, TaskAssignment, TaskDefinition, TaskStatus, WorkflowExecution,
};
use swarmforge_orchestration::workflow::{WorkflowCoordinator, WorkflowExecutor};
use swarmforge_orchestration::{
    AgentPool, AgentRegistry, DelegationManager, InMemoryTaskStore, MessageBus, StatusStream,
    SwarmAgent, TaskManager,
};
use tokio::sync::{watch, RwLock};

/// Shared counters for observing executor behavior from inside agents
#[derive(Default)]
struct Probe {
    concurrent: AtomicUsize,
    peak: AtomicUsize,
    attempts: AtomicUsize,
}

impl Probe {
    fn enter(&self) {
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.concurrent.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Agent whose behavior is scripted per task type
struct ScriptedAgent {
    profile: AgentProfile,
    fail_types: HashSet<String>,
    delay: Duration,
    probe: Arc<Probe>,
}

impl ScriptedAgent {
    fn new(id: &str, capabilities: &[&str], max_concurrent: usize, probe: Arc<Probe>) -> Self {
        Self {
            profile: AgentProfile::new(
                AgentId::from(id),
                id,
                "generalist",
                capabilities.iter().map(|c| c.to_string()).collect(),
                max_concurrent,
            ),
            fail_types: HashSet::new(),
            delay: Duration::from_millis(20),
            probe,
        }
    }

    fn failing_on(mut self, task_type: &str) -> Self {
        self.fail_types.insert(task_type.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SwarmAgent for ScriptedAgent {
    fn id(&self) -> &AgentId {
        &self.profile.id
    }

    fn profile(&self) -> AgentProfile {
        self.profile.clone()
    }

    async fn execute(&self, assignment: TaskAssignment) -> Result<Value> {
        self.probe.enter();
        self.probe.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.probe.exit();

        if self.fail_types.contains(&assignment.task_type) {
            return Err(SwarmError::AgentExecution {
                task: assignment.task_id,
                detail: "deliberate failure".to_string(),
            });
        }
        Ok(json!({ "task_type": assignment.task_type }))
    }
}

const ALL_CAPS: &[&str] = &[
    "system_design",
    "architecture",
    "ui_components",
    "frontend",
    "api_design",
    "backend",
    "testing",
    "validation",
    "performance",
    "documentation",
];

struct Harness {
    tasks: Arc<TaskManager>,
    executor: Arc<WorkflowExecutor>,
}

impl Harness {
    async fn new(agents: Vec<Arc<dyn SwarmAgent>>, limit: usize) -> Self {
        let registry = Arc::new(AgentRegistry::new());
        let bus = Arc::new(MessageBus::new(64));
        let store = Arc::new(InMemoryTaskStore::new());
        let tasks = Arc::new(TaskManager::new(store.clone()));
        let delegation = Arc::new(DelegationManager::new(registry.clone()));
        let status = Arc::new(StatusStream::new());
        let pool = Arc::new(
            AgentPool::from_agents(agents, &registry, &bus)
                .await
                .unwrap(),
        );

        let config = OrchestrationConfig {
            max_concurrent_tasks: limit,
            bus_history_limit: 64,
            default_max_retries: 2,
        };
        let executor = Arc::new(WorkflowExecutor::new(
            tasks.clone(),
            registry,
            delegation,
            bus,
            pool,
            status,
            store,
            &config,
        ));

        Self { tasks, executor }
    }

    /// Create tasks, partition them, and run the execution to the end
    async fn run(&self, definitions: &[TaskDefinition]) -> (ExecutionStatus, Vec<Task>) {
        let (execution, pause_rx) = self.prepare(definitions).await;
        let execution_id = execution.read().await.id;
        let status = self.executor.run(execution, pause_rx).await.unwrap();
        (status, self.tasks.get_tasks(execution_id).await)
    }

    async fn prepare(
        &self,
        definitions: &[TaskDefinition],
    ) -> (Arc<RwLock<WorkflowExecution>>, watch::Receiver<bool>) {
        let execution_id = ExecutionId::new();
        let created = self
            .tasks
            .create_tasks(execution_id, definitions)
            .await
            .unwrap();
        let phases = WorkflowCoordinator::partition_phases(&created).unwrap();
        let execution = WorkflowExecution::new(execution_id, phases, CoordinationStrategy::Hybrid);
        // the dropped sender leaves the run unpaused for its whole lifetime
        let (_pause_tx, pause_rx) = watch::channel(false);
        (Arc::new(RwLock::new(execution)), pause_rx)
    }
}

fn diamond() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::new("architecture", "design the system"),
        TaskDefinition::new("frontend", "build the ui")
            .with_dependencies(vec!["architecture".to_string()]),
        TaskDefinition::new("backend", "build the api")
            .with_dependencies(vec!["architecture".to_string()]),
        TaskDefinition::new("integration", "wire ui to api")
            .with_dependencies(vec!["frontend".to_string(), "backend".to_string()]),
    ]
}

#[tokio::test]
async fn diamond_workflow_completes_in_dependency_order() {
    let probe = Arc::new(Probe::default());
    let agents: Vec<Arc<dyn SwarmAgent>> =
        vec![Arc::new(ScriptedAgent::new("gen-1", ALL_CAPS, 4, probe))];
    let harness = Harness::new(agents, 3).await;

    let (status, tasks) = harness.run(&diamond()).await;

    assert_eq!(status, ExecutionStatus::Completed);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));

    // a dependency's terminal update never postdates its dependent's
    for task in &tasks {
        for dep in &task.dependencies {
            let dep_task = tasks.iter().find(|t| t.id == *dep).unwrap();
            assert!(dep_task.updated_at <= task.updated_at);
        }
    }

    // every task carries a result and an assignee
    for task in &tasks {
        assert!(task.result.is_some());
        assert!(task.assigned_agent.is_some());
        assert!(task.actual_duration_ms.is_some());
    }
}

#[tokio::test]
async fn in_flight_tasks_never_exceed_the_process_cap() {
    let probe = Arc::new(Probe::default());
    let agents: Vec<Arc<dyn SwarmAgent>> = vec![
        Arc::new(ScriptedAgent::new("gen-1", ALL_CAPS, 4, probe.clone())),
        Arc::new(ScriptedAgent::new("gen-2", ALL_CAPS, 4, probe.clone())),
        Arc::new(ScriptedAgent::new("gen-3", ALL_CAPS, 4, probe.clone())),
    ];
    let harness = Harness::new(agents, 2).await;

    let definitions: Vec<TaskDefinition> = (0..6)
        .map(|i| TaskDefinition::new("backend", format!("independent task {}", i)))
        .collect();

    let (status, tasks) = harness.run(&definitions).await;

    assert_eq!(status, ExecutionStatus::Completed);
    assert_eq!(tasks.len(), 6);
    assert!(probe.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn per_agent_cap_defers_the_overflow_task() {
    let probe = Arc::new(Probe::default());
    // one agent with room for 2, process cap of 3: the third task waits
    let agents: Vec<Arc<dyn SwarmAgent>> =
        vec![Arc::new(ScriptedAgent::new("solo", ALL_CAPS, 2, probe.clone()))];
    let harness = Harness::new(agents, 3).await;

    let definitions: Vec<TaskDefinition> = (0..3)
        .map(|i| TaskDefinition::new("backend", format!("task {}", i)))
        .collect();

    let (status, tasks) = harness.run(&definitions).await;

    assert_eq!(status, ExecutionStatus::Completed);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
    assert_eq!(probe.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failure_blocks_dependents_but_not_siblings() {
    let probe = Arc::new(Probe::default());
    let agents: Vec<Arc<dyn SwarmAgent>> = vec![Arc::new(
        ScriptedAgent::new("gen-1", ALL_CAPS, 4, probe).failing_on("backend"),
    )];
    let harness = Harness::new(agents, 3).await;

    let definitions = vec![
        TaskDefinition::new("architecture", "design"),
        TaskDefinition::new("frontend", "ui").with_dependencies(vec!["architecture".to_string()]),
        TaskDefinition::new("backend", "api").with_dependencies(vec!["architecture".to_string()]),
        TaskDefinition::new("integration", "wire together")
            .with_dependencies(vec!["backend".to_string()]),
        TaskDefinition::new("validation", "verify")
            .with_dependencies(vec!["integration".to_string()]),
    ];

    let (status, tasks) = harness.run(&definitions).await;

    assert_eq!(status, ExecutionStatus::Failed);

    let by_type = |t: &str| tasks.iter().find(|x| x.task_type == t).unwrap().clone();
    assert_eq!(by_type("architecture").status, TaskStatus::Completed);
    assert_eq!(by_type("frontend").status, TaskStatus::Completed);
    assert_eq!(by_type("backend").status, TaskStatus::Failed);
    // transitively blocked tasks never leave pending
    assert_eq!(by_type("integration").status, TaskStatus::Pending);
    assert_eq!(by_type("validation").status, TaskStatus::Pending);
}

#[tokio::test]
async fn retryable_failures_consume_the_retry_budget() {
    // "validation failed" classifies as retryable, so with a budget of 2 the
    // executor makes 3 attempts before giving up
    struct FlakyAgent {
        profile: AgentProfile,
        probe: Arc<Probe>,
    }

    #[async_trait]
    impl SwarmAgent for FlakyAgent {
        fn id(&self) -> &AgentId {
            &self.profile.id
        }
        fn profile(&self) -> AgentProfile {
            self.profile.clone()
        }
        async fn execute(&self, assignment: TaskAssignment) -> Result<Value> {
            self.probe.attempts.fetch_add(1, Ordering::SeqCst);
            Err(SwarmError::AgentExecution {
                task: assignment.task_id,
                detail: "validation failed: bad output".to_string(),
            })
        }
    }

    let probe = Arc::new(Probe::default());
    let agents: Vec<Arc<dyn SwarmAgent>> = vec![Arc::new(FlakyAgent {
        profile: AgentProfile::new(
            AgentId::from("flaky"),
            "flaky",
            "generalist",
            ALL_CAPS.iter().map(|c| c.to_string()).collect(),
            2,
        ),
        probe: probe.clone(),
    })];
    let harness = Harness::new(agents, 3).await;

    let (status, tasks) = harness
        .run(&[TaskDefinition::new("backend", "always fails")])
        .await;

    assert_eq!(status, ExecutionStatus::Failed);
    assert_eq!(tasks[0].status, TaskStatus::Failed);
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn non_retryable_failures_fail_on_the_first_attempt() {
    let probe = Arc::new(Probe::default());
    let agents: Vec<Arc<dyn SwarmAgent>> = vec![Arc::new(
        ScriptedAgent::new("gen-1", ALL_CAPS, 4, probe.clone()).failing_on("backend"),
    )];
    let harness = Harness::new(agents, 3).await;

    let (status, _) = harness
        .run(&[TaskDefinition::new("backend", "fails hard")])
        .await;

    assert_eq!(status, ExecutionStatus::Failed);
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn workflow_without_agents_fails_without_hanging() {
    let harness = Harness::new(Vec::new(), 3).await;

    let (status, tasks) = harness
        .run(&[TaskDefinition::new("knowledge", "document things")])
        .await;

    assert_eq!(status, ExecutionStatus::Failed);
    assert_eq!(tasks[0].status, TaskStatus::Pending);
}

#[tokio::test]
async fn capability_mismatch_still_assigns_an_available_agent() {
    let probe = Arc::new(Probe::default());
    // scoring prefers capability matches but an idle active agent can still
    // pick up off-profile work
    let agents: Vec<Arc<dyn SwarmAgent>> = vec![Arc::new(ScriptedAgent::new(
        "ui-only",
        &["ui_components", "frontend"],
        2,
        probe,
    ))];
    let harness = Harness::new(agents, 3).await;

    let (status, tasks) = harness
        .run(&[TaskDefinition::new("knowledge", "document things")])
        .await;

    assert_eq!(status, ExecutionStatus::Completed);
    assert_eq!(tasks[0].assigned_agent, Some(AgentId::from("ui-only")));
}

#[tokio::test]
async fn overlapping_executions_share_a_one_slot_roster() {
    let probe = Arc::new(Probe::default());
    let agents: Vec<Arc<dyn SwarmAgent>> = vec![Arc::new(
        ScriptedAgent::new("solo", ALL_CAPS, 1, probe.clone())
            .with_delay(Duration::from_millis(60)),
    )];
    let harness = Harness::new(agents, 3).await;

    let (exec_a, rx_a) = harness
        .prepare(&[TaskDefinition::new("backend", "first job")])
        .await;
    let (exec_b, rx_b) = harness
        .prepare(&[TaskDefinition::new("backend", "second job")])
        .await;
    let id_b = exec_b.read().await.id;

    let executor_a = harness.executor.clone();
    let run_a = tokio::spawn(async move { executor_a.run(exec_a, rx_a).await });

    // the second execution arrives while the only slot is taken; it must
    // keep its task pending and pick up the slot once it frees
    tokio::time::sleep(Duration::from_millis(10)).await;
    let executor_b = harness.executor.clone();
    let run_b = tokio::spawn(async move { executor_b.run(exec_b, rx_b).await });

    assert_eq!(run_a.await.unwrap().unwrap(), ExecutionStatus::Completed);
    assert_eq!(run_b.await.unwrap().unwrap(), ExecutionStatus::Completed);
    assert_eq!(probe.peak.load(Ordering::SeqCst), 1);

    let tasks_b = harness.tasks.get_tasks(id_b).await;
    assert_eq!(tasks_b[0].status, TaskStatus::Completed);
}

#[tokio::test]
async fn pause_drains_in_flight_work_and_resume_continues() {
    let probe = Arc::new(Probe::default());
    let agents: Vec<Arc<dyn SwarmAgent>> = vec![Arc::new(
        ScriptedAgent::new("gen-1", ALL_CAPS, 4, probe).with_delay(Duration::from_millis(50)),
    )];
    let harness = Harness::new(agents, 3).await;

    let definitions = vec![
        TaskDefinition::new("architecture", "step one"),
        TaskDefinition::new("backend", "step two")
            .with_dependencies(vec!["architecture".to_string()]),
        TaskDefinition::new("validation", "step three")
            .with_dependencies(vec!["backend".to_string()]),
    ];

    let execution_id = ExecutionId::new();
    let created = harness
        .tasks
        .create_tasks(execution_id, &definitions)
        .await
        .unwrap();
    let phases = WorkflowCoordinator::partition_phases(&created).unwrap();
    let execution = Arc::new(RwLock::new(WorkflowExecution::new(
        execution_id,
        phases,
        CoordinationStrategy::Centralized,
    )));

    let (pause_tx, pause_rx) = watch::channel(false);
    let executor = harness.executor.clone();
    let shared = execution.clone();
    let run = tokio::spawn(async move { executor.run(shared, pause_rx).await });

    // pause while the first task is still in flight
    tokio::time::sleep(Duration::from_millis(20)).await;
    pause_tx.send(true).unwrap();

    // the in-flight task drains, nothing new starts
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(execution.read().await.status, ExecutionStatus::Paused);
    let mid = harness.tasks.get_tasks(execution_id).await;
    assert_eq!(
        mid.iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count(),
        1
    );
    assert_eq!(
        mid.iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count(),
        2
    );

    // pausing again is a no-op
    pause_tx.send(true).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(execution.read().await.status, ExecutionStatus::Paused);

    pause_tx.send(false).unwrap();
    let status = run.await.unwrap().unwrap();
    assert_eq!(status, ExecutionStatus::Completed);

    let done = harness.tasks.get_tasks(execution_id).await;
    assert!(done.iter().all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test]
async fn five_task_workflow_partitions_into_four_phases() {
    let probe = Arc::new(Probe::default());
    let agents: Vec<Arc<dyn SwarmAgent>> =
        vec![Arc::new(ScriptedAgent::new("gen-1", ALL_CAPS, 4, probe))];
    let harness = Harness::new(agents, 3).await;

    let definitions = vec![
        TaskDefinition::new("architecture", "design"),
        TaskDefinition::new("frontend", "ui").with_dependencies(vec!["architecture".to_string()]),
        TaskDefinition::new("backend", "api").with_dependencies(vec!["architecture".to_string()]),
        TaskDefinition::new("integration", "wire")
            .with_dependencies(vec!["frontend".to_string(), "backend".to_string()]),
        TaskDefinition::new("validation", "verify")
            .with_dependencies(vec!["integration".to_string()]),
    ];

    let (execution, pause_rx) = harness.prepare(&definitions).await;
    {
        let exec = execution.read().await;
        assert_eq!(exec.phases.len(), 4);
        assert_eq!(exec.phases[0].len(), 1);
        assert_eq!(exec.phases[1].len(), 2);
        assert_eq!(exec.phases[2].len(), 1);
        assert_eq!(exec.phases[3].len(), 1);
    }

    let status = harness.executor.run(execution.clone(), pause_rx).await.unwrap();
    assert_eq!(status, ExecutionStatus::Completed);
    let exec = execution.read().await;
    assert!((exec.progress - 1.0).abs() < f32::EPSILON);
    assert!(exec.finished_at.is_some());
}
