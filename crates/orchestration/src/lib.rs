//! Swarmforge: multi-agent task orchestration engine
//!
//! This crate turns a single user request into a directed graph of
//! interdependent tasks and executes it with a swarm of specialized agents:
//! - Dependency-ordered phase partitioning using petgraph
//! - Concurrency-bounded, event-driven execution with partial failure
//! - Capability- and load-based task delegation
//! - Point-to-point and broadcast agent messaging with bounded history
//! - Pause/resume control and real-time status streaming

pub mod agents;
pub mod bus;
pub mod delegation;
pub mod orchestrator;
pub mod registry;
pub mod reasoning;
pub mod status_stream;
pub mod store;
pub mod tasks;
pub mod tracing_setup;
pub mod workflow;

// Re-exports
pub use agents::{AgentPool, SwarmAgent};
pub use bus::MessageBus;
pub use delegation::DelegationManager;
pub use orchestrator::Orchestrator;
pub use reasoning::{HeuristicDecomposer, ReasoningService};
pub use registry::AgentRegistry;
pub use status_stream::{StatusEvent, StatusStream};
pub use store::{InMemoryTaskStore, TaskStore};
pub use tasks::TaskManager;
pub use workflow::{WorkflowCoordinator, WorkflowExecutor};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
