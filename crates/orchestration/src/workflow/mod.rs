//! Workflow DAG handling and execution

pub mod coordinator;
pub mod executor;

pub use coordinator::WorkflowCoordinator;
pub use executor::WorkflowExecutor;

use petgraph::graph::DiGraph;
use swarmforge_common::TaskId;

/// Workflow graph type: nodes are task ids, edges point dependency -> dependent
pub type WorkflowGraph = DiGraph<TaskId, ()>;
