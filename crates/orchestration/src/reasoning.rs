//! Reasoning service seam and the built-in heuristic decomposer
//!
//! Natural-language understanding itself is delegated to an external
//! service behind the `ReasoningService` trait. The heuristic impl keeps the
//! engine usable (and testable) without one.

use async_trait::async_trait;
use serde_json::Value;
use swarmforge_common::{Decomposition, Result, SwarmError, TaskDefinition, TaskPriority};
use tracing::debug;

#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Turn a prompt plus opaque context into a task decomposition
    async fn decompose(&self, prompt: &str, context: &Value) -> Result<Decomposition>;
}

/// Keyword-driven decomposer
///
/// Trivial prompts collapse to a single architecture task; anything larger
/// yields the architecture -> {frontend, backend} -> integration ->
/// validation graph, with knowledge and optimization tasks attached when the
/// prompt asks for them.
pub struct HeuristicDecomposer;

impl HeuristicDecomposer {
    pub fn new() -> Self {
        Self
    }

    fn mentions(prompt: &str, keywords: &[&str]) -> bool {
        let lower = prompt.to_lowercase();
        keywords.iter().any(|k| lower.contains(k))
    }
}

impl Default for HeuristicDecomposer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningService for HeuristicDecomposer {
    async fn decompose(&self, prompt: &str, _context: &Value) -> Result<Decomposition> {
        if prompt.trim().is_empty() {
            return Err(SwarmError::Decomposition("empty prompt".to_string()));
        }

        let mut tasks = vec![TaskDefinition::new(
            "architecture",
            format!("Design the overall architecture for: {}", prompt),
        )
        .with_priority(TaskPriority::High)];

        // Short prompts with no structure hints stay a single task
        if prompt.split_whitespace().count() < 5 {
            debug!("Trivial prompt, single-task decomposition");
            return Ok(Decomposition {
                tasks,
                summary: format!("Single architecture task for: {}", prompt),
            });
        }

        let wants_frontend = Self::mentions(
            prompt,
            &["ui", "frontend", "page", "dashboard", "interface", "web", "app"],
        );
        let wants_backend = Self::mentions(
            prompt,
            &["api", "backend", "server", "database", "service", "auth", "app"],
        );

        let mut integration_deps = Vec::new();
        if wants_frontend {
            tasks.push(
                TaskDefinition::new("frontend", format!("Build the user interface for: {}", prompt))
                    .with_dependencies(vec!["architecture".to_string()]),
            );
            integration_deps.push("frontend".to_string());
        }
        if wants_backend {
            tasks.push(
                TaskDefinition::new("backend", format!("Build the server side for: {}", prompt))
                    .with_dependencies(vec!["architecture".to_string()]),
            );
            integration_deps.push("backend".to_string());
        }

        if integration_deps.is_empty() {
            integration_deps.push("architecture".to_string());
        }

        tasks.push(
            TaskDefinition::new("integration", "Integrate the generated components")
                .with_dependencies(integration_deps),
        );
        tasks.push(
            TaskDefinition::new("validation", "Validate the assembled project")
                .with_dependencies(vec!["integration".to_string()])
                .with_priority(TaskPriority::High),
        );

        if Self::mentions(prompt, &["performance", "optimize", "fast", "scalable"]) {
            tasks.push(
                TaskDefinition::new("optimization", "Profile and tune the generated project")
                    .with_dependencies(vec!["integration".to_string()])
                    .with_priority(TaskPriority::Low),
            );
        }
        if Self::mentions(prompt, &["document", "docs", "readme", "research"]) {
            tasks.push(
                TaskDefinition::new("knowledge", "Produce project documentation")
                    .with_dependencies(vec!["architecture".to_string()])
                    .with_priority(TaskPriority::Low),
            );
        }

        debug!("Decomposed prompt into {} tasks", tasks.len());
        Ok(Decomposition {
            summary: format!("{}-task decomposition for: {}", tasks.len(), prompt),
            tasks,
        })
    }
}
