//! Delegation manager: capability- and load-based agent selection
//!
//! A greedy, stateless heuristic. It is not globally optimal, but it is
//! deterministic and cheap, which matters because delegation runs inline
//! during phase construction and again on every scheduling pass.

use std::sync::Arc;
use swarmforge_common::AgentProfile;
use tracing::debug;

use crate::registry::AgentRegistry;

/// Static task-type to required-capabilities table
pub fn required_capabilities(task_type: &str) -> &'static [&'static str] {
    match task_type {
        "architecture" => &["system_design", "architecture", "planning"],
        "frontend" => &["ui_components", "frontend", "styling"],
        "backend" => &["api_design", "backend", "database"],
        "integration" => &["api_design", "backend", "frontend"],
        "validation" => &["testing", "validation", "quality_assurance"],
        "optimization" => &["performance", "optimization", "profiling"],
        "knowledge" => &["documentation", "knowledge", "research"],
        _ => &[],
    }
}

/// Score one agent for a task type
///
/// 50 points for a capability match, up to 30 inversely proportional to
/// current load, 20 for being active. An agent with no free slot (or one
/// that is offline/paused) scores zero and is never selected.
pub fn score_agent(profile: &AgentProfile, required: &[&str]) -> u32 {
    if !profile.has_capacity() {
        return 0;
    }

    let mut score = 0;
    if required
        .iter()
        .any(|cap| profile.capabilities.iter().any(|c| c == cap))
    {
        score += 50;
    }
    score += 30u32.saturating_sub(profile.current_task_count as u32 * 5);
    if profile.status.is_active() {
        score += 20;
    }
    score
}

pub struct DelegationManager {
    registry: Arc<AgentRegistry>,
}

impl DelegationManager {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    /// Find the best available agent for a task type
    ///
    /// Highest score wins; ties break by registration order (the registry
    /// lists agents in registration order and the strict `>` keeps the first
    /// one seen). Returns `None` when nothing scores above zero; the caller
    /// leaves the task pending and retries on the next scheduling pass.
    pub async fn find_agent(&self, task_type: &str) -> Option<AgentProfile> {
        let required = required_capabilities(task_type);
        let mut best: Option<(u32, AgentProfile)> = None;

        for profile in self.registry.list().await {
            let score = score_agent(&profile, required);
            if score == 0 {
                continue;
            }
            match &best {
                Some((best_score, _)) if score <= *best_score => {}
                _ => best = Some((score, profile)),
            }
        }

        match best {
            Some((score, profile)) => {
                debug!(
                    "Delegated '{}' task to {} (score {})",
                    task_type, profile.id, score
                );
                Some(profile)
            }
            None => {
                debug!("No agent available for '{}' task", task_type);
                None
            }
        }
    }
}
