//! Agent registry: the shared roster of known agents
//!
//! The registry is the sole mutation point for agent records. All updates go
//! through its async API, which serializes them behind one lock and avoids
//! lost updates even though callers interleave freely.

use chrono::Utc;
use std::collections::HashMap;
use swarmforge_common::{AgentId, AgentProfile, AgentStatus, Result, SwarmError};
use tokio::sync::{watch, RwLock};
use tracing::debug;

struct RegistryInner {
    agents: HashMap<AgentId, AgentProfile>,
    /// Registration order, used as the deterministic delegation tie-break
    order: Vec<AgentId>,
}

pub struct AgentRegistry {
    inner: RwLock<RegistryInner>,
    /// Bumped whenever roster capacity may have grown; executors waiting for
    /// a slot watch this instead of polling
    slot_events: watch::Sender<u64>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        let (slot_events, _) = watch::channel(0);
        Self {
            inner: RwLock::new(RegistryInner {
                agents: HashMap::new(),
                order: Vec::new(),
            }),
            slot_events,
        }
    }

    /// Observe capacity changes; the receiver resolves whenever a slot is
    /// released or an agent joins or comes back online
    pub fn subscribe_slots(&self) -> watch::Receiver<u64> {
        self.slot_events.subscribe()
    }

    fn bump_slot_events(&self) {
        self.slot_events.send_modify(|n| *n += 1);
    }

    /// Register a new agent, failing on id collision
    pub async fn register(&self, profile: AgentProfile) -> Result<AgentId> {
        let mut inner = self.inner.write().await;
        let id = profile.id.clone();

        if inner.agents.contains_key(&id) {
            return Err(SwarmError::DuplicateAgent(id));
        }

        debug!("Registered agent {} ({})", id, profile.agent_type);
        inner.order.push(id.clone());
        inner.agents.insert(id.clone(), profile);
        drop(inner);
        self.bump_slot_events();
        Ok(id)
    }

    /// Update an agent's status, stamping its last activity
    pub async fn update_status(&self, id: &AgentId, status: AgentStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let profile = inner
            .agents
            .get_mut(id)
            .ok_or_else(|| SwarmError::UnknownAgent(id.clone()))?;

        profile.status = status;
        profile.last_activity = Utc::now();
        drop(inner);
        if status.is_active() {
            self.bump_slot_events();
        }
        Ok(())
    }

    /// All registered agents, in registration order
    pub async fn list(&self) -> Vec<AgentProfile> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.agents.get(id).cloned())
            .collect()
    }

    pub async fn get(&self, id: &AgentId) -> Option<AgentProfile> {
        let inner = self.inner.read().await;
        inner.agents.get(id).cloned()
    }

    /// Reserve one concurrent-task slot on the agent
    ///
    /// Fails with `AgentUnavailable` when the agent is at its per-agent cap
    /// or not active; the caller keeps the task pending and retries on the
    /// next scheduling pass.
    pub async fn reserve_slot(&self, id: &AgentId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let profile = inner
            .agents
            .get_mut(id)
            .ok_or_else(|| SwarmError::UnknownAgent(id.clone()))?;

        if !profile.has_capacity() {
            return Err(SwarmError::AgentUnavailable(format!(
                "agent {} at capacity ({}/{})",
                id, profile.current_task_count, profile.max_concurrent_tasks
            )));
        }

        profile.current_task_count += 1;
        profile.status = AgentStatus::Busy;
        profile.last_activity = Utc::now();
        Ok(())
    }

    /// Release a previously reserved slot and fold the outcome into the
    /// agent's rolling metrics
    pub async fn release_slot(&self, id: &AgentId, success: bool, duration_ms: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let profile = inner
            .agents
            .get_mut(id)
            .ok_or_else(|| SwarmError::UnknownAgent(id.clone()))?;

        profile.current_task_count = profile.current_task_count.saturating_sub(1);
        if profile.current_task_count == 0 && profile.status == AgentStatus::Busy {
            profile.status = AgentStatus::Idle;
        }
        if success {
            profile.metrics.record_success(duration_ms);
        } else {
            profile.metrics.record_failure(duration_ms);
        }
        profile.last_activity = Utc::now();
        drop(inner);
        self.bump_slot_events();
        Ok(())
    }

    /// Whether any registered agent currently holds a reserved slot
    ///
    /// False means no release is ever coming, so a scheduler that cannot
    /// place work has genuinely stalled.
    pub async fn any_slot_in_use(&self) -> bool {
        let inner = self.inner.read().await;
        inner.agents.values().any(|p| p.current_task_count > 0)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> AgentProfile {
        AgentProfile::new(
            AgentId::from(name),
            name,
            "architecture",
            vec!["system_design".to_string()],
            2,
        )
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let registry = AgentRegistry::new();
        registry.register(profile("architect")).await.unwrap();

        let err = registry.register(profile("architect")).await.unwrap_err();
        assert!(matches!(err, SwarmError::DuplicateAgent(_)));
    }

    #[tokio::test]
    async fn test_update_status_unknown_agent() {
        let registry = AgentRegistry::new();
        let err = registry
            .update_status(&AgentId::from("ghost"), AgentStatus::Offline)
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::UnknownAgent(_)));
    }

    #[tokio::test]
    async fn test_list_preserves_registration_order() {
        let registry = AgentRegistry::new();
        registry.register(profile("first")).await.unwrap();
        registry.register(profile("second")).await.unwrap();
        registry.register(profile("third")).await.unwrap();

        let names: Vec<String> = registry.list().await.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_reserve_respects_per_agent_cap() {
        let registry = AgentRegistry::new();
        let id = registry.register(profile("architect")).await.unwrap();

        registry.reserve_slot(&id).await.unwrap();
        registry.reserve_slot(&id).await.unwrap();

        let err = registry.reserve_slot(&id).await.unwrap_err();
        assert!(matches!(err, SwarmError::AgentUnavailable(_)));

        registry.release_slot(&id, true, 100).await.unwrap();
        registry.reserve_slot(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_returns_agent_to_idle() {
        let registry = AgentRegistry::new();
        let id = registry.register(profile("architect")).await.unwrap();

        registry.reserve_slot(&id).await.unwrap();
        assert_eq!(registry.get(&id).await.unwrap().status, AgentStatus::Busy);

        registry.release_slot(&id, true, 250).await.unwrap();
        let profile = registry.get(&id).await.unwrap();
        assert_eq!(profile.status, AgentStatus::Idle);
        assert_eq!(profile.metrics.tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_slot_release_wakes_subscribers() {
        let registry = AgentRegistry::new();
        let id = registry.register(profile("architect")).await.unwrap();
        registry.reserve_slot(&id).await.unwrap();
        assert!(registry.any_slot_in_use().await);

        let mut slots = registry.subscribe_slots();
        slots.borrow_and_update();

        registry.release_slot(&id, true, 100).await.unwrap();
        slots.changed().await.unwrap();
        assert!(!registry.any_slot_in_use().await);
    }
}
