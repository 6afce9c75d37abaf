//! Agent trait and pool management

pub mod specialized;

pub use specialized::SpecializedAgent;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use swarmforge_common::{AgentId, AgentProfile, AgentSpec, Result, TaskAssignment};
use tracing::debug;

use crate::bus::MessageBus;
use crate::registry::AgentRegistry;

/// A capability-bearing worker; the executor hands it task assignments and
/// awaits an opaque result payload
#[async_trait]
pub trait SwarmAgent: Send + Sync {
    fn id(&self) -> &AgentId;
    fn profile(&self) -> AgentProfile;
    async fn execute(&self, assignment: TaskAssignment) -> Result<Value>;
}

pub struct AgentPool {
    agents: HashMap<AgentId, Arc<dyn SwarmAgent>>,
}

impl AgentPool {
    /// Build the roster, registering each agent and wiring its bus inbox
    pub async fn from_roster(
        specs: &[AgentSpec],
        registry: &AgentRegistry,
        bus: &MessageBus,
    ) -> Result<Self> {
        let agents = specs
            .iter()
            .map(|spec| Arc::new(SpecializedAgent::from_spec(spec)) as Arc<dyn SwarmAgent>)
            .collect();
        Self::from_agents(agents, registry, bus).await
    }

    /// Pool arbitrary agent implementations, registering each and wiring its
    /// bus inbox
    pub async fn from_agents(
        agents: Vec<Arc<dyn SwarmAgent>>,
        registry: &AgentRegistry,
        bus: &MessageBus,
    ) -> Result<Self> {
        let mut pooled: HashMap<AgentId, Arc<dyn SwarmAgent>> = HashMap::new();

        for agent in agents {
            let id = agent.id().clone();
            registry.register(agent.profile()).await?;

            // Drain the inbox in the background so direct sends always land
            let mut inbox = bus.attach_inbox(&id).await;
            let inbox_id = id.clone();
            tokio::spawn(async move {
                while let Some(event) = inbox.recv().await {
                    debug!(
                        "Agent {} received {} event from {}",
                        inbox_id, event.event_type, event.source
                    );
                }
            });

            pooled.insert(id, agent);
        }

        Ok(Self { agents: pooled })
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<dyn SwarmAgent>> {
        self.agents.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
