use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub orchestration: OrchestrationConfig,
    #[serde(default = "default_roster")]
    pub roster: Vec<AgentSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Process-wide in-flight task limit
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Number of coordination events retained for observability
    #[serde(default = "default_bus_history_limit")]
    pub bus_history_limit: usize,

    /// Retry budget per task before a failure is declared terminal
    #[serde(default = "default_max_retries")]
    pub default_max_retries: usize,
}

fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_bus_history_limit() -> usize {
    256
}

fn default_max_retries() -> usize {
    2
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            bus_history_limit: default_bus_history_limit(),
            default_max_retries: default_max_retries(),
        }
    }
}

/// Static roster entry describing one specialized agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub agent_type: String,
    pub capabilities: Vec<String>,
    #[serde(default = "default_agent_cap")]
    pub max_concurrent_tasks: usize,
}

fn default_agent_cap() -> usize {
    2
}

/// The six built-in specializations
pub fn default_roster() -> Vec<AgentSpec> {
    let spec = |name: &str, agent_type: &str, caps: &[&str]| AgentSpec {
        name: name.to_string(),
        agent_type: agent_type.to_string(),
        capabilities: caps.iter().map(|c| c.to_string()).collect(),
        max_concurrent_tasks: default_agent_cap(),
    };

    vec![
        spec(
            "architect",
            "architecture",
            &["system_design", "architecture", "planning"],
        ),
        spec(
            "frontend-dev",
            "frontend",
            &["ui_components", "frontend", "styling"],
        ),
        spec(
            "backend-dev",
            "backend",
            &["api_design", "backend", "database"],
        ),
        spec(
            "validator",
            "validation",
            &["testing", "validation", "quality_assurance"],
        ),
        spec(
            "optimizer",
            "optimization",
            &["performance", "optimization", "profiling"],
        ),
        spec(
            "librarian",
            "knowledge",
            &["documentation", "knowledge", "research"],
        ),
    ]
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            orchestration: OrchestrationConfig::default(),
            roster: default_roster(),
        }
    }
}

impl SystemConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SystemConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(
            "Loaded configuration from {} ({} agents)",
            path,
            config.roster.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.orchestration.max_concurrent_tasks == 0 {
            anyhow::bail!("max_concurrent_tasks must be greater than 0");
        }
        if self.orchestration.bus_history_limit == 0 {
            anyhow::bail!("bus_history_limit must be greater than 0");
        }
        if self.roster.is_empty() {
            anyhow::bail!("roster must contain at least one agent");
        }
        for agent in &self.roster {
            if agent.max_concurrent_tasks == 0 {
                anyhow::bail!(
                    "agent '{}' has max_concurrent_tasks of 0",
                    agent.name
                );
            }
            if agent.capabilities.is_empty() {
                anyhow::bail!("agent '{}' declares no capabilities", agent.name);
            }
        }
        Ok(())
    }

    pub fn get_agent_spec(&self, name: &str) -> Option<&AgentSpec> {
        self.roster.iter().find(|a| a.name == name)
    }

    pub fn agents_by_type(&self, agent_type: &str) -> Vec<&AgentSpec> {
        self.roster
            .iter()
            .filter(|a| a.agent_type == agent_type)
            .collect()
    }
}
