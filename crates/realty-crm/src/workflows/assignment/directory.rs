use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use super::domain::{Agent, AgentId, Availability, Lead, LeadId};

/// Selection criteria for `AgentDirectory::list_agents`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentFilter {
    pub include_offline: bool,
    pub ids: Option<BTreeSet<AgentId>>,
}

impl AgentFilter {
    /// Agents that may receive automatic assignments.
    pub fn assignable() -> Self {
        Self::default()
    }

    pub fn everyone() -> Self {
        Self {
            include_offline: true,
            ids: None,
        }
    }

    pub fn matches(&self, agent: &Agent) -> bool {
        let online = self.include_offline || agent.availability != Availability::Offline;
        let listed = self
            .ids
            .as_ref()
            .map(|ids| ids.contains(&agent.id))
            .unwrap_or(true);
        online && listed
    }
}

/// Staff directory owning agent records and their workload counters.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>, DirectoryError>;

    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, DirectoryError>;

    /// Atomically bumps the agent's lead count. With `enforce_capacity` the directory refuses
    /// with `AtCapacity` instead of moving past `max_capacity`.
    async fn increment_lead_count(
        &self,
        id: &AgentId,
        enforce_capacity: bool,
    ) -> Result<Agent, DirectoryError>;

    /// Lowers the agent's lead count, never below zero.
    async fn decrement_lead_count(&self, id: &AgentId) -> Result<Agent, DirectoryError>;
}

/// Lead storage owned by the CRM backend.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get(&self, id: &LeadId) -> Result<Option<Lead>, DirectoryError>;

    async fn set_assignment(
        &self,
        id: &LeadId,
        agent_id: Option<&AgentId>,
    ) -> Result<Lead, DirectoryError>;
}

/// Failures reported by the agent directory or lead store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("agent '{0}' is at capacity")]
    AtCapacity(AgentId),
    #[error("record not found")]
    NotFound,
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}
