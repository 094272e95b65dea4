//! Process-local stores used by the demo service and the test suites.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::directory::{AgentDirectory, AgentFilter, DirectoryError, LeadStore};
use super::domain::{Agent, AgentId, Lead, LeadId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default, Clone)]
pub struct InMemoryAgentDirectory {
    agents: Arc<Mutex<BTreeMap<AgentId, Agent>>>,
}

impl InMemoryAgentDirectory {
    pub fn with_agents(agents: impl IntoIterator<Item = Agent>) -> Self {
        let directory = Self::default();
        for agent in agents {
            directory.upsert(agent);
        }
        directory
    }

    pub fn upsert(&self, agent: Agent) {
        lock(&self.agents).insert(agent.id.clone(), agent);
    }

    pub fn snapshot(&self, id: &AgentId) -> Option<Agent> {
        lock(&self.agents).get(id).cloned()
    }
}

#[async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>, DirectoryError> {
        Ok(lock(&self.agents)
            .values()
            .filter(|agent| filter.matches(agent))
            .cloned()
            .collect())
    }

    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, DirectoryError> {
        Ok(self.snapshot(id))
    }

    async fn increment_lead_count(
        &self,
        id: &AgentId,
        enforce_capacity: bool,
    ) -> Result<Agent, DirectoryError> {
        let mut guard = lock(&self.agents);
        let agent = guard.get_mut(id).ok_or(DirectoryError::NotFound)?;
        if enforce_capacity && agent.is_at_capacity() {
            return Err(DirectoryError::AtCapacity(id.clone()));
        }
        agent.current_lead_count += 1;
        Ok(agent.clone())
    }

    async fn decrement_lead_count(&self, id: &AgentId) -> Result<Agent, DirectoryError> {
        let mut guard = lock(&self.agents);
        let agent = guard.get_mut(id).ok_or(DirectoryError::NotFound)?;
        agent.current_lead_count = (agent.current_lead_count - 1).max(0);
        Ok(agent.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryLeadStore {
    leads: Arc<Mutex<BTreeMap<LeadId, Lead>>>,
}

impl InMemoryLeadStore {
    pub fn with_leads(leads: impl IntoIterator<Item = Lead>) -> Self {
        let store = Self::default();
        for lead in leads {
            store.upsert(lead);
        }
        store
    }

    pub fn upsert(&self, lead: Lead) {
        lock(&self.leads).insert(lead.id.clone(), lead);
    }

    pub fn snapshot(&self, id: &LeadId) -> Option<Lead> {
        lock(&self.leads).get(id).cloned()
    }

    pub fn all(&self) -> Vec<Lead> {
        lock(&self.leads).values().cloned().collect()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn get(&self, id: &LeadId) -> Result<Option<Lead>, DirectoryError> {
        Ok(self.snapshot(id))
    }

    async fn set_assignment(
        &self,
        id: &LeadId,
        agent_id: Option<&AgentId>,
    ) -> Result<Lead, DirectoryError> {
        let mut guard = lock(&self.leads);
        let lead = guard.get_mut(id).ok_or(DirectoryError::NotFound)?;
        lead.assigned_agent_id = agent_id.cloned();
        Ok(lead.clone())
    }
}
