use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::workflows::assignment::capacity::CapacityThresholds;
use crate::workflows::assignment::directory::{
    AgentDirectory, AgentFilter, DirectoryError, LeadStore,
};
use crate::workflows::assignment::domain::{
    Agent, AgentId, AgentPerformance, Availability, Budget, Lead, LeadId, PropertyType,
};
use crate::workflows::assignment::executor::{AssignmentExecutor, AssignmentSettings};
use crate::workflows::assignment::memory::{InMemoryAgentDirectory, InMemoryLeadStore};
use crate::workflows::assignment::repository::InMemoryRuleRepository;
use crate::workflows::assignment::rules::{
    AssignmentRule, CapacityRule, GeolocationRule, RuleConditions, RuleId, RulePayload, RuleSet,
    SpecializationRule,
};

pub(super) type MemoryExecutor =
    AssignmentExecutor<InMemoryRuleRepository, InMemoryAgentDirectory, InMemoryLeadStore>;

pub(super) fn agent(id: &str, current: i32, max: i32) -> Agent {
    Agent {
        id: AgentId::from(id),
        name: format!("Agent {id}"),
        location: "Des Moines".to_string(),
        specializations: BTreeSet::new(),
        max_capacity: max,
        current_lead_count: current,
        performance: AgentPerformance {
            conversion_rate_pct: 20.0,
            avg_response_time_minutes: 30.0,
            closed_deals: 10,
        },
        availability: Availability::Available,
    }
}

/// 12/20 leads, condo specialist, 24.5% conversion, 15 minute responses.
pub(super) fn agent_a() -> Agent {
    Agent {
        id: AgentId::from("agent-a"),
        name: "Avery Stone".to_string(),
        location: "Downtown".to_string(),
        specializations: BTreeSet::from([PropertyType::Condo]),
        max_capacity: 20,
        current_lead_count: 12,
        performance: AgentPerformance {
            conversion_rate_pct: 24.5,
            avg_response_time_minutes: 15.0,
            closed_deals: 31,
        },
        availability: Availability::Available,
    }
}

/// Weaker on every factor than `agent_a`.
pub(super) fn agent_b() -> Agent {
    Agent {
        id: AgentId::from("agent-b"),
        name: "Blake Rivera".to_string(),
        location: "Ankeny".to_string(),
        specializations: BTreeSet::from([PropertyType::SingleFamily]),
        max_capacity: 20,
        current_lead_count: 15,
        performance: AgentPerformance {
            conversion_rate_pct: 12.0,
            avg_response_time_minutes: 45.0,
            closed_deals: 9,
        },
        availability: Availability::Available,
    }
}

pub(super) fn lead(id: &str, property_type: PropertyType) -> Lead {
    Lead {
        id: LeadId::from(id),
        name: format!("Prospect {id}"),
        source: "website".to_string(),
        property_type,
        preferred_location: "Downtown".to_string(),
        budget: Budget {
            min: 240_000,
            max: 320_000,
        },
        lead_score: 64,
        assigned_agent_id: None,
    }
}

pub(super) fn geo_rule(id: &str, priority: i32, areas: &[&str], agents: &[&str]) -> AssignmentRule {
    AssignmentRule {
        id: RuleId(id.to_string()),
        name: format!("Coverage {id}"),
        priority,
        active: true,
        payload: RulePayload::Geolocation(GeolocationRule {
            coverage_areas: areas.iter().map(|area| area.to_string()).collect(),
            eligible_agent_ids: agents.iter().map(|agent| AgentId::from(*agent)).collect(),
        }),
        conditions: RuleConditions::default(),
    }
}

pub(super) fn capacity_rule(id: &str, priority: i32, thresholds: CapacityThresholds) -> AssignmentRule {
    AssignmentRule {
        id: RuleId(id.to_string()),
        name: format!("Workload {id}"),
        priority,
        active: true,
        payload: RulePayload::Capacity(CapacityRule {
            max_leads_per_agent: 50,
            thresholds,
        }),
        conditions: RuleConditions::default(),
    }
}

pub(super) fn specialization_rule(
    id: &str,
    priority: i32,
    mapping: &[(PropertyType, &[&str])],
) -> AssignmentRule {
    let property_type_agents: BTreeMap<PropertyType, Vec<AgentId>> = mapping
        .iter()
        .map(|(property_type, agents)| {
            (
                *property_type,
                agents.iter().map(|agent| AgentId::from(*agent)).collect(),
            )
        })
        .collect();

    AssignmentRule {
        id: RuleId(id.to_string()),
        name: format!("Specialists {id}"),
        priority,
        active: true,
        payload: RulePayload::Specialization(SpecializationRule {
            property_type_agents,
        }),
        conditions: RuleConditions::default(),
    }
}

pub(super) fn build_executor(
    rules: RuleSet,
    agents: Vec<Agent>,
    leads: Vec<Lead>,
) -> (MemoryExecutor, InMemoryAgentDirectory, InMemoryLeadStore) {
    let directory = InMemoryAgentDirectory::with_agents(agents);
    let store = InMemoryLeadStore::with_leads(leads);
    let executor = AssignmentExecutor::new(
        Arc::new(InMemoryRuleRepository::new(rules)),
        Arc::new(directory.clone()),
        Arc::new(store.clone()),
        AssignmentSettings::default(),
    );
    (executor, directory, store)
}

pub(super) fn lead_count(directory: &InMemoryAgentDirectory, id: &str) -> i32 {
    directory
        .snapshot(&AgentId::from(id))
        .expect("agent present")
        .current_lead_count
}

/// Directory that never answers within any reasonable timeout.
pub(super) struct StalledDirectory;

#[async_trait]
impl AgentDirectory for StalledDirectory {
    async fn list_agents(&self, _filter: &AgentFilter) -> Result<Vec<Agent>, DirectoryError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn get_agent(&self, _id: &AgentId) -> Result<Option<Agent>, DirectoryError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }

    async fn increment_lead_count(
        &self,
        _id: &AgentId,
        _enforce_capacity: bool,
    ) -> Result<Agent, DirectoryError> {
        Err(DirectoryError::Unavailable("stalled".to_string()))
    }

    async fn decrement_lead_count(&self, _id: &AgentId) -> Result<Agent, DirectoryError> {
        Err(DirectoryError::Unavailable("stalled".to_string()))
    }
}

/// Lead store that reads fine but refuses every write.
#[derive(Clone)]
pub(super) struct ReadOnlyLeadStore {
    pub(super) inner: InMemoryLeadStore,
}

#[async_trait]
impl LeadStore for ReadOnlyLeadStore {
    async fn get(&self, id: &LeadId) -> Result<Option<Lead>, DirectoryError> {
        self.inner.get(id).await
    }

    async fn set_assignment(
        &self,
        _id: &LeadId,
        _agent_id: Option<&AgentId>,
    ) -> Result<Lead, DirectoryError> {
        Err(DirectoryError::Unavailable("lead store is read only".to_string()))
    }
}

/// Directory that refuses to lower one agent's counter.
#[derive(Clone)]
pub(super) struct ReleaseFailingDirectory {
    pub(super) inner: InMemoryAgentDirectory,
    pub(super) refused: AgentId,
}

#[async_trait]
impl AgentDirectory for ReleaseFailingDirectory {
    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>, DirectoryError> {
        self.inner.list_agents(filter).await
    }

    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, DirectoryError> {
        self.inner.get_agent(id).await
    }

    async fn increment_lead_count(
        &self,
        id: &AgentId,
        enforce_capacity: bool,
    ) -> Result<Agent, DirectoryError> {
        self.inner.increment_lead_count(id, enforce_capacity).await
    }

    async fn decrement_lead_count(&self, id: &AgentId) -> Result<Agent, DirectoryError> {
        if *id == self.refused {
            return Err(DirectoryError::Unavailable(
                "counter service rejected the release".to_string(),
            ));
        }
        self.inner.decrement_lead_count(id).await
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
