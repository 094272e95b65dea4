use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier wrapper for inbound leads.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

/// Identifier wrapper for sales agents. Ordering is lexicographic and drives the final tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LeadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Property categories a lead can be interested in and an agent can specialize in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    SingleFamily,
    Condo,
    Townhouse,
    MultiFamily,
    Land,
    Commercial,
    Rental,
}

impl PropertyType {
    pub const fn label(self) -> &'static str {
        match self {
            PropertyType::SingleFamily => "single_family",
            PropertyType::Condo => "condo",
            PropertyType::Townhouse => "townhouse",
            PropertyType::MultiFamily => "multi_family",
            PropertyType::Land => "land",
            PropertyType::Commercial => "commercial",
            PropertyType::Rental => "rental",
        }
    }
}

/// Whether an agent can currently take work. Offline agents never enter the candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Busy,
    Offline,
}

/// Historical performance figures feeding the match score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub conversion_rate_pct: f64,
    pub avg_response_time_minutes: f64,
    pub closed_deals: u32,
}

/// Snapshot of a sales agent as read from the agent directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub location: String,
    pub specializations: BTreeSet<PropertyType>,
    pub max_capacity: i32,
    pub current_lead_count: i32,
    pub performance: AgentPerformance,
    pub availability: Availability,
}

impl Agent {
    pub fn specializes_in(&self, property_type: PropertyType) -> bool {
        self.specializations.contains(&property_type)
    }

    pub fn is_at_capacity(&self) -> bool {
        self.current_lead_count >= self.max_capacity
    }
}

/// Price range a lead is shopping in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub min: u64,
    pub max: u64,
}

/// Inbound prospect awaiting (or holding) an agent assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
    pub property_type: PropertyType,
    pub preferred_location: String,
    pub budget: Budget,
    pub lead_score: u8,
    #[serde(default)]
    pub assigned_agent_id: Option<AgentId>,
}

/// Caller intent for a single assignment call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AssignmentRequest {
    Manual {
        lead_id: LeadId,
        target_agent_id: AgentId,
    },
    Auto {
        lead_ids: BTreeSet<LeadId>,
        #[serde(default)]
        force: bool,
    },
}

/// Why a single lead in a batch could not be assigned.
///
/// Serialized as `{"kind": "..."}`, with a `detail` string for persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    NoEligibleAgent,
    NotFound,
    PersistenceError(String),
}

impl FailureReason {
    pub fn summary(&self) -> String {
        match self {
            FailureReason::NoEligibleAgent => "no eligible agent".to_string(),
            FailureReason::NotFound => "lead not found".to_string(),
            FailureReason::PersistenceError(detail) => format!("persistence error: {detail}"),
        }
    }
}

/// Accumulated outcome of a batch call. A non-empty `failed` map is not itself an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub assigned: BTreeMap<LeadId, AgentId>,
    pub failed: BTreeMap<LeadId, FailureReason>,
    /// Leads left with their existing owner because the batch was not forced.
    pub skipped: BTreeMap<LeadId, AgentId>,
    pub cancelled: bool,
}

impl AssignmentResult {
    pub fn processed(&self) -> usize {
        self.assigned.len() + self.failed.len() + self.skipped.len()
    }
}
