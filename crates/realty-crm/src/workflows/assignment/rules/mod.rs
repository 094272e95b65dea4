//! Declarative routing rules and the three named collections they are stored in.
//!
//! Each rule carries a strongly typed payload; the wire `type` tag is derived from the payload
//! so a capacity rule can never carry geolocation data.

mod validation;

pub use validation::RuleValidationError;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::capacity::CapacityThresholds;
use super::domain::{AgentId, Lead, PropertyType};

/// Identifier wrapper for configured rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminant of a rule, matching the collection it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Geolocation,
    Capacity,
    Specialization,
}

impl RuleKind {
    pub const ALL: [RuleKind; 3] = [
        RuleKind::Geolocation,
        RuleKind::Capacity,
        RuleKind::Specialization,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            RuleKind::Geolocation => "geolocation",
            RuleKind::Capacity => "capacity",
            RuleKind::Specialization => "specialization",
        }
    }
}

/// Restricts a geolocation rule to leads whose preferred location falls inside its coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationRule {
    pub coverage_areas: Vec<String>,
    pub eligible_agent_ids: Vec<AgentId>,
}

impl GeolocationRule {
    pub fn covers(&self, location: &str) -> bool {
        let wanted = normalize_location(location);
        !wanted.is_empty()
            && self
                .coverage_areas
                .iter()
                .any(|area| normalize_location(area) == wanted)
    }

    pub fn eligible(&self) -> BTreeSet<AgentId> {
        self.eligible_agent_ids.iter().cloned().collect()
    }
}

/// Workload policy: per-agent ceiling plus the band thresholds used to exclude busy agents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRule {
    pub max_leads_per_agent: i32,
    pub thresholds: CapacityThresholds,
}

/// Maps property types to the agents allowed to work them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecializationRule {
    pub property_type_agents: BTreeMap<PropertyType, Vec<AgentId>>,
}

impl SpecializationRule {
    pub fn agents_for(&self, property_type: PropertyType) -> Option<BTreeSet<AgentId>> {
        self.property_type_agents
            .get(&property_type)
            .map(|agents| agents.iter().cloned().collect())
    }
}

/// Type-specific rule body.
#[derive(Debug, Clone, PartialEq)]
pub enum RulePayload {
    Geolocation(GeolocationRule),
    Capacity(CapacityRule),
    Specialization(SpecializationRule),
}

impl RulePayload {
    pub const fn kind(&self) -> RuleKind {
        match self {
            RulePayload::Geolocation(_) => RuleKind::Geolocation,
            RulePayload::Capacity(_) => RuleKind::Capacity,
            RulePayload::Specialization(_) => RuleKind::Specialization,
        }
    }
}

/// Lead predicate attached to a rule. Empty lists match every lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleConditions {
    pub sources: Vec<String>,
    pub property_types: Vec<PropertyType>,
    pub min_lead_score: Option<u8>,
}

impl RuleConditions {
    pub fn matches(&self, lead: &Lead) -> bool {
        let source_ok = self.sources.is_empty()
            || self
                .sources
                .iter()
                .any(|source| source.trim().eq_ignore_ascii_case(lead.source.trim()));
        let type_ok =
            self.property_types.is_empty() || self.property_types.contains(&lead.property_type);
        let score_ok = self
            .min_lead_score
            .map(|minimum| lead.lead_score >= minimum)
            .unwrap_or(true);

        source_ok && type_ok && score_ok
    }
}

/// A single configured routing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord", into = "RuleRecord")]
pub struct AssignmentRule {
    pub id: RuleId,
    pub name: String,
    pub priority: i32,
    pub active: bool,
    pub payload: RulePayload,
    pub conditions: RuleConditions,
}

impl AssignmentRule {
    pub const fn kind(&self) -> RuleKind {
        self.payload.kind()
    }

    pub fn applies_to(&self, lead: &Lead) -> bool {
        self.active && self.conditions.matches(lead)
    }
}

/// Wire representation: `type` tag plus an untyped `ruleData` body parsed against the tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleRecord {
    id: RuleId,
    name: String,
    #[serde(rename = "type")]
    kind: RuleKind,
    priority: i32,
    #[serde(default = "default_active")]
    active: bool,
    rule_data: serde_json::Value,
    #[serde(default)]
    conditions: RuleConditions,
}

fn default_active() -> bool {
    true
}

impl TryFrom<RuleRecord> for AssignmentRule {
    type Error = String;

    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        let payload = match record.kind {
            RuleKind::Geolocation => serde_json::from_value(record.rule_data)
                .map(RulePayload::Geolocation),
            RuleKind::Capacity => {
                serde_json::from_value(record.rule_data).map(RulePayload::Capacity)
            }
            RuleKind::Specialization => serde_json::from_value(record.rule_data)
                .map(RulePayload::Specialization),
        }
        .map_err(|err| {
            format!(
                "rule '{}' has malformed {} ruleData: {err}",
                record.id,
                record.kind.label()
            )
        })?;

        Ok(Self {
            id: record.id,
            name: record.name,
            priority: record.priority,
            active: record.active,
            payload,
            conditions: record.conditions,
        })
    }
}

impl From<AssignmentRule> for RuleRecord {
    fn from(rule: AssignmentRule) -> Self {
        let kind = rule.kind();
        let rule_data = match &rule.payload {
            RulePayload::Geolocation(data) => serde_json::to_value(data),
            RulePayload::Capacity(data) => serde_json::to_value(data),
            RulePayload::Specialization(data) => serde_json::to_value(data),
        }
        .unwrap_or(serde_json::Value::Null);

        Self {
            id: rule.id,
            name: rule.name,
            kind,
            priority: rule.priority,
            active: rule.active,
            rule_data,
            conditions: rule.conditions,
        }
    }
}

/// The three named rule collections, replaced as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default)]
    pub geolocation_rules: Vec<AssignmentRule>,
    #[serde(default)]
    pub capacity_rules: Vec<AssignmentRule>,
    #[serde(default)]
    pub specialization_rules: Vec<AssignmentRule>,
}

impl RuleSet {
    pub fn new(
        geolocation_rules: Vec<AssignmentRule>,
        capacity_rules: Vec<AssignmentRule>,
        specialization_rules: Vec<AssignmentRule>,
    ) -> Self {
        Self {
            geolocation_rules,
            capacity_rules,
            specialization_rules,
        }
    }

    pub fn collection(&self, kind: RuleKind) -> &[AssignmentRule] {
        match kind {
            RuleKind::Geolocation => &self.geolocation_rules,
            RuleKind::Capacity => &self.capacity_rules,
            RuleKind::Specialization => &self.specialization_rules,
        }
    }

    /// Active rules of `kind`, ascending by priority. The sort is stable, so equal priorities
    /// keep their stored order.
    pub fn active(&self, kind: RuleKind) -> Vec<AssignmentRule> {
        let mut rules: Vec<AssignmentRule> = self
            .collection(kind)
            .iter()
            .filter(|rule| rule.active)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.priority);
        rules
    }

    pub fn len(&self) -> usize {
        self.geolocation_rules.len() + self.capacity_rules.len() + self.specialization_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Result<(), RuleValidationError> {
        validation::validate_rule_set(self)
    }
}

pub(crate) fn normalize_location(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
