use std::collections::BTreeSet;

use super::{AssignmentRule, RuleId, RuleKind, RulePayload, RuleSet};

/// Reasons a rule set is refused before anything is written.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("rule id must not be empty")]
    MissingId,
    #[error("rule '{0}' must have a name")]
    MissingName(RuleId),
    #[error("rule id '{0}' appears more than once")]
    DuplicateId(RuleId),
    #[error("rule '{id}' is a {actual:?} rule stored in the {expected:?} collection")]
    MisplacedRule {
        id: RuleId,
        expected: RuleKind,
        actual: RuleKind,
    },
    #[error("rule '{0}' must list at least one coverage area and one eligible agent")]
    EmptyCoverage(RuleId),
    #[error("rule '{0}' must set maxLeadsPerAgent above zero")]
    InvalidMaxLeads(RuleId),
    #[error("rule '{id}' thresholds must satisfy 0 <= green <= yellow <= red <= 1 ({detail})")]
    InvalidThresholds { id: RuleId, detail: String },
    #[error("rule '{0}' must map at least one property type to a non-empty agent list")]
    EmptySpecialization(RuleId),
}

pub(super) fn validate_rule_set(rules: &RuleSet) -> Result<(), RuleValidationError> {
    let mut seen = BTreeSet::new();

    for kind in RuleKind::ALL {
        for rule in rules.collection(kind) {
            if rule.id.0.trim().is_empty() {
                return Err(RuleValidationError::MissingId);
            }
            if !seen.insert(rule.id.clone()) {
                return Err(RuleValidationError::DuplicateId(rule.id.clone()));
            }
            if rule.kind() != kind {
                return Err(RuleValidationError::MisplacedRule {
                    id: rule.id.clone(),
                    expected: kind,
                    actual: rule.kind(),
                });
            }
            validate_rule(rule)?;
        }
    }

    Ok(())
}

fn validate_rule(rule: &AssignmentRule) -> Result<(), RuleValidationError> {
    if rule.name.trim().is_empty() {
        return Err(RuleValidationError::MissingName(rule.id.clone()));
    }

    match &rule.payload {
        RulePayload::Geolocation(data) => {
            let has_area = data.coverage_areas.iter().any(|area| !area.trim().is_empty());
            if !has_area || data.eligible_agent_ids.is_empty() {
                return Err(RuleValidationError::EmptyCoverage(rule.id.clone()));
            }
        }
        RulePayload::Capacity(data) => {
            if data.max_leads_per_agent <= 0 {
                return Err(RuleValidationError::InvalidMaxLeads(rule.id.clone()));
            }
            data.thresholds
                .check()
                .map_err(|detail| RuleValidationError::InvalidThresholds {
                    id: rule.id.clone(),
                    detail,
                })?;
        }
        RulePayload::Specialization(data) => {
            let empty_entry = data
                .property_type_agents
                .values()
                .any(|agents| agents.is_empty());
            if data.property_type_agents.is_empty() || empty_entry {
                return Err(RuleValidationError::EmptySpecialization(rule.id.clone()));
            }
        }
    }

    Ok(())
}
