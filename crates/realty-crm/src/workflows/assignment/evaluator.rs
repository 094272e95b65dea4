use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use super::capacity::{CapacityBand, CapacityThresholds, CapacityTracker};
use super::domain::{Agent, AgentId, Availability, Lead};
use super::rules::{AssignmentRule, RuleId, RuleKind, RulePayload, RuleSet};
use super::scoring::{MatchBreakdown, MatchScorer};

/// Ids of the rules that shaped the candidate pool for one lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRules {
    pub geolocation: Option<RuleId>,
    pub specialization: Option<RuleId>,
    pub capacity: Option<RuleId>,
}

/// Eligible agent with its score, in selection order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub score: u8,
    pub ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<CapacityBand>,
    pub breakdown: MatchBreakdown,
}

/// Result of running the rule pipeline for one lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub applied: AppliedRules,
    pub candidates: Vec<RankedCandidate>,
}

impl Evaluation {
    pub fn winner(&self) -> Option<&RankedCandidate> {
        self.candidates.first()
    }
}

/// Applies the active rules in priority order, then ranks the surviving agents.
///
/// The evaluator holds a snapshot of the rule set and no per-lead state; every call to
/// [`RuleEvaluator::evaluate`] is independent.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    geolocation: Vec<AssignmentRule>,
    specialization: Vec<AssignmentRule>,
    capacity: Vec<AssignmentRule>,
}

impl RuleEvaluator {
    pub fn new(rules: &RuleSet) -> Self {
        Self {
            geolocation: rules.active(RuleKind::Geolocation),
            specialization: rules.active(RuleKind::Specialization),
            capacity: rules.active(RuleKind::Capacity),
        }
    }

    pub fn evaluate(&self, lead: &Lead, agents: &[Agent]) -> Evaluation {
        let mut applied = AppliedRules::default();
        let mut pool: Vec<Cow<'_, Agent>> = agents
            .iter()
            .filter(|agent| agent.availability != Availability::Offline)
            .map(|agent| without_own_lead(lead, agent))
            .collect();

        if let Some((rule_id, eligible)) = self.geolocation_restriction(lead) {
            debug!(lead = %lead.id, rule = %rule_id, "geolocation rule matched");
            pool.retain(|agent| eligible.contains(&agent.id));
            applied.geolocation = Some(rule_id);
        }

        if let Some((rule_id, eligible)) = self.specialization_restriction(lead) {
            debug!(lead = %lead.id, rule = %rule_id, "specialization rule matched");
            pool.retain(|agent| eligible.contains(&agent.id));
            applied.specialization = Some(rule_id);
        }

        // Hard ceiling: automatic assignment never pushes an agent past max_capacity.
        pool.retain(|agent| !agent.is_at_capacity());

        let capacity_rule = self.capacity_rule(lead);
        let mut candidates: Vec<RankedCandidate> = pool
            .into_iter()
            .filter_map(|agent| {
                let agent = agent.as_ref();
                let band = capacity_rule.map(|(_, limit, thresholds)| {
                    let ratio = CapacityTracker::ratio_with_limit(agent, limit);
                    CapacityTracker::band(ratio, thresholds)
                });
                if band == Some(CapacityBand::Red) {
                    return None;
                }

                let breakdown = MatchScorer::breakdown(lead, agent);
                Some(RankedCandidate {
                    agent_id: agent.id.clone(),
                    agent_name: agent.name.clone(),
                    score: breakdown.score,
                    ratio: CapacityTracker::ratio(agent),
                    band,
                    breakdown,
                })
            })
            .collect();
        if let Some((rule_id, _, _)) = capacity_rule {
            applied.capacity = Some(rule_id.clone());
        }

        candidates.sort_by(compare_candidates);

        Evaluation {
            applied,
            candidates,
        }
    }

    /// Best candidate for the lead, or `None` when every agent was filtered out.
    pub fn select(&self, lead: &Lead, agents: &[Agent]) -> Option<RankedCandidate> {
        self.evaluate(lead, agents).candidates.into_iter().next()
    }

    fn geolocation_restriction(&self, lead: &Lead) -> Option<(RuleId, BTreeSet<AgentId>)> {
        self.geolocation.iter().find_map(|rule| match &rule.payload {
            RulePayload::Geolocation(data)
                if rule.applies_to(lead) && data.covers(&lead.preferred_location) =>
            {
                Some((rule.id.clone(), data.eligible()))
            }
            _ => None,
        })
    }

    fn specialization_restriction(&self, lead: &Lead) -> Option<(RuleId, BTreeSet<AgentId>)> {
        self.specialization.iter().find_map(|rule| match &rule.payload {
            RulePayload::Specialization(data) if rule.applies_to(lead) => data
                .agents_for(lead.property_type)
                .map(|agents| (rule.id.clone(), agents)),
            _ => None,
        })
    }

    fn capacity_rule(&self, lead: &Lead) -> Option<(&RuleId, i32, &CapacityThresholds)> {
        self.capacity.iter().find_map(|rule| match &rule.payload {
            RulePayload::Capacity(data) if rule.applies_to(lead) => {
                Some((&rule.id, data.max_leads_per_agent, &data.thresholds))
            }
            _ => None,
        })
    }
}

/// The lead's current owner is ranked as if the lead were released, since keeping it adds
/// no load.
fn without_own_lead<'a>(lead: &Lead, agent: &'a Agent) -> Cow<'a, Agent> {
    if lead.assigned_agent_id.as_ref() != Some(&agent.id) {
        return Cow::Borrowed(agent);
    }
    let mut discounted = agent.clone();
    discounted.current_lead_count = (discounted.current_lead_count - 1).max(0);
    Cow::Owned(discounted)
}

/// Highest score first, then the lighter workload, then the smaller agent id.
fn compare_candidates(left: &RankedCandidate, right: &RankedCandidate) -> Ordering {
    right
        .score
        .cmp(&left.score)
        .then_with(|| left.ratio.total_cmp(&right.ratio))
        .then_with(|| left.agent_id.cmp(&right.agent_id))
}
