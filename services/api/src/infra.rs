use metrics_exporter_prometheus::PrometheusHandle;
use realty_crm::workflows::assignment::{
    Agent, AgentId, AgentPerformance, AssignmentRule, Availability, Budget, CapacityRule,
    CapacityThresholds, GeolocationRule, Lead, LeadId, PropertyType, RuleConditions, RuleId,
    RulePayload, RuleSet, SpecializationRule,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn seed_agent(
    id: &str,
    name: &str,
    location: &str,
    specializations: &[PropertyType],
    load: (i32, i32),
    performance: (f64, f64, u32),
) -> Agent {
    let (current_lead_count, max_capacity) = load;
    let (conversion_rate_pct, avg_response_time_minutes, closed_deals) = performance;
    Agent {
        id: AgentId::from(id),
        name: name.to_string(),
        location: location.to_string(),
        specializations: specializations.iter().copied().collect::<BTreeSet<_>>(),
        max_capacity,
        current_lead_count,
        performance: AgentPerformance {
            conversion_rate_pct,
            avg_response_time_minutes,
            closed_deals,
        },
        availability: Availability::Available,
    }
}

/// Agent roster used by the in-memory directory in `serve` and `demo`.
pub(crate) fn seed_agents() -> Vec<Agent> {
    let mut devon = seed_agent(
        "agent-devon",
        "Devon Price",
        "Ames",
        &[PropertyType::Land, PropertyType::Commercial],
        (3, 12),
        (14.5, 50.0, 6),
    );
    devon.availability = Availability::Busy;

    vec![
        seed_agent(
            "agent-avery",
            "Avery Stone",
            "Downtown",
            &[PropertyType::Condo, PropertyType::Townhouse],
            (12, 20),
            (24.5, 15.0, 31),
        ),
        seed_agent(
            "agent-blake",
            "Blake Rivera",
            "West Des Moines",
            &[PropertyType::SingleFamily],
            (15, 20),
            (12.0, 45.0, 9),
        ),
        seed_agent(
            "agent-casey",
            "Casey Nguyen",
            "Ankeny",
            &[PropertyType::SingleFamily, PropertyType::MultiFamily],
            (6, 18),
            (19.0, 25.0, 17),
        ),
        devon,
    ]
}

fn seed_lead(
    id: &str,
    name: &str,
    source: &str,
    property_type: PropertyType,
    location: &str,
    budget: (u64, u64),
    lead_score: u8,
) -> Lead {
    Lead {
        id: LeadId::from(id),
        name: name.to_string(),
        source: source.to_string(),
        property_type,
        preferred_location: location.to_string(),
        budget: Budget {
            min: budget.0,
            max: budget.1,
        },
        lead_score,
        assigned_agent_id: None,
    }
}

/// Unassigned inbound leads for the in-memory lead store.
pub(crate) fn seed_leads() -> Vec<Lead> {
    vec![
        seed_lead(
            "lead-1001",
            "Jordan Ellis",
            "website",
            PropertyType::Condo,
            "Downtown",
            (210_000, 280_000),
            71,
        ),
        seed_lead(
            "lead-1002",
            "Morgan Hale",
            "zillow",
            PropertyType::SingleFamily,
            "West Des Moines",
            (340_000, 420_000),
            64,
        ),
        seed_lead(
            "lead-1003",
            "Riley Chen",
            "referral",
            PropertyType::Land,
            "Story County",
            (90_000, 150_000),
            48,
        ),
        seed_lead(
            "lead-1004",
            "Taylor Brooks",
            "open_house",
            PropertyType::MultiFamily,
            "Ankeny",
            (500_000, 750_000),
            82,
        ),
        seed_lead(
            "lead-1005",
            "Quinn Parker",
            "website",
            PropertyType::Townhouse,
            "Urbandale",
            (260_000, 310_000),
            57,
        ),
    ]
}

fn sample_rule(id: &str, name: &str, priority: i32, payload: RulePayload) -> AssignmentRule {
    AssignmentRule {
        id: RuleId(id.to_string()),
        name: name.to_string(),
        priority,
        active: true,
        payload,
        conditions: RuleConditions::default(),
    }
}

/// One rule of each kind, matching the seeded roster.
pub(crate) fn sample_rules() -> RuleSet {
    let geolocation = vec![sample_rule(
        "geo-west-metro",
        "West metro desk",
        1,
        RulePayload::Geolocation(GeolocationRule {
            coverage_areas: vec![
                "West Des Moines".to_string(),
                "Clive".to_string(),
                "Waukee".to_string(),
            ],
            eligible_agent_ids: vec![AgentId::from("agent-blake"), AgentId::from("agent-casey")],
        }),
    )];

    let capacity = vec![sample_rule(
        "cap-standard",
        "Standard workload bands",
        1,
        RulePayload::Capacity(CapacityRule {
            max_leads_per_agent: 20,
            thresholds: CapacityThresholds::default(),
        }),
    )];

    let mut property_type_agents = BTreeMap::new();
    property_type_agents.insert(PropertyType::Land, vec![AgentId::from("agent-devon")]);
    property_type_agents.insert(
        PropertyType::MultiFamily,
        vec![AgentId::from("agent-casey")],
    );
    let specialization = vec![sample_rule(
        "spec-investment",
        "Investment property specialists",
        1,
        RulePayload::Specialization(SpecializationRule {
            property_type_agents,
        }),
    )];

    RuleSet::new(geolocation, capacity, specialization)
}
