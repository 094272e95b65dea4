use serde::{Deserialize, Serialize};

use super::capacity::CapacityTracker;
use super::domain::{Agent, Lead};

pub const SPECIALIZATION_WEIGHT: f64 = 25.0;
pub const PERFORMANCE_WEIGHT: f64 = 25.0;
pub const RESPONSIVENESS_WEIGHT: f64 = 20.0;
/// Response times at or beyond this many minutes earn no responsiveness points.
pub const RESPONSE_WINDOW_MINUTES: f64 = 60.0;

/// Factors contributing to a match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFactor {
    Capacity,
    Specialization,
    Performance,
    Responsiveness,
}

/// Discrete contribution to a match score, kept for audit trails and recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: MatchFactor,
    pub points: f64,
    pub notes: String,
}

/// Component-level view of a (lead, agent) match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchBreakdown {
    pub components: Vec<ScoreComponent>,
    pub raw_total: f64,
    pub score: u8,
}

impl MatchBreakdown {
    pub fn points(&self, factor: MatchFactor) -> f64 {
        self.components
            .iter()
            .find(|component| component.factor == factor)
            .map(|component| component.points)
            .unwrap_or(0.0)
    }
}

/// Pure scoring function over a lead and a candidate agent.
pub struct MatchScorer;

impl MatchScorer {
    pub fn score(lead: &Lead, agent: &Agent) -> u8 {
        Self::breakdown(lead, agent).score
    }

    pub fn breakdown(lead: &Lead, agent: &Agent) -> MatchBreakdown {
        let ratio = CapacityTracker::ratio(agent);
        let capacity = CapacityTracker::capacity_score(ratio);

        let specialized = agent.specializes_in(lead.property_type);
        let specialization = if specialized {
            SPECIALIZATION_WEIGHT
        } else {
            0.0
        };

        let conversion = finite_or_zero(agent.performance.conversion_rate_pct).clamp(0.0, 100.0);
        let performance = conversion / 100.0 * PERFORMANCE_WEIGHT;

        let response_minutes = agent.performance.avg_response_time_minutes;
        let responsiveness = if response_minutes.is_nan() {
            0.0
        } else {
            ((RESPONSE_WINDOW_MINUTES - response_minutes) / RESPONSE_WINDOW_MINUTES).clamp(0.0, 1.0)
                * RESPONSIVENESS_WEIGHT
        };

        let raw_total = capacity + specialization + performance + responsiveness;
        let score = raw_total.round().clamp(0.0, 100.0) as u8;

        MatchBreakdown {
            components: vec![
                ScoreComponent {
                    factor: MatchFactor::Capacity,
                    points: capacity,
                    notes: format!(
                        "{} of {} leads ({:.0}% loaded)",
                        agent.current_lead_count,
                        agent.max_capacity,
                        ratio * 100.0
                    ),
                },
                ScoreComponent {
                    factor: MatchFactor::Specialization,
                    points: specialization,
                    notes: if specialized {
                        format!("specializes in {}", lead.property_type.label())
                    } else {
                        format!("no {} specialization", lead.property_type.label())
                    },
                },
                ScoreComponent {
                    factor: MatchFactor::Performance,
                    points: performance,
                    notes: format!("{conversion:.1}% conversion rate"),
                },
                ScoreComponent {
                    factor: MatchFactor::Responsiveness,
                    points: responsiveness,
                    notes: format!("{response_minutes:.0} minute average response"),
                },
            ],
            raw_total,
            score,
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
