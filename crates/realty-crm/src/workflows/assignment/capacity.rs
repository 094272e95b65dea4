use serde::{Deserialize, Serialize};

use super::domain::{Agent, AgentId};

/// Maximum contribution of the capacity component to the match score.
pub const CAPACITY_WEIGHT: f64 = 30.0;

/// Band boundaries expressed as fractions of capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityThresholds {
    pub green: f64,
    pub yellow: f64,
    pub red: f64,
}

impl Default for CapacityThresholds {
    fn default() -> Self {
        Self {
            green: 0.5,
            yellow: 0.8,
            red: 1.0,
        }
    }
}

impl CapacityThresholds {
    /// Confirms `0 <= green <= yellow <= red <= 1`, returning a description of the first breach.
    pub fn check(&self) -> Result<(), String> {
        let values = [self.green, self.yellow, self.red];
        if values.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err("thresholds must be finite and non-negative".to_string());
        }
        if self.green > self.yellow {
            return Err(format!("green {} exceeds yellow {}", self.green, self.yellow));
        }
        if self.yellow > self.red {
            return Err(format!("yellow {} exceeds red {}", self.yellow, self.red));
        }
        if self.red > 1.0 {
            return Err(format!("red {} exceeds 1.0", self.red));
        }
        Ok(())
    }
}

/// Workload classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityBand {
    Green,
    Yellow,
    Red,
}

impl CapacityBand {
    pub const fn label(self) -> &'static str {
        match self {
            CapacityBand::Green => "green",
            CapacityBand::Yellow => "yellow",
            CapacityBand::Red => "red",
        }
    }
}

/// Workload view of a single agent for dashboards and the workload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSnapshot {
    pub agent_id: AgentId,
    pub name: String,
    pub current_lead_count: i32,
    pub capacity: i32,
    pub ratio: f64,
    pub band: CapacityBand,
    pub remaining: i32,
}

/// Stateless workload arithmetic shared by scoring and rule evaluation.
pub struct CapacityTracker;

impl CapacityTracker {
    /// `current / max`, or fully loaded when the agent has no usable capacity.
    pub fn ratio(agent: &Agent) -> f64 {
        Self::ratio_for(agent.current_lead_count, agent.max_capacity)
    }

    /// Ratio against the tighter of the agent's own capacity and a rule-imposed ceiling.
    pub fn ratio_with_limit(agent: &Agent, limit: i32) -> f64 {
        Self::ratio_for(agent.current_lead_count, agent.max_capacity.min(limit))
    }

    fn ratio_for(current: i32, capacity: i32) -> f64 {
        if capacity <= 0 {
            return 1.0;
        }
        f64::from(current) / f64::from(capacity)
    }

    pub fn band(ratio: f64, thresholds: &CapacityThresholds) -> CapacityBand {
        if ratio < thresholds.green {
            CapacityBand::Green
        } else if ratio < thresholds.yellow {
            CapacityBand::Yellow
        } else {
            CapacityBand::Red
        }
    }

    pub fn capacity_score(ratio: f64) -> f64 {
        ((1.0 - ratio) * CAPACITY_WEIGHT).clamp(0.0, CAPACITY_WEIGHT)
    }

    pub fn workload(
        agent: &Agent,
        thresholds: &CapacityThresholds,
        limit: Option<i32>,
    ) -> WorkloadSnapshot {
        let capacity = limit
            .map(|limit| agent.max_capacity.min(limit))
            .unwrap_or(agent.max_capacity);
        let ratio = Self::ratio_for(agent.current_lead_count, capacity);

        WorkloadSnapshot {
            agent_id: agent.id.clone(),
            name: agent.name.clone(),
            current_lead_count: agent.current_lead_count,
            capacity,
            ratio,
            band: Self::band(ratio, thresholds),
            remaining: (capacity - agent.current_lead_count).max(0),
        }
    }
}
