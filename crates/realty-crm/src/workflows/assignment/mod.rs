//! Lead assignment engine: decides which sales agent owns each inbound lead.
//!
//! Active routing rules narrow the agent pool in a fixed order (geolocation, then
//! specialization, then capacity) and the survivors are ranked by a weighted match score.
//! [`AssignmentExecutor`] is the entry point; it also owns agent counter bookkeeping and the
//! partial-failure semantics of batch assignment.

pub mod capacity;
pub mod directory;
pub mod domain;
pub mod evaluator;
pub mod executor;
mod locks;
pub mod memory;
pub mod repository;
pub mod router;
pub mod rules;
pub mod scoring;

#[cfg(test)]
mod tests;

pub use capacity::{CapacityBand, CapacityThresholds, CapacityTracker, WorkloadSnapshot};
pub use directory::{AgentDirectory, AgentFilter, DirectoryError, LeadStore};
pub use domain::{
    Agent, AgentId, AgentPerformance, AssignmentRequest, AssignmentResult, Availability, Budget,
    FailureReason, Lead, LeadId, PropertyType,
};
pub use evaluator::{AppliedRules, Evaluation, RankedCandidate, RuleEvaluator};
pub use executor::{AssignmentError, AssignmentExecutor, AssignmentOutcome, AssignmentSettings};
pub use memory::{InMemoryAgentDirectory, InMemoryLeadStore};
pub use repository::{
    InMemoryRuleRepository, JsonFileRuleRepository, RepositoryError, RuleRepository,
};
pub use router::{assignment_router, AutoAssignmentView};
pub use rules::{
    AssignmentRule, CapacityRule, GeolocationRule, RuleConditions, RuleId, RuleKind, RulePayload,
    RuleSet, RuleValidationError, SpecializationRule,
};
pub use scoring::{MatchBreakdown, MatchFactor, MatchScorer, ScoreComponent};
