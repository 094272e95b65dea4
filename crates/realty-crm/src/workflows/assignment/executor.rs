use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::capacity::{CapacityThresholds, CapacityTracker, WorkloadSnapshot};
use super::directory::{AgentDirectory, AgentFilter, DirectoryError, LeadStore};
use super::domain::{AgentId, AssignmentRequest, AssignmentResult, FailureReason, Lead, LeadId};
use super::evaluator::{Evaluation, RuleEvaluator};
use super::locks::KeyedLocks;
use super::repository::{RepositoryError, RuleRepository};
use super::rules::{AssignmentRule, RuleKind, RulePayload, RuleSet, RuleValidationError};

/// Attempts to claim a slot on the winning agent before giving up on a lead.
const MAX_RESERVATION_ATTEMPTS: usize = 3;

/// Runtime knobs for the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentSettings {
    /// Upper bound on every agent directory or lead store call.
    pub directory_timeout: Duration,
    /// Workload bands reported when no capacity rule is active.
    pub default_thresholds: CapacityThresholds,
}

impl Default for AssignmentSettings {
    fn default() -> Self {
        Self {
            directory_timeout: Duration::from_secs(2),
            default_thresholds: CapacityThresholds::default(),
        }
    }
}

/// Outcome of `AssignmentExecutor::execute`, mirroring the request variant.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    Manual(Lead),
    Auto(AssignmentResult),
}

/// Entry point for manual assignment, batch auto-assignment, and unassignment.
///
/// Agent counters are only ever changed through the injected directory, and every change to a
/// lead happens while that lead's lock is held.
pub struct AssignmentExecutor<R, D, L> {
    rules: Arc<R>,
    agents: Arc<D>,
    leads: Arc<L>,
    settings: AssignmentSettings,
    lead_locks: KeyedLocks<LeadId>,
}

enum AutoOutcome {
    Assigned(AgentId),
    Skipped(AgentId),
}

impl<R, D, L> AssignmentExecutor<R, D, L>
where
    R: RuleRepository + 'static,
    D: AgentDirectory + 'static,
    L: LeadStore + 'static,
{
    pub fn new(rules: Arc<R>, agents: Arc<D>, leads: Arc<L>, settings: AssignmentSettings) -> Self {
        Self {
            rules,
            agents,
            leads,
            settings,
            lead_locks: KeyedLocks::default(),
        }
    }

    pub fn settings(&self) -> &AssignmentSettings {
        &self.settings
    }

    pub async fn execute(
        &self,
        request: AssignmentRequest,
    ) -> Result<AssignmentOutcome, AssignmentError> {
        match request {
            AssignmentRequest::Manual {
                lead_id,
                target_agent_id,
            } => self
                .assign_manual(&lead_id, &target_agent_id)
                .await
                .map(AssignmentOutcome::Manual),
            AssignmentRequest::Auto { lead_ids, force } => {
                let lead_ids: Vec<LeadId> = lead_ids.into_iter().collect();
                Ok(AssignmentOutcome::Auto(
                    self.assign_auto(&lead_ids, force).await,
                ))
            }
        }
    }

    /// Assign a lead to an operator-chosen agent, bypassing rules and capacity.
    pub async fn assign_manual(
        &self,
        lead_id: &LeadId,
        agent_id: &AgentId,
    ) -> Result<Lead, AssignmentError> {
        let _guard = self.lead_locks.acquire(lead_id).await;

        let lead = self.fetch_lead(lead_id).await?;
        let agent = self
            .guarded("agent lookup", self.agents.get_agent(agent_id))
            .await?
            .ok_or_else(|| AssignmentError::not_found("agent", agent_id.to_string()))?;

        if lead.assigned_agent_id.as_ref() == Some(&agent.id) {
            return Ok(lead);
        }

        let updated = self.transfer(&lead, &agent.id, false).await?;
        info!(lead = %lead_id, agent = %agent.id, "lead assigned manually");
        Ok(updated)
    }

    /// Auto-assign every lead in `lead_ids`; see [`Self::assign_auto_with_cancel`].
    pub async fn assign_auto(&self, lead_ids: &[LeadId], force: bool) -> AssignmentResult {
        self.assign_auto_with_cancel(lead_ids, force, &CancellationToken::new())
            .await
    }

    /// Run the rule pipeline for each lead in turn. Failures are recorded per lead and never
    /// stop the batch. Leads already owned by an agent are skipped unless `force` is set.
    /// Cancellation is checked between leads; leads not yet reached appear in neither map.
    pub async fn assign_auto_with_cancel(
        &self,
        lead_ids: &[LeadId],
        force: bool,
        cancel: &CancellationToken,
    ) -> AssignmentResult {
        let mut result = AssignmentResult::default();

        let evaluator = match self.load_rules().await {
            Ok(rules) => RuleEvaluator::new(&rules),
            Err(err) => {
                warn!(error = %err, "assignment rules unavailable, failing batch leads");
                for lead_id in lead_ids {
                    result.failed.insert(
                        lead_id.clone(),
                        FailureReason::PersistenceError(err.to_string()),
                    );
                }
                return result;
            }
        };

        for lead_id in lead_ids {
            if cancel.is_cancelled() {
                result.cancelled = true;
                info!(processed = result.processed(), "auto-assignment batch cancelled");
                break;
            }
            if result.assigned.contains_key(lead_id)
                || result.failed.contains_key(lead_id)
                || result.skipped.contains_key(lead_id)
            {
                continue;
            }

            match self.auto_assign_one(&evaluator, lead_id, force).await {
                Ok(AutoOutcome::Assigned(agent_id)) => {
                    info!(lead = %lead_id, agent = %agent_id, "lead auto-assigned");
                    result.assigned.insert(lead_id.clone(), agent_id);
                }
                Ok(AutoOutcome::Skipped(agent_id)) => {
                    debug!(lead = %lead_id, agent = %agent_id, "lead already assigned, skipping");
                    result.skipped.insert(lead_id.clone(), agent_id);
                }
                Err(reason) => {
                    warn!(lead = %lead_id, reason = %reason.summary(), "lead auto-assignment failed");
                    result.failed.insert(lead_id.clone(), reason);
                }
            }
        }

        info!(
            assigned = result.assigned.len(),
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            "auto-assignment batch finished"
        );
        result
    }

    /// Clear a lead's owner. Unassigned leads are returned unchanged.
    pub async fn unassign(&self, lead_id: &LeadId) -> Result<Lead, AssignmentError> {
        let _guard = self.lead_locks.acquire(lead_id).await;

        let lead = self.fetch_lead(lead_id).await?;
        let Some(previous) = lead.assigned_agent_id.clone() else {
            return Ok(lead);
        };

        self.release_previous(&previous).await?;
        let updated = match self
            .guarded("lead update", self.leads.set_assignment(lead_id, None))
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                self.compensate_increment(&previous).await;
                return Err(lead_write_error(err, lead_id));
            }
        };

        info!(lead = %lead_id, agent = %previous, "lead unassigned");
        Ok(updated)
    }

    /// Rank the agents that would be eligible for a lead without assigning it.
    pub async fn recommend(&self, lead_id: &LeadId) -> Result<Evaluation, AssignmentError> {
        let lead = self.fetch_lead(lead_id).await?;
        let rules = self.load_rules().await?;
        let agents = self
            .guarded("agent listing", self.agents.list_agents(&AgentFilter::assignable()))
            .await?;

        Ok(RuleEvaluator::new(&rules).evaluate(&lead, &agents))
    }

    /// Workload bands for every agent, using the highest-priority active capacity rule.
    pub async fn workload(&self) -> Result<Vec<WorkloadSnapshot>, AssignmentError> {
        let capacity_rules = self
            .with_rules(|rules| rules.active_rules(RuleKind::Capacity))
            .await?;
        let (thresholds, limit) = capacity_rules
            .iter()
            .find_map(|rule| match &rule.payload {
                RulePayload::Capacity(data) => {
                    Some((data.thresholds, Some(data.max_leads_per_agent)))
                }
                _ => None,
            })
            .unwrap_or((self.settings.default_thresholds, None));

        let agents = self
            .guarded("agent listing", self.agents.list_agents(&AgentFilter::everyone()))
            .await?;

        Ok(agents
            .iter()
            .map(|agent| CapacityTracker::workload(agent, &thresholds, limit))
            .collect())
    }

    pub async fn rules(&self) -> Result<RuleSet, AssignmentError> {
        Ok(self.load_rules().await?)
    }

    pub async fn replace_rules(
        &self,
        geolocation: Vec<AssignmentRule>,
        capacity: Vec<AssignmentRule>,
        specialization: Vec<AssignmentRule>,
    ) -> Result<RuleSet, AssignmentError> {
        let stored = self
            .with_rules(move |rules| {
                rules.replace_all(geolocation, capacity, specialization)?;
                rules.load()
            })
            .await?;
        info!(rules = stored.len(), "assignment rules replaced");
        Ok(stored)
    }

    async fn auto_assign_one(
        &self,
        evaluator: &RuleEvaluator,
        lead_id: &LeadId,
        force: bool,
    ) -> Result<AutoOutcome, FailureReason> {
        let _guard = self.lead_locks.acquire(lead_id).await;

        let lead = self.fetch_lead(lead_id).await.map_err(failure_reason)?;
        if let Some(owner) = &lead.assigned_agent_id {
            if !force {
                return Ok(AutoOutcome::Skipped(owner.clone()));
            }
        }

        for attempt in 1..=MAX_RESERVATION_ATTEMPTS {
            let agents = self
                .guarded("agent listing", self.agents.list_agents(&AgentFilter::assignable()))
                .await
                .map_err(|err| failure_reason(err.into()))?;

            let winner = evaluator
                .select(&lead, &agents)
                .ok_or(FailureReason::NoEligibleAgent)?;

            if lead.assigned_agent_id.as_ref() == Some(&winner.agent_id) {
                return Ok(AutoOutcome::Assigned(winner.agent_id));
            }

            match self.transfer(&lead, &winner.agent_id, true).await {
                Ok(_) => return Ok(AutoOutcome::Assigned(winner.agent_id)),
                Err(AssignmentError::AgentAtCapacity(agent_id)) => {
                    debug!(lead = %lead_id, agent = %agent_id, attempt, "agent filled up, re-evaluating");
                }
                Err(err) => return Err(failure_reason(err)),
            }
        }

        Err(FailureReason::NoEligibleAgent)
    }

    /// Move `lead` to `target`: claim the slot, release the prior owner, then write the lead.
    /// Any failure undoes the counter changes already made.
    async fn transfer(
        &self,
        lead: &Lead,
        target: &AgentId,
        enforce_capacity: bool,
    ) -> Result<Lead, AssignmentError> {
        self.guarded(
            "agent counter update",
            self.agents.increment_lead_count(target, enforce_capacity),
        )
        .await
        .map_err(|err| match err {
            DirectoryError::AtCapacity(agent_id) => AssignmentError::AgentAtCapacity(agent_id),
            DirectoryError::NotFound => AssignmentError::not_found("agent", target.to_string()),
            other => other.into(),
        })?;

        if let Some(previous) = &lead.assigned_agent_id {
            if let Err(err) = self.release_previous(previous).await {
                self.compensate_decrement(target).await;
                return Err(err);
            }
        }

        match self
            .guarded("lead update", self.leads.set_assignment(&lead.id, Some(target)))
            .await
        {
            Ok(updated) => Ok(updated),
            Err(err) => {
                self.compensate_decrement(target).await;
                if let Some(previous) = &lead.assigned_agent_id {
                    self.compensate_increment(previous).await;
                }
                Err(lead_write_error(err, &lead.id))
            }
        }
    }

    async fn decrement(&self, agent_id: &AgentId) -> Result<(), AssignmentError> {
        self.guarded("agent counter update", self.agents.decrement_lead_count(agent_id))
            .await
            .map(|_| ())
            .map_err(|err| match err {
                DirectoryError::NotFound => {
                    AssignmentError::not_found("agent", agent_id.to_string())
                }
                other => other.into(),
            })
    }

    /// Frees the prior owner's slot. An owner missing from the directory has no slot to free.
    async fn release_previous(&self, agent_id: &AgentId) -> Result<(), AssignmentError> {
        match self.decrement(agent_id).await {
            Err(AssignmentError::NotFound { .. }) => {
                warn!(agent = %agent_id, "previous owner not in directory, nothing to release");
                Ok(())
            }
            other => other,
        }
    }

    /// Reverses an increment after a later step failed. A failure here is logged; the
    /// original error is what the caller sees.
    async fn compensate_decrement(&self, agent_id: &AgentId) {
        if let Err(err) = self.decrement(agent_id).await {
            warn!(agent = %agent_id, error = %err, "failed to roll back agent lead slot");
        }
    }

    async fn compensate_increment(&self, agent_id: &AgentId) {
        if let Err(err) = self
            .guarded(
                "agent counter update",
                self.agents.increment_lead_count(agent_id, false),
            )
            .await
        {
            warn!(agent = %agent_id, error = %err, "failed to restore agent lead slot");
        }
    }

    async fn load_rules(&self) -> Result<RuleSet, RepositoryError> {
        self.with_rules(|rules| rules.load()).await
    }

    /// Runs a rule repository call on the blocking pool; file-backed stores do synchronous IO.
    async fn with_rules<T, F>(&self, call: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> Result<T, RepositoryError> + Send + 'static,
    {
        let rules = Arc::clone(&self.rules);
        tokio::task::spawn_blocking(move || call(rules.as_ref()))
            .await
            .map_err(|err| RepositoryError::Unavailable(format!("rule store task failed: {err}")))?
    }

    async fn fetch_lead(&self, lead_id: &LeadId) -> Result<Lead, AssignmentError> {
        self.guarded("lead lookup", self.leads.get(lead_id))
            .await?
            .ok_or_else(|| AssignmentError::not_found("lead", lead_id.to_string()))
    }

    async fn guarded<T, F>(&self, operation: &'static str, call: F) -> Result<T, DirectoryError>
    where
        F: Future<Output = Result<T, DirectoryError>>,
    {
        let after = self.settings.directory_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => Err(DirectoryError::Timeout { operation, after }),
        }
    }
}

fn lead_write_error(err: DirectoryError, lead_id: &LeadId) -> AssignmentError {
    match err {
        DirectoryError::NotFound => AssignmentError::not_found("lead", lead_id.to_string()),
        other => other.into(),
    }
}

fn failure_reason(err: AssignmentError) -> FailureReason {
    match err {
        AssignmentError::NotFound { .. } => FailureReason::NotFound,
        AssignmentError::NoEligibleAgent | AssignmentError::AgentAtCapacity(_) => {
            FailureReason::NoEligibleAgent
        }
        AssignmentError::Validation(err) => FailureReason::PersistenceError(err.to_string()),
        AssignmentError::Persistence(detail) => FailureReason::PersistenceError(detail),
    }
}

/// Error raised by the assignment executor.
#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error(transparent)]
    Validation(#[from] RuleValidationError),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("no eligible agent")]
    NoEligibleAgent,
    #[error("agent '{0}' is at capacity")]
    AgentAtCapacity(AgentId),
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl AssignmentError {
    pub(crate) fn not_found(entity: &'static str, id: String) -> Self {
        Self::NotFound { entity, id }
    }
}

impl From<RepositoryError> for AssignmentError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Invalid(err) => Self::Validation(err),
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<DirectoryError> for AssignmentError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::AtCapacity(agent_id) => Self::AgentAtCapacity(agent_id),
            DirectoryError::NotFound => Self::not_found("record", String::new()),
            other => Self::Persistence(other.to_string()),
        }
    }
}
