use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::directory::{AgentDirectory, LeadStore};
use super::domain::{AgentId, AssignmentResult, FailureReason, LeadId};
use super::executor::{AssignmentError, AssignmentExecutor};
use super::repository::RuleRepository;
use super::rules::RuleSet;

/// Router builder exposing the assignment endpoints.
pub fn assignment_router<R, D, L>(executor: Arc<AssignmentExecutor<R, D, L>>) -> Router
where
    R: RuleRepository + 'static,
    D: AgentDirectory + 'static,
    L: LeadStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/leads/assign-manual",
            post(assign_manual_handler::<R, D, L>),
        )
        .route(
            "/api/v1/leads/auto-assign",
            post(auto_assign_handler::<R, D, L>),
        )
        .route("/api/v1/leads/unassign", post(unassign_handler::<R, D, L>))
        .route(
            "/api/v1/leads/:lead_id/recommendations",
            get(recommendations_handler::<R, D, L>),
        )
        .route("/api/v1/agents/workload", get(workload_handler::<R, D, L>))
        .route(
            "/api/v1/assignment-rules",
            get(get_rules_handler::<R, D, L>).put(put_rules_handler::<R, D, L>),
        )
        .with_state(executor)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAssignmentPayload {
    pub lead_id: LeadId,
    pub user_id: AgentId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAssignmentPayload {
    pub lead_ids: Vec<LeadId>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignPayload {
    pub lead_id: LeadId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadOwner {
    pub lead_id: LeadId,
    pub user_id: AgentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFailure {
    pub lead_id: LeadId,
    pub reason: FailureReason,
}

/// Batch response: `failed` lists ids only, `failures` adds the reason for each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAssignmentView {
    pub assigned: Vec<LeadOwner>,
    pub failed: Vec<LeadId>,
    pub failures: Vec<LeadFailure>,
    pub skipped: Vec<LeadOwner>,
    pub cancelled: bool,
}

impl From<AssignmentResult> for AutoAssignmentView {
    fn from(result: AssignmentResult) -> Self {
        let owners = |entries: std::collections::BTreeMap<LeadId, AgentId>| {
            entries
                .into_iter()
                .map(|(lead_id, user_id)| LeadOwner { lead_id, user_id })
                .collect::<Vec<_>>()
        };

        Self {
            assigned: owners(result.assigned),
            failed: result.failed.keys().cloned().collect(),
            failures: result
                .failed
                .into_iter()
                .map(|(lead_id, reason)| LeadFailure { lead_id, reason })
                .collect(),
            skipped: owners(result.skipped),
            cancelled: result.cancelled,
        }
    }
}

pub(crate) fn error_response(error: AssignmentError) -> Response {
    let status = match &error {
        AssignmentError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssignmentError::NotFound { .. } => StatusCode::NOT_FOUND,
        AssignmentError::NoEligibleAgent | AssignmentError::AgentAtCapacity(_) => {
            StatusCode::CONFLICT
        }
        AssignmentError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

/// Body extraction failures use the same `{"error": ...}` shape as domain errors.
pub(crate) fn rejection_response(rejection: JsonRejection) -> Response {
    let payload = json!({
        "error": rejection.body_text(),
    });
    (rejection.status(), axum::Json(payload)).into_response()
}

pub(crate) async fn assign_manual_handler<R, D, L>(
    State(executor): State<Arc<AssignmentExecutor<R, D, L>>>,
    body: Result<axum::Json<ManualAssignmentPayload>, JsonRejection>,
) -> Response
where
    R: RuleRepository + 'static,
    D: AgentDirectory + 'static,
    L: LeadStore + 'static,
{
    let axum::Json(payload) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    match executor
        .assign_manual(&payload.lead_id, &payload.user_id)
        .await
    {
        Ok(lead) => (StatusCode::OK, axum::Json(lead)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn auto_assign_handler<R, D, L>(
    State(executor): State<Arc<AssignmentExecutor<R, D, L>>>,
    body: Result<axum::Json<AutoAssignmentPayload>, JsonRejection>,
) -> Response
where
    R: RuleRepository + 'static,
    D: AgentDirectory + 'static,
    L: LeadStore + 'static,
{
    let axum::Json(payload) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    let result = executor.assign_auto(&payload.lead_ids, payload.force).await;
    let view = AutoAssignmentView::from(result);
    (StatusCode::OK, axum::Json(view)).into_response()
}

pub(crate) async fn unassign_handler<R, D, L>(
    State(executor): State<Arc<AssignmentExecutor<R, D, L>>>,
    body: Result<axum::Json<UnassignPayload>, JsonRejection>,
) -> Response
where
    R: RuleRepository + 'static,
    D: AgentDirectory + 'static,
    L: LeadStore + 'static,
{
    let axum::Json(payload) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    match executor.unassign(&payload.lead_id).await {
        Ok(lead) => (StatusCode::OK, axum::Json(lead)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recommendations_handler<R, D, L>(
    State(executor): State<Arc<AssignmentExecutor<R, D, L>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: RuleRepository + 'static,
    D: AgentDirectory + 'static,
    L: LeadStore + 'static,
{
    match executor.recommend(&LeadId(lead_id)).await {
        Ok(evaluation) => (StatusCode::OK, axum::Json(evaluation)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn workload_handler<R, D, L>(
    State(executor): State<Arc<AssignmentExecutor<R, D, L>>>,
) -> Response
where
    R: RuleRepository + 'static,
    D: AgentDirectory + 'static,
    L: LeadStore + 'static,
{
    match executor.workload().await {
        Ok(snapshots) => (StatusCode::OK, axum::Json(snapshots)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_rules_handler<R, D, L>(
    State(executor): State<Arc<AssignmentExecutor<R, D, L>>>,
) -> Response
where
    R: RuleRepository + 'static,
    D: AgentDirectory + 'static,
    L: LeadStore + 'static,
{
    match executor.rules().await {
        Ok(rules) => (StatusCode::OK, axum::Json(rules)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn put_rules_handler<R, D, L>(
    State(executor): State<Arc<AssignmentExecutor<R, D, L>>>,
    body: Result<axum::Json<RuleSet>, JsonRejection>,
) -> Response
where
    R: RuleRepository + 'static,
    D: AgentDirectory + 'static,
    L: LeadStore + 'static,
{
    let axum::Json(rules) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    let RuleSet {
        geolocation_rules,
        capacity_rules,
        specialization_rules,
    } = rules;

    match executor
        .replace_rules(geolocation_rules, capacity_rules, specialization_rules)
        .await
    {
        Ok(stored) => {
            let payload = json!({
                "status": "saved",
                "geolocationRules": stored.geolocation_rules.len(),
                "capacityRules": stored.capacity_rules.len(),
                "specializationRules": stored.specialization_rules.len(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}
