use super::common::*;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::body::Body;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::assignment::domain::{AgentId, LeadId, PropertyType};
use crate::workflows::assignment::executor::{AssignmentExecutor, AssignmentSettings};
use crate::workflows::assignment::memory::{InMemoryAgentDirectory, InMemoryLeadStore};
use crate::workflows::assignment::repository::InMemoryRuleRepository;
use crate::workflows::assignment::router::{
    self, assignment_router, AutoAssignmentPayload, ManualAssignmentPayload, UnassignPayload,
};
use crate::workflows::assignment::rules::RuleSet;

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn manual_handler_returns_updated_lead() {
    let (executor, directory, _) = build_executor(
        RuleSet::default(),
        vec![agent_a()],
        vec![lead("lead-1", PropertyType::Condo)],
    );

    let response = router::assign_manual_handler(
        State(Arc::new(executor)),
        Ok(axum::Json(ManualAssignmentPayload {
            lead_id: LeadId::from("lead-1"),
            user_id: AgentId::from("agent-a"),
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("assignedAgentId"), Some(&json!("agent-a")));
    assert_eq!(lead_count(&directory, "agent-a"), 13);
}

#[tokio::test]
async fn manual_handler_returns_not_found_for_unknown_agent() {
    let (executor, _, _) = build_executor(
        RuleSet::default(),
        vec![agent_a()],
        vec![lead("lead-1", PropertyType::Condo)],
    );

    let response = router::assign_manual_handler(
        State(Arc::new(executor)),
        Ok(axum::Json(ManualAssignmentPayload {
            lead_id: LeadId::from("lead-1"),
            user_id: AgentId::from("agent-404"),
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("agent-404"));
}

#[tokio::test]
async fn auto_assign_handler_reports_assigned_and_failed_leads() {
    let (executor, _, _) = build_executor(
        RuleSet::default(),
        vec![agent_a(), agent_b()],
        vec![lead("lead-1", PropertyType::Condo)],
    );

    let response = router::auto_assign_handler(
        State(Arc::new(executor)),
        Ok(axum::Json(AutoAssignmentPayload {
            lead_ids: vec![LeadId::from("lead-1"), LeadId::from("lead-404")],
            force: false,
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload.get("assigned"),
        Some(&json!([{ "leadId": "lead-1", "userId": "agent-a" }]))
    );
    assert_eq!(payload.get("failed"), Some(&json!(["lead-404"])));
    assert_eq!(
        payload.get("failures"),
        Some(&json!([{ "leadId": "lead-404", "reason": { "kind": "not_found" } }]))
    );
    assert_eq!(payload.get("cancelled"), Some(&json!(false)));
}

#[tokio::test]
async fn unassign_handler_returns_not_found_for_unknown_lead() {
    let (executor, _, _) = build_executor(RuleSet::default(), vec![agent_a()], Vec::new());

    let response = router::unassign_handler(
        State(Arc::new(executor)),
        Ok(axum::Json(UnassignPayload {
            lead_id: LeadId::from("lead-404"),
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recommendations_handler_lists_ranked_candidates() {
    let (executor, _, _) = build_executor(
        RuleSet::default(),
        vec![agent_b(), agent_a()],
        vec![lead("lead-1", PropertyType::Condo)],
    );

    let response =
        router::recommendations_handler(State(Arc::new(executor)), Path("lead-1".to_string()))
            .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .expect("candidates array");
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].get("agentId"), Some(&json!("agent-a")));
    assert_eq!(candidates[0].get("score"), Some(&json!(58)));
}

#[tokio::test]
async fn workload_route_returns_every_agent() {
    let (executor, _, _) =
        build_executor(RuleSet::default(), vec![agent_a(), agent_b()], Vec::new());
    let app = assignment_router(Arc::new(executor));

    let response = app
        .oneshot(
            Request::get("/api/v1/agents/workload")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let entries = payload.as_array().expect("workload array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].get("band"), Some(&json!("yellow")));
}

#[tokio::test]
async fn rules_route_round_trips_saved_rules() {
    let (executor, _, _) = build_executor(RuleSet::default(), Vec::new(), Vec::new());
    let app = assignment_router(Arc::new(executor));

    let rules = json!({
        "geolocationRules": [{
            "id": "geo-downtown",
            "name": "Downtown desk",
            "type": "geolocation",
            "priority": 1,
            "ruleData": {
                "coverageAreas": ["Downtown"],
                "eligibleAgentIds": ["agent-a"]
            }
        }],
        "capacityRules": [],
        "specializationRules": []
    });

    let saved = app
        .clone()
        .oneshot(json_request("PUT", "/api/v1/assignment-rules", rules))
        .await
        .expect("route executes");
    assert_eq!(saved.status(), StatusCode::OK);
    let ack = read_json_body(saved).await;
    assert_eq!(ack.get("status"), Some(&json!("saved")));
    assert_eq!(ack.get("geolocationRules"), Some(&json!(1)));

    let fetched = app
        .oneshot(
            Request::get("/api/v1/assignment-rules")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(fetched.status(), StatusCode::OK);
    let payload = read_json_body(fetched).await;
    let geo = &payload["geolocationRules"][0];
    assert_eq!(geo.get("id"), Some(&json!("geo-downtown")));
    assert_eq!(geo.get("type"), Some(&json!("geolocation")));
    assert_eq!(geo["ruleData"]["eligibleAgentIds"], json!(["agent-a"]));
}

#[tokio::test]
async fn rules_route_rejects_invalid_rule_sets() {
    let (executor, _, _) = build_executor(RuleSet::default(), Vec::new(), Vec::new());
    let app = assignment_router(Arc::new(executor));

    let rules = json!({
        "geolocationRules": [],
        "capacityRules": [{
            "id": "cap-1",
            "name": "Backwards bands",
            "type": "capacity",
            "priority": 1,
            "ruleData": {
                "maxLeadsPerAgent": 25,
                "thresholds": { "green": 0.9, "yellow": 0.5, "red": 1.0 }
            }
        }],
        "specializationRules": []
    });

    let response = app
        .oneshot(json_request("PUT", "/api/v1/assignment-rules", rules))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn auto_assign_route_accepts_camel_case_payloads() {
    let (executor, _, store) = build_executor(
        RuleSet::default(),
        vec![agent_a()],
        vec![lead("lead-1", PropertyType::Condo)],
    );
    let app = assignment_router(Arc::new(executor));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/leads/auto-assign",
            json!({ "leadIds": ["lead-1"] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        store
            .snapshot(&LeadId::from("lead-1"))
            .and_then(|lead| lead.assigned_agent_id),
        Some(AgentId::from("agent-a"))
    );
}

#[tokio::test]
async fn auto_assign_handler_reports_persistence_detail_alongside_kind() {
    let executor = AssignmentExecutor::new(
        Arc::new(InMemoryRuleRepository::default()),
        Arc::new(InMemoryAgentDirectory::with_agents(vec![agent_a()])),
        Arc::new(ReadOnlyLeadStore {
            inner: InMemoryLeadStore::with_leads(vec![lead("lead-1", PropertyType::Condo)]),
        }),
        AssignmentSettings::default(),
    );

    let response = router::auto_assign_handler(
        State(Arc::new(executor)),
        Ok(axum::Json(AutoAssignmentPayload {
            lead_ids: vec![LeadId::from("lead-1")],
            force: false,
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let reason = &payload["failures"][0]["reason"];
    assert_eq!(reason.get("kind"), Some(&json!("persistence_error")));
    assert!(reason
        .get("detail")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("read only"));
}

#[tokio::test]
async fn rules_route_reports_malformed_rule_data_as_json() {
    let (executor, _, _) = build_executor(RuleSet::default(), Vec::new(), Vec::new());
    let app = assignment_router(Arc::new(executor));

    let rules = json!({
        "geolocationRules": [],
        "capacityRules": [{
            "id": "cap-1",
            "name": "Geo-shaped capacity",
            "type": "capacity",
            "priority": 1,
            "ruleData": {
                "coverageAreas": ["Downtown"],
                "eligibleAgentIds": ["agent-a"]
            }
        }],
        "specializationRules": []
    });

    let response = app
        .oneshot(json_request("PUT", "/api/v1/assignment-rules", rules))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload.get("error").and_then(Value::as_str).is_some());
}

#[tokio::test]
async fn manual_route_reports_unparseable_body_as_json() {
    let (executor, _, _) = build_executor(RuleSet::default(), vec![agent_a()], Vec::new());
    let app = assignment_router(Arc::new(executor));

    let response = app
        .oneshot(
            Request::post("/api/v1/leads/assign-manual")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"leadId\": "))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload.get("error").and_then(Value::as_str).is_some());
}
