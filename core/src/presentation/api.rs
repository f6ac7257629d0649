// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # HTTP Surface
//!
//! Axum router and handlers. No business logic lives here — handlers
//! translate headers/paths/bodies into [`ToolRequest`]s, call the dispatch
//! service, and map [`DispatchOutcome`]s to status codes:
//!
//! | Outcome | Status |
//! |---------|--------|
//! | `Forwarded` | 200 |
//! | `PendingApproval` | 202 |
//! | `Denied` | 403 |
//! | `ApprovalNotFound` | 404 |
//! | `ApprovalConflict` / `ApprovalExpired` | 409 |
//! | `AdapterError` | 502 |
//! | `AdapterTimeout` | 504 |
//!
//! Request validation failures (missing `X-Agent-ID`, unparsable body) are
//! 400 with a generic message; the body is never echoed back.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::application::dispatch::{DispatchOutcome, DispatchService};
use crate::domain::decision::{params_hash, ToolRequest};
use crate::infrastructure::approval_store::ApprovalStore;
use crate::infrastructure::decision_ring::DecisionRing;
use crate::infrastructure::policy_index::PolicyIndex;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const AGENT_ID_HEADER: &str = "x-agent-id";
const PARENT_AGENT_HEADER: &str = "x-parent-agent";

/// Shared services, constructed once at startup.
pub struct AppState {
    pub dispatch: Arc<DispatchService>,
    pub index: Arc<PolicyIndex>,
    pub ring: Arc<DecisionRing>,
    pub approvals: Arc<ApprovalStore>,
    /// Deadline handed to the dispatch service per request.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        dispatch: Arc<DispatchService>,
        index: Arc<PolicyIndex>,
        ring: Arc<DecisionRing>,
        approvals: Arc<ApprovalStore>,
    ) -> Self {
        Self {
            dispatch,
            index,
            ring,
            approvals,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Build the gateway router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/tools/:tool/:action", post(dispatch_handler))
        .route("/api/approve/:approval_id", post(approve_handler))
        .route("/health", get(health_handler))
        .route("/api/admin/agents", get(admin_agents_handler))
        .route("/api/admin/policies", get(admin_policies_handler))
        .route("/api/admin/decisions", get(admin_decisions_handler))
        .route(
            "/api/admin/approvals/pending",
            get(admin_approvals_handler),
        )
        .with_state(Arc::new(state))
}

// ============================================================================
// Dispatch & release
// ============================================================================

async fn dispatch_handler(
    State(state): State<Arc<AppState>>,
    Path((tool, action)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(agent_id) = header_value(&headers, AGENT_ID_HEADER) else {
        return bad_request("missing X-Agent-ID header");
    };
    let parent_agent = header_value(&headers, PARENT_AGENT_HEADER);

    let params = if body.is_empty() {
        json!({})
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) if value.is_object() => value,
            Ok(_) => return bad_request("request body must be a JSON object"),
            Err(_) => return bad_request("request body must be valid JSON"),
        }
    };

    let request = ToolRequest {
        agent_id,
        parent_agent,
        tool,
        action,
        params,
    };

    let outcome = state.dispatch.dispatch(request, state.request_timeout).await;
    outcome_response(outcome)
}

async fn approve_handler(
    State(state): State<Arc<AppState>>,
    Path(approval_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(approver_id) = header_value(&headers, AGENT_ID_HEADER) else {
        return bad_request("missing X-Agent-ID header");
    };

    // An unparsable token names nothing we know about.
    let Ok(approval_id) = Uuid::parse_str(&approval_id) else {
        return outcome_response(DispatchOutcome::ApprovalNotFound);
    };

    let outcome = state
        .dispatch
        .release(approval_id, &approver_id, state.request_timeout)
        .await;
    outcome_response(outcome)
}

fn outcome_response(outcome: DispatchOutcome) -> Response {
    match outcome {
        DispatchOutcome::Forwarded { result } => (StatusCode::OK, Json(result)).into_response(),
        DispatchOutcome::Denied { reason } => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "PolicyViolation", "reason": reason })),
        )
            .into_response(),
        DispatchOutcome::PendingApproval { approval_id } => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "pending_approval", "approval_id": approval_id })),
        )
            .into_response(),
        DispatchOutcome::ApprovalNotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "NotFound", "reason": "approval not found" })),
        )
            .into_response(),
        DispatchOutcome::ApprovalConflict { status } => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Conflict", "status": status.as_str() })),
        )
            .into_response(),
        DispatchOutcome::ApprovalExpired => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Conflict", "status": "expired" })),
        )
            .into_response(),
        DispatchOutcome::AdapterError { reason } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "ToolError", "reason": reason })),
        )
            .into_response(),
        DispatchOutcome::AdapterTimeout => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": "ToolTimeout", "reason": "adapter timeout" })),
        )
            .into_response(),
    }
}

// ============================================================================
// Health & admin
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.index.current();
    Json(json!({
        "status": "healthy",
        "service": "aegis-gateway",
        "policy": {
            "policy_files": snapshot.sources().len(),
            "total_agents": snapshot.agent_count(),
        },
    }))
}

async fn admin_agents_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.index.current();
    let agents: Vec<&str> = snapshot.agent_ids().collect();
    Json(json!({ "agents": agents }))
}

async fn admin_policies_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.index.current();
    Json(json!({
        "policies": snapshot.sources(),
        "version_fingerprint": snapshot.fingerprint(),
    }))
}

#[derive(Deserialize)]
struct DecisionsQuery {
    limit: Option<usize>,
}

async fn admin_decisions_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DecisionsQuery>,
) -> Json<Value> {
    let limit = query.limit.unwrap_or(50);
    let decisions = state.ring.snapshot(limit);
    Json(json!({ "decisions": decisions }))
}

async fn admin_approvals_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let pending: Vec<Value> = state
        .approvals
        .list_pending()
        .into_iter()
        .map(|entry| {
            json!({
                "id": entry.id,
                "agent_id": entry.request.agent_id,
                "parent_agent": entry.request.parent_agent,
                "tool": entry.request.tool,
                "action": entry.request.action,
                "params_hash": params_hash(&entry.request.params),
                "status": entry.status.as_str(),
                "created_at": entry.created_at,
            })
        })
        .collect();
    Json(json!({ "pending_approvals": pending }))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn bad_request(reason: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "BadRequest", "reason": reason })),
    )
        .into_response()
}
