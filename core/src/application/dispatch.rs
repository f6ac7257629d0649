// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dispatch Orchestrator
//!
//! The one component that ties the others together: evaluate against the
//! current snapshot, then forward, defer, or deny. Every terminal outcome is
//! appended to the decision ring and handed to telemetry exactly once.
//!
//! The release path re-enters the forward step without re-evaluating — an
//! approval was issued against a specific permission and the token is the
//! authority. The only blocking call on the request path is the adapter
//! invocation, bounded by the deadline the HTTP layer passes in.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::domain::approval::{ApprovalStatus, ReleaseOutcome};
use crate::domain::decision::{
    params_hash, Decision, DecisionKind, DecisionRecord, ToolRequest,
};
use crate::infrastructure::adapters::AdapterRegistry;
use crate::infrastructure::approval_store::ApprovalStore;
use crate::infrastructure::decision_ring::DecisionRing;
use crate::infrastructure::policy_index::PolicyIndex;
use crate::infrastructure::telemetry::Telemetry;

/// Terminal outcome of a dispatch or release, mapped to HTTP by the
/// presentation layer.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Allowed (or released) and the adapter succeeded.
    Forwarded { result: Value },
    /// Denied by policy.
    Denied { reason: String },
    /// Deferred; the caller holds the approval token.
    PendingApproval { approval_id: Uuid },
    /// Release of an unknown approval id.
    ApprovalNotFound,
    /// Release of an approval that is not pending.
    ApprovalConflict { status: ApprovalStatus },
    /// Release of an approval past its TTL.
    ApprovalExpired,
    /// The adapter failed; `reason` is its sanitized message.
    AdapterError { reason: String },
    /// The adapter did not answer within the request deadline.
    AdapterTimeout,
}

pub struct DispatchService {
    index: Arc<PolicyIndex>,
    approvals: Arc<ApprovalStore>,
    ring: Arc<DecisionRing>,
    adapters: Arc<AdapterRegistry>,
    telemetry: Arc<dyn Telemetry>,
}

impl DispatchService {
    pub fn new(
        index: Arc<PolicyIndex>,
        approvals: Arc<ApprovalStore>,
        ring: Arc<DecisionRing>,
        adapters: Arc<AdapterRegistry>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            index,
            approvals,
            ring,
            adapters,
            telemetry,
        }
    }

    /// Evaluate and dispatch a tool call.
    pub async fn dispatch(&self, req: ToolRequest, deadline: Duration) -> DispatchOutcome {
        let started = Instant::now();
        let trace_id = new_trace_id();
        let snapshot = self.index.current();
        let fingerprint = snapshot.fingerprint().to_string();

        match snapshot.evaluate(&req) {
            Decision::Deny { reason } => {
                self.record(
                    &req,
                    DecisionKind::Deny,
                    Some(reason.as_str().to_string()),
                    &fingerprint,
                    started,
                    &trace_id,
                    None,
                );
                DispatchOutcome::Denied {
                    reason: reason.as_str().to_string(),
                }
            }
            Decision::ApprovalRequired { permission } => {
                let approval_id = self.approvals.create(req.clone(), permission);
                self.record(
                    &req,
                    DecisionKind::ApprovalRequired,
                    None,
                    &fingerprint,
                    started,
                    &trace_id,
                    Some(approval_id),
                );
                DispatchOutcome::PendingApproval { approval_id }
            }
            Decision::Allow => {
                let forwarded = self.forward(&req, deadline).await;
                let reason = forwarded.as_ref().err().map(|e| e.reason());
                self.record(
                    &req,
                    DecisionKind::Allow,
                    reason,
                    &fingerprint,
                    started,
                    &trace_id,
                    None,
                );
                match forwarded {
                    Ok(result) => DispatchOutcome::Forwarded { result },
                    Err(failure) => failure.into_outcome(),
                }
            }
        }
    }

    /// Release a pending approval and execute its captured request.
    ///
    /// No re-evaluation happens here; the snapshot fingerprint recorded is
    /// whatever is current at release time, for audit correlation only.
    pub async fn release(
        &self,
        approval_id: Uuid,
        approver_id: &str,
        deadline: Duration,
    ) -> DispatchOutcome {
        let started = Instant::now();
        let trace_id = new_trace_id();

        match self.approvals.release(approval_id, approver_id) {
            ReleaseOutcome::NotFound => DispatchOutcome::ApprovalNotFound,
            ReleaseOutcome::Conflict { status } => DispatchOutcome::ApprovalConflict { status },
            ReleaseOutcome::Expired => DispatchOutcome::ApprovalExpired,
            ReleaseOutcome::Ready {
                request,
                approval_id,
            } => {
                debug!(
                    approval_id = %approval_id,
                    approver_id = %approver_id,
                    "Executing released approval"
                );
                let fingerprint = self.index.current().fingerprint().to_string();
                let forwarded = self.forward(&request, deadline).await;
                let reason = forwarded.as_ref().err().map(|e| e.reason());
                self.record(
                    &request,
                    DecisionKind::ApprovedExecuted,
                    reason,
                    &fingerprint,
                    started,
                    &trace_id,
                    Some(approval_id),
                );
                match forwarded {
                    Ok(result) => DispatchOutcome::Forwarded { result },
                    Err(failure) => failure.into_outcome(),
                }
            }
        }
    }

    async fn forward(&self, req: &ToolRequest, deadline: Duration) -> Result<Value, ForwardFailure> {
        match tokio::time::timeout(
            deadline,
            self.adapters.invoke(&req.tool, &req.action, &req.params),
        )
        .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(ForwardFailure::Adapter(e.to_string())),
            Err(_) => Err(ForwardFailure::Timeout),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        req: &ToolRequest,
        decision: DecisionKind,
        reason: Option<String>,
        fingerprint: &str,
        started: Instant,
        trace_id: &str,
        approval_id: Option<Uuid>,
    ) {
        let record = DecisionRecord {
            timestamp: Utc::now(),
            agent_id: req.agent_id.clone(),
            parent_agent: req.parent_agent.clone(),
            tool: req.tool.clone(),
            action: req.action.clone(),
            decision,
            reason,
            params_hash: params_hash(&req.params),
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            trace_id: trace_id.to_string(),
            policy_fingerprint: fingerprint.to_string(),
            approval_id,
        };
        self.telemetry.record_decision(&record);
        self.ring.append(record);
    }
}

enum ForwardFailure {
    Adapter(String),
    Timeout,
}

impl ForwardFailure {
    fn reason(&self) -> String {
        match self {
            Self::Adapter(reason) => reason.clone(),
            Self::Timeout => "adapter timeout".to_string(),
        }
    }

    fn into_outcome(self) -> DispatchOutcome {
        match self {
            Self::Adapter(reason) => DispatchOutcome::AdapterError { reason },
            Self::Timeout => DispatchOutcome::AdapterTimeout,
        }
    }
}

fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}
