// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Approval Store
//!
//! Pending-approval lifecycle. A request whose matched permission carries
//! `require_approval` is parked here and handed back as a token; a designated
//! approver later releases it.
//!
//! Release is the one correctness-critical concurrency point in the gateway:
//! the pending → executed transition happens inside a single critical
//! section, so concurrent releases of the same id produce exactly one
//! `Ready` and conflicts for the rest. The adapter is never invoked while
//! the lock is held — release returns the captured request and the caller
//! forwards it afterwards. If that forward fails, the approval stays spent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::approval::{ApprovalStatus, PendingApproval, ReleaseOutcome};
use crate::domain::decision::{PermissionRef, ToolRequest};

pub struct ApprovalStore {
    ttl: chrono::Duration,
    entries: Mutex<HashMap<Uuid, PendingApproval>>,
}

impl ApprovalStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(900)),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Park a request and hand back its approval token.
    pub fn create(&self, request: ToolRequest, permission: PermissionRef) -> Uuid {
        let id = Uuid::new_v4();
        let entry = PendingApproval {
            id,
            request,
            permission,
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
            approved_by: None,
        };

        info!(
            approval_id = %id,
            agent_id = %entry.request.agent_id,
            tool = %entry.request.tool,
            action = %entry.request.action,
            "Approval requested"
        );

        self.entries.lock().insert(id, entry);
        id
    }

    /// Attempt to release an approval.
    ///
    /// The whole state machine runs under one lock acquisition:
    /// - unknown id → `NotFound`
    /// - status other than pending → `Conflict`
    /// - pending but past TTL → marked `Expired`, returns `Expired`
    /// - otherwise marked `Executed`, returns `Ready` with the captured request
    pub fn release(&self, id: Uuid, approver_id: &str) -> ReleaseOutcome {
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(&id) else {
            debug!(approval_id = %id, "Release of unknown approval");
            return ReleaseOutcome::NotFound;
        };

        if entry.status != ApprovalStatus::Pending {
            debug!(
                approval_id = %id,
                status = %entry.status,
                "Release conflicts with current status"
            );
            return ReleaseOutcome::Conflict {
                status: entry.status,
            };
        }

        if Utc::now() - entry.created_at > self.ttl {
            entry.status = ApprovalStatus::Expired;
            warn!(approval_id = %id, "Approval released after TTL; marked expired");
            return ReleaseOutcome::Expired;
        }

        entry.status = ApprovalStatus::Executed;
        entry.approved_by = Some(approver_id.to_string());

        info!(
            approval_id = %id,
            approver_id = %approver_id,
            agent_id = %entry.request.agent_id,
            "Approval released"
        );

        ReleaseOutcome::Ready {
            request: entry.request.clone(),
            approval_id: id,
        }
    }

    /// Snapshot of entries still pending, for the admin view.
    pub fn list_pending(&self) -> Vec<PendingApproval> {
        self.entries
            .lock()
            .values()
            .filter(|e| e.status == ApprovalStatus::Pending)
            .cloned()
            .collect()
    }

    /// Mark every pending entry past its TTL as expired. Returns how many
    /// were swept.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut swept = 0;
        for entry in self.entries.lock().values_mut() {
            if entry.status == ApprovalStatus::Pending && now - entry.created_at > self.ttl {
                entry.status = ApprovalStatus::Expired;
                swept += 1;
            }
        }
        if swept > 0 {
            info!(count = swept, "Expired pending approvals");
        }
        swept
    }

    /// Spawn the background sweeper. Cadence is internal; the observable
    /// effect is only the store's own state.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.sweep_expired();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ToolRequest {
        ToolRequest {
            agent_id: "refund-agent".to_string(),
            parent_agent: None,
            tool: "payments".to_string(),
            action: "refund".to_string(),
            params: json!({"payment_id": "p-1"}),
        }
    }

    fn permission() -> PermissionRef {
        PermissionRef {
            agent_id: "refund-agent".to_string(),
            tool: "payments".to_string(),
            action: "refund".to_string(),
        }
    }

    #[test]
    fn test_create_then_release() {
        let store = ApprovalStore::new(Duration::from_secs(900));
        let id = store.create(request(), permission());

        assert_eq!(store.list_pending().len(), 1);

        match store.release(id, "approver-1") {
            ReleaseOutcome::Ready { request, approval_id } => {
                assert_eq!(approval_id, id);
                assert_eq!(request.agent_id, "refund-agent");
                assert_eq!(request.params, json!({"payment_id": "p-1"}));
            }
            other => panic!("expected Ready, got {:?}", other),
        }

        // Spent: no longer pending, second release conflicts.
        assert!(store.list_pending().is_empty());
        match store.release(id, "approver-1") {
            ReleaseOutcome::Conflict { status } => {
                assert_eq!(status, ApprovalStatus::Executed)
            }
            other => panic!("expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_release_unknown_id() {
        let store = ApprovalStore::new(Duration::from_secs(900));
        assert!(matches!(
            store.release(Uuid::new_v4(), "approver-1"),
            ReleaseOutcome::NotFound
        ));
    }

    #[test]
    fn test_release_after_ttl_expires() {
        let store = ApprovalStore::new(Duration::from_secs(0));
        let id = store.create(request(), permission());

        // TTL of zero: any release is late.
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            store.release(id, "approver-1"),
            ReleaseOutcome::Expired
        ));
        // And stays expired on retry.
        match store.release(id, "approver-1") {
            ReleaseOutcome::Conflict { status } => assert_eq!(status, ApprovalStatus::Expired),
            other => panic!("expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_sweeper_marks_expired() {
        let store = ApprovalStore::new(Duration::from_secs(0));
        store.create(request(), permission());
        store.create(request(), permission());

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.sweep_expired(), 2);
        assert!(store.list_pending().is_empty());
        // Second sweep has nothing left to do.
        assert_eq!(store.sweep_expired(), 0);
    }

    #[test]
    fn test_concurrent_release_single_winner() {
        // Any interleaving of releases for one id yields exactly one Ready.
        let store = Arc::new(ApprovalStore::new(Duration::from_secs(900)));
        let id = store.create(request(), permission());

        let mut handles = Vec::new();
        for n in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                matches!(
                    store.release(id, &format!("approver-{}", n)),
                    ReleaseOutcome::Ready { .. }
                )
            }));
        }

        let winners: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);
    }
}
