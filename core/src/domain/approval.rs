// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Approval Domain
//!
//! Types for the approval gate: a soft-deny that parks a request as a
//! [`PendingApproval`] until a designated approver releases it. The release
//! state machine itself lives in the approval store; these are the value
//! objects it manages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::decision::{PermissionRef, ToolRequest};

/// Lifecycle state of a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Waiting for a release.
    Pending,
    /// Released; transient — immediately followed by `Executed`.
    Approved,
    /// Released and spent. A spent approval can never execute again.
    Executed,
    /// Past its TTL; release attempts return a conflict.
    Expired,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Executed => "executed",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deferred execution awaiting release.
///
/// The request is captured verbatim at creation time; release executes that
/// snapshot, not a re-read of anything.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    /// The approval token handed back to the caller.
    pub id: Uuid,
    pub request: ToolRequest,
    /// The permission that deferred this request.
    pub permission: PermissionRef,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<String>,
}

/// Result of a release attempt.
#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    /// No approval with that id exists.
    NotFound,
    /// The approval exists but is not pending.
    Conflict { status: ApprovalStatus },
    /// The approval was pending but past its TTL; it is now `Expired`.
    Expired,
    /// The approval was atomically marked `Executed`; the caller must now
    /// invoke the tool adapter with the captured request.
    Ready {
        request: ToolRequest,
        approval_id: Uuid,
    },
}
