// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Domain
//!
//! The evaluation input ([`ToolRequest`]), the evaluator's verdict
//! ([`Decision`]), and the audit shape appended to the decision ring and
//! handed to telemetry ([`DecisionRecord`]).
//!
//! Deny reasons form a closed, sanitized vocabulary ([`DenyReason`]) so that
//! nothing caller-controlled ever leaks into a response or a log line. The
//! same rule applies to request params: only their canonical SHA-256 digest
//! ([`params_hash`]) is recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A single tool invocation awaiting a policy verdict.
///
/// `agent_id` and `parent_agent` come from the `X-Agent-ID` /
/// `X-Parent-Agent` headers; `tool` and `action` from the request path.
/// `params` is the raw JSON body, captured verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub agent_id: String,
    pub parent_agent: Option<String>,
    pub tool: String,
    pub action: String,
    pub params: Value,
}

/// Identifies the permission entry that granted or deferred a request.
///
/// Carried on `Allow`-adjacent decisions so the approval store and audit
/// records can say *which* rule matched without re-scanning the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRef {
    pub agent_id: String,
    pub tool: String,
    pub action: String,
}

/// The evaluator's verdict for a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The matched permission allows the call outright.
    Allow,
    /// The call is rejected; `reason` is one of the fixed sanitized strings.
    Deny { reason: DenyReason },
    /// The matched permission requires an explicit release before execution.
    ApprovalRequired { permission: PermissionRef },
}

/// Fixed vocabulary of denial reasons.
///
/// Every deny surfaced to a caller or written to the audit trail uses one of
/// these strings verbatim. Reasons never embed request content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    UnknownAgent,
    ParentRequired,
    ParentNotPermitted,
    ParentDenied,
    ActionNotPermitted,
    AmountRequired,
    AmountExceedsLimit,
    CurrencyRequired,
    CurrencyNotAllowed,
    PathOutsideAllowedFolder,
}

impl DenyReason {
    /// The user-facing reason string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownAgent => "unknown agent",
            Self::ParentRequired => "parent required",
            Self::ParentNotPermitted => "parent not permitted",
            Self::ParentDenied => "parent denied",
            Self::ActionNotPermitted => "action not permitted",
            Self::AmountRequired => "amount required",
            Self::AmountExceedsLimit => "amount exceeds limit",
            Self::CurrencyRequired => "currency required",
            Self::CurrencyNotAllowed => "currency not allowed",
            Self::PathOutsideAllowedFolder => "path outside allowed folder",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal classification of a dispatched request, as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Allow,
    Deny,
    ApprovalRequired,
    ApprovedExecuted,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::ApprovalRequired => "approval_required",
            Self::ApprovedExecuted => "approved_executed",
        }
    }
}

/// One entry in the decision ring; also the JSON shape exported to telemetry
/// and the admin decisions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub parent_agent: Option<String>,
    pub tool: String,
    pub action: String,
    pub decision: DecisionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub params_hash: String,
    pub latency_ms: f64,
    pub trace_id: String,
    pub policy_fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<Uuid>,
}

/// SHA-256 hex digest of the canonical encoding of `params`.
///
/// Canonicalization sorts object keys recursively, so two params objects
/// with equal content always hash identically regardless of key order.
pub fn params_hash(params: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(params, &mut canonical);
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{:x}", digest)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Object keys are strings; serde_json escapes them for us.
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_hash_ignores_key_order() {
        let a = json!({"amount": 2000, "currency": "USD", "vendor_id": "V42"});
        let b = json!({"vendor_id": "V42", "amount": 2000, "currency": "USD"});
        assert_eq!(params_hash(&a), params_hash(&b));
    }

    #[test]
    fn test_params_hash_nested_objects() {
        let a = json!({"outer": {"b": 2, "a": 1}, "list": [{"y": 2, "x": 1}]});
        let b = json!({"list": [{"x": 1, "y": 2}], "outer": {"a": 1, "b": 2}});
        assert_eq!(params_hash(&a), params_hash(&b));
    }

    #[test]
    fn test_params_hash_differs_on_content() {
        let a = json!({"amount": 2000});
        let b = json!({"amount": 2001});
        assert_ne!(params_hash(&a), params_hash(&b));
    }

    #[test]
    fn test_deny_reason_strings_are_fixed() {
        assert_eq!(DenyReason::UnknownAgent.as_str(), "unknown agent");
        assert_eq!(DenyReason::AmountExceedsLimit.as_str(), "amount exceeds limit");
        assert_eq!(
            DenyReason::PathOutsideAllowedFolder.as_str(),
            "path outside allowed folder"
        );
    }

    #[test]
    fn test_decision_kind_serialization() {
        let json = serde_json::to_string(&DecisionKind::ApprovalRequired).unwrap();
        assert_eq!(json, "\"approval_required\"");
        let json = serde_json::to_string(&DecisionKind::ApprovedExecuted).unwrap();
        assert_eq!(json, "\"approved_executed\"");
    }

    #[test]
    fn test_decision_record_omits_empty_fields() {
        let record = DecisionRecord {
            timestamp: Utc::now(),
            agent_id: "finance-agent".to_string(),
            parent_agent: None,
            tool: "payments".to_string(),
            action: "create".to_string(),
            decision: DecisionKind::Allow,
            reason: None,
            params_hash: params_hash(&json!({})),
            latency_ms: 1.5,
            trace_id: "abc".to_string(),
            policy_fingerprint: "fp".to_string(),
            approval_id: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("reason").is_none());
        assert!(value.get("approval_id").is_none());
        assert_eq!(value["decision"], "allow");
    }
}
