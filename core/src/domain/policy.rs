// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Domain
//!
//! The rule model and the evaluator. A [`PolicySet`] is an immutable,
//! fingerprinted snapshot of every active [`AgentRule`]; evaluation is a pure
//! method on the snapshot — no I/O, no locks, no clock.
//!
//! ## Evaluation order
//!
//! ```text
//! PolicySet::evaluate(request)
//!   1. agent lookup            → deny "unknown agent"
//!   2. parent checks           → deny "parent required" / "parent not permitted" / "parent denied"
//!   3. permission scan         → deny "action not permitted" (first tool+action match wins)
//!   4. condition checks        → deny with the condition's reason (canonical order)
//!   5. require_approval        → ApprovalRequired
//!   6. otherwise               → Allow
//! ```
//!
//! The first terminal step wins. Conditions are held in a fixed canonical
//! order (amount, currency, path) so denial messages are deterministic for a
//! given rule set.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::decision::{Decision, DenyReason, PermissionRef, ToolRequest};

/// A parameter-level constraint on a matched permission.
///
/// The condition vocabulary is closed: unknown keys in a policy file are
/// dropped (with a load warning) rather than deferred to runtime checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    /// `params.amount` must be a number `<= limit` (inclusive).
    MaxAmount(f64),
    /// `params.currency` must be a member of the set.
    Currencies(BTreeSet<String>),
    /// `params.path` must be a string starting with the prefix.
    FolderPrefix(String),
}

impl Condition {
    /// Check the condition against the request params.
    ///
    /// Pure and fail-safe: a missing or mistyped param is a denial, never a
    /// pass. Returns the fixed [`DenyReason`] on violation.
    pub fn check(&self, params: &Value) -> Result<(), DenyReason> {
        match self {
            Self::MaxAmount(limit) => {
                let amount = params
                    .get("amount")
                    .and_then(Value::as_f64)
                    .ok_or(DenyReason::AmountRequired)?;
                if amount > *limit {
                    return Err(DenyReason::AmountExceedsLimit);
                }
                Ok(())
            }
            Self::Currencies(allowed) => {
                let currency = params
                    .get("currency")
                    .and_then(Value::as_str)
                    .ok_or(DenyReason::CurrencyRequired)?;
                if !allowed.contains(currency) {
                    return Err(DenyReason::CurrencyNotAllowed);
                }
                Ok(())
            }
            Self::FolderPrefix(prefix) => {
                let path = params
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or(DenyReason::PathOutsideAllowedFolder)?;
                if !path.starts_with(prefix.as_str()) {
                    return Err(DenyReason::PathOutsideAllowedFolder);
                }
                Ok(())
            }
        }
    }

    /// Canonical ordering rank; the loader sorts conditions by this so
    /// evaluation (and therefore denial messages) is deterministic.
    pub fn rank(&self) -> u8 {
        match self {
            Self::MaxAmount(_) => 0,
            Self::Currencies(_) => 1,
            Self::FolderPrefix(_) => 2,
        }
    }
}

/// One tool/action grant for an agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Permission {
    pub tool: String,
    pub actions: BTreeSet<String>,
    pub conditions: Vec<Condition>,
    pub require_approval: bool,
}

impl Permission {
    fn matches(&self, tool: &str, action: &str) -> bool {
        self.tool == tool && self.actions.contains(action)
    }
}

/// The complete rule set for one agent id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRule {
    pub id: String,
    /// When set, a request must carry a parent id from this set.
    pub allow_only_parents: Option<BTreeSet<String>>,
    /// A request whose parent is in this set is denied, even if the parent
    /// also passes `allow_only_parents`.
    pub deny_if_parent: BTreeSet<String>,
    /// Scanned in declared order; the first tool+action match is selected.
    pub permissions: Vec<Permission>,
}

/// Provenance of one loaded policy file, for admin introspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySource {
    pub path: String,
    pub version: u32,
    pub agent_count: usize,
}

/// An immutable snapshot of all active rules.
///
/// Published wholesale by the policy index; never mutated after
/// construction. The fingerprint depends only on semantic content — the
/// agent map is ordered and every set inside it is ordered, so file order,
/// whitespace, and mtime cannot perturb it.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySet {
    agents: BTreeMap<String, AgentRule>,
    sources: Vec<PolicySource>,
    fingerprint: String,
}

impl PolicySet {
    /// Build a snapshot from a merged agent map, computing the fingerprint.
    pub fn new(agents: BTreeMap<String, AgentRule>, sources: Vec<PolicySource>) -> Self {
        let fingerprint = fingerprint_of(&agents);
        Self {
            agents,
            sources,
            fingerprint,
        }
    }

    /// A snapshot with no rules; every request evaluates to "unknown agent".
    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), Vec::new())
    }

    pub fn agent(&self, id: &str) -> Option<&AgentRule> {
        self.agents.get(id)
    }

    /// Agent ids in sorted order.
    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn sources(&self) -> &[PolicySource] {
        &self.sources
    }

    /// Stable hash of the semantic content, exported in telemetry and the
    /// admin policies listing.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Evaluate a request against this snapshot.
    ///
    /// Deterministic and side-effect-free; see the module docs for the
    /// normative step order.
    pub fn evaluate(&self, req: &ToolRequest) -> Decision {
        let Some(agent) = self.agents.get(&req.agent_id) else {
            return Decision::Deny {
                reason: DenyReason::UnknownAgent,
            };
        };

        if let Some(allowed_parents) = &agent.allow_only_parents {
            match &req.parent_agent {
                None => {
                    return Decision::Deny {
                        reason: DenyReason::ParentRequired,
                    }
                }
                Some(parent) if !allowed_parents.contains(parent) => {
                    return Decision::Deny {
                        reason: DenyReason::ParentNotPermitted,
                    }
                }
                Some(_) => {}
            }
        }

        if let Some(parent) = &req.parent_agent {
            if agent.deny_if_parent.contains(parent) {
                return Decision::Deny {
                    reason: DenyReason::ParentDenied,
                };
            }
        }

        let Some(permission) = agent
            .permissions
            .iter()
            .find(|p| p.matches(&req.tool, &req.action))
        else {
            return Decision::Deny {
                reason: DenyReason::ActionNotPermitted,
            };
        };

        for condition in &permission.conditions {
            if let Err(reason) = condition.check(&req.params) {
                return Decision::Deny { reason };
            }
        }

        if permission.require_approval {
            return Decision::ApprovalRequired {
                permission: PermissionRef {
                    agent_id: agent.id.clone(),
                    tool: permission.tool.clone(),
                    action: req.action.clone(),
                },
            };
        }

        Decision::Allow
    }
}

fn fingerprint_of(agents: &BTreeMap<String, AgentRule>) -> String {
    // BTree collections give a canonical serialization; hashing the JSON
    // encoding makes the fingerprint a function of content alone.
    let encoded = serde_json::to_vec(agents).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    format!("{:x}", digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn permission(tool: &str, actions: &[&str]) -> Permission {
        Permission {
            tool: tool.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            conditions: Vec::new(),
            require_approval: false,
        }
    }

    fn rule(id: &str, permissions: Vec<Permission>) -> AgentRule {
        AgentRule {
            id: id.to_string(),
            allow_only_parents: None,
            deny_if_parent: BTreeSet::new(),
            permissions,
        }
    }

    fn snapshot(rules: Vec<AgentRule>) -> PolicySet {
        let agents = rules.into_iter().map(|r| (r.id.clone(), r)).collect();
        PolicySet::new(agents, Vec::new())
    }

    fn request(agent: &str, tool: &str, action: &str, params: Value) -> ToolRequest {
        ToolRequest {
            agent_id: agent.to_string(),
            parent_agent: None,
            tool: tool.to_string(),
            action: action.to_string(),
            params,
        }
    }

    // ── Lookup and parent checks ──────────────────────────────────────────

    #[test]
    fn test_unknown_agent_is_denied() {
        let set = snapshot(vec![rule("known", vec![permission("payments", &["create"])])]);
        let dec = set.evaluate(&request("ghost", "payments", "create", json!({})));
        assert_eq!(
            dec,
            Decision::Deny {
                reason: DenyReason::UnknownAgent
            }
        );
    }

    #[test]
    fn test_allow_only_parents_requires_parent() {
        let mut worker = rule("worker-agent", vec![permission("files", &["read"])]);
        worker.allow_only_parents =
            Some(["orchestrator-agent".to_string()].into_iter().collect());
        let set = snapshot(vec![worker]);

        let no_parent = request("worker-agent", "files", "read", json!({}));
        assert_eq!(
            set.evaluate(&no_parent),
            Decision::Deny {
                reason: DenyReason::ParentRequired
            }
        );

        let mut wrong_parent = no_parent.clone();
        wrong_parent.parent_agent = Some("other".to_string());
        assert_eq!(
            set.evaluate(&wrong_parent),
            Decision::Deny {
                reason: DenyReason::ParentNotPermitted
            }
        );

        let mut good_parent = no_parent;
        good_parent.parent_agent = Some("orchestrator-agent".to_string());
        assert_eq!(set.evaluate(&good_parent), Decision::Allow);
    }

    #[test]
    fn test_deny_if_parent_overrides_allowlist() {
        let mut worker = rule("worker-agent", vec![permission("files", &["read"])]);
        worker.allow_only_parents = Some(
            ["orchestrator-agent".to_string(), "rogue".to_string()]
                .into_iter()
                .collect(),
        );
        worker.deny_if_parent = ["rogue".to_string()].into_iter().collect();
        let set = snapshot(vec![worker]);

        let mut req = request("worker-agent", "files", "read", json!({}));
        req.parent_agent = Some("rogue".to_string());
        assert_eq!(
            set.evaluate(&req),
            Decision::Deny {
                reason: DenyReason::ParentDenied
            }
        );
    }

    // ── Permission scan ───────────────────────────────────────────────────

    #[test]
    fn test_unmatched_action_is_denied() {
        let set = snapshot(vec![rule("agent", vec![permission("payments", &["create"])])]);
        let dec = set.evaluate(&request("agent", "payments", "refund", json!({})));
        assert_eq!(
            dec,
            Decision::Deny {
                reason: DenyReason::ActionNotPermitted
            }
        );
    }

    #[test]
    fn test_first_matching_permission_wins() {
        let mut first = permission("payments", &["create"]);
        first.require_approval = true;
        let second = permission("payments", &["create"]);
        let set = snapshot(vec![rule("agent", vec![first, second])]);

        let dec = set.evaluate(&request("agent", "payments", "create", json!({})));
        assert!(matches!(dec, Decision::ApprovalRequired { .. }));
    }

    // ── Conditions ────────────────────────────────────────────────────────

    #[test]
    fn test_max_amount_condition() {
        let mut perm = permission("payments", &["create"]);
        perm.conditions = vec![Condition::MaxAmount(5000.0)];
        let set = snapshot(vec![rule("finance-agent", vec![perm])]);

        let over = request(
            "finance-agent",
            "payments",
            "create",
            json!({"amount": 50000, "currency": "USD"}),
        );
        assert_eq!(
            set.evaluate(&over),
            Decision::Deny {
                reason: DenyReason::AmountExceedsLimit
            }
        );

        let at_limit = request(
            "finance-agent",
            "payments",
            "create",
            json!({"amount": 5000}),
        );
        assert_eq!(set.evaluate(&at_limit), Decision::Allow);

        let missing = request("finance-agent", "payments", "create", json!({}));
        assert_eq!(
            set.evaluate(&missing),
            Decision::Deny {
                reason: DenyReason::AmountRequired
            }
        );

        let mistyped = request(
            "finance-agent",
            "payments",
            "create",
            json!({"amount": "lots"}),
        );
        assert_eq!(
            set.evaluate(&mistyped),
            Decision::Deny {
                reason: DenyReason::AmountRequired
            }
        );
    }

    #[test]
    fn test_currency_condition() {
        let mut perm = permission("payments", &["create"]);
        perm.conditions = vec![Condition::Currencies(
            ["USD".to_string(), "EUR".to_string()].into_iter().collect(),
        )];
        let set = snapshot(vec![rule("finance-agent", vec![perm])]);

        let ok = request(
            "finance-agent",
            "payments",
            "create",
            json!({"currency": "EUR"}),
        );
        assert_eq!(set.evaluate(&ok), Decision::Allow);

        let bad = request(
            "finance-agent",
            "payments",
            "create",
            json!({"currency": "GBP"}),
        );
        assert_eq!(
            set.evaluate(&bad),
            Decision::Deny {
                reason: DenyReason::CurrencyNotAllowed
            }
        );

        let missing = request("finance-agent", "payments", "create", json!({}));
        assert_eq!(
            set.evaluate(&missing),
            Decision::Deny {
                reason: DenyReason::CurrencyRequired
            }
        );
    }

    #[test]
    fn test_folder_prefix_condition() {
        let mut perm = permission("files", &["read"]);
        perm.conditions = vec![Condition::FolderPrefix("/hr-docs/".to_string())];
        let set = snapshot(vec![rule("hr-agent", vec![perm])]);

        let inside = request(
            "hr-agent",
            "files",
            "read",
            json!({"path": "/hr-docs/employee-handbook.txt"}),
        );
        assert_eq!(set.evaluate(&inside), Decision::Allow);

        let outside = request(
            "hr-agent",
            "files",
            "read",
            json!({"path": "/legal/contract.docx"}),
        );
        assert_eq!(
            set.evaluate(&outside),
            Decision::Deny {
                reason: DenyReason::PathOutsideAllowedFolder
            }
        );
    }

    #[test]
    fn test_condition_order_is_deterministic() {
        // Both conditions fail; the canonical order reports the amount first.
        let mut perm = permission("payments", &["create"]);
        perm.conditions = vec![
            Condition::MaxAmount(100.0),
            Condition::Currencies(["USD".to_string()].into_iter().collect()),
        ];
        let set = snapshot(vec![rule("agent", vec![perm])]);

        let req = request(
            "agent",
            "payments",
            "create",
            json!({"amount": 500, "currency": "GBP"}),
        );
        assert_eq!(
            set.evaluate(&req),
            Decision::Deny {
                reason: DenyReason::AmountExceedsLimit
            }
        );
    }

    // ── Approval gate ─────────────────────────────────────────────────────

    #[test]
    fn test_require_approval_after_conditions_pass() {
        let mut perm = permission("payments", &["refund"]);
        perm.require_approval = true;
        perm.conditions = vec![Condition::MaxAmount(1000.0)];
        let set = snapshot(vec![rule("refund-agent", vec![perm])]);

        // Condition failure still denies before the approval gate.
        let over = request(
            "refund-agent",
            "payments",
            "refund",
            json!({"amount": 5000}),
        );
        assert_eq!(
            set.evaluate(&over),
            Decision::Deny {
                reason: DenyReason::AmountExceedsLimit
            }
        );

        let ok = request("refund-agent", "payments", "refund", json!({"amount": 50}));
        match set.evaluate(&ok) {
            Decision::ApprovalRequired { permission } => {
                assert_eq!(permission.agent_id, "refund-agent");
                assert_eq!(permission.tool, "payments");
                assert_eq!(permission.action, "refund");
            }
            other => panic!("expected approval requirement, got {:?}", other),
        }
    }

    // ── Determinism and fingerprint ───────────────────────────────────────

    #[test]
    fn test_evaluation_is_deterministic() {
        let mut perm = permission("payments", &["create"]);
        perm.conditions = vec![Condition::MaxAmount(5000.0)];
        let set = snapshot(vec![rule("finance-agent", vec![perm])]);
        let req = request(
            "finance-agent",
            "payments",
            "create",
            json!({"amount": 2000}),
        );

        let first = set.evaluate(&req);
        for _ in 0..10 {
            assert_eq!(set.evaluate(&req), first);
        }
    }

    #[test]
    fn test_fingerprint_depends_only_on_content() {
        let build = |ids: &[&str]| {
            snapshot(
                ids.iter()
                    .map(|id| rule(id, vec![permission("payments", &["create"])]))
                    .collect(),
            )
        };
        // Insertion order differs; the map is ordered so the content is equal.
        let a = build(&["alpha", "beta"]);
        let b = build(&["beta", "alpha"]);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = build(&["alpha", "gamma"]);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_empty_set_denies_everything() {
        let set = PolicySet::empty();
        let dec = set.evaluate(&request("anyone", "payments", "create", json!({})));
        assert_eq!(
            dec,
            Decision::Deny {
                reason: DenyReason::UnknownAgent
            }
        );
    }
}
