// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod adapters;
pub mod approval_store;
pub mod decision_ring;
pub mod policy_index;
pub mod policy_loader;
pub mod telemetry;
pub mod watcher;

pub use approval_store::ApprovalStore;
pub use decision_ring::DecisionRing;
pub use policy_index::PolicyIndex;
pub use policy_loader::{LoadWarning, PolicyLoader};
pub use telemetry::{Telemetry, TracingTelemetry};
pub use watcher::PolicyWatcher;
