// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Aegis Core
//!
//! Policy evaluation and lifecycle core for the Aegis gateway: YAML policy
//! loading with hot reload, pure request evaluation, the approval-gate state
//! machine, the bounded decision ring, and the dispatch orchestrator that
//! ties them to tool adapters and telemetry.
//!
//! # Architecture
//!
//! - **`domain`** — rule model, evaluator, decision and approval value objects
//! - **`application`** — the dispatch orchestrator
//! - **`infrastructure`** — loader, index, watcher, approval store, ring,
//!   adapters, telemetry
//! - **`presentation`** — the Axum HTTP surface

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
