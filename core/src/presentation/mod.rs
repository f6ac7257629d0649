// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`aegis-core`)
//!
//! The HTTP surface that translates external requests into application
//! service calls. No business logic lives here — all real work is delegated
//! to [`crate::application::dispatch::DispatchService`] and the read-only
//! admin views over core state.

pub mod api;

pub use api::{app, AppState};
