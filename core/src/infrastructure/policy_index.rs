// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Index
//!
//! Holds the current [`PolicySet`] behind a single guarded pointer. The set
//! itself is immutable once published; `swap` replaces the `Arc`, so a reader
//! that has already taken `current()` keeps a consistent snapshot for the
//! rest of its request regardless of concurrent reloads.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::policy::PolicySet;

pub struct PolicyIndex {
    current: RwLock<Arc<PolicySet>>,
}

impl PolicyIndex {
    pub fn new(initial: PolicySet) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The current snapshot. Cheap: clones the `Arc`, never the set.
    pub fn current(&self) -> Arc<PolicySet> {
        self.current.read().clone()
    }

    /// Publish a new snapshot. Single caller: the watcher's reload path.
    pub fn swap(&self, next: Arc<PolicySet>) {
        *self.current.write() = next;
    }
}
