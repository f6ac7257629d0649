// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Ring
//!
//! Bounded FIFO of the most recent decision records, exposed read-only to
//! admin clients. No persistence: the ring is the whole audit history this
//! process keeps.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::domain::decision::DecisionRecord;

pub const DEFAULT_CAPACITY: usize = 50;

pub struct DecisionRing {
    capacity: usize,
    entries: Mutex<VecDeque<DecisionRecord>>,
}

impl DecisionRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record, evicting the oldest when full. O(1).
    pub fn append(&self, record: DecisionRecord) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    /// The most recent `limit` records, newest first. `limit` is clamped to
    /// the ring capacity.
    pub fn snapshot(&self, limit: usize) -> Vec<DecisionRecord> {
        let entries = self.entries.lock();
        let limit = limit.min(self.capacity);
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for DecisionRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
