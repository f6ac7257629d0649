// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Watcher
//!
//! Debounced filesystem-change notifier driving the loader. Raw events from
//! the policy directory collapse into a single dirty slot: a reload runs only
//! after a quiet period with no further events, reloads are serialized, and
//! events that arrive mid-reload schedule exactly one follow-up.
//!
//! Reloads are fail-safe: if the directory cannot be read, the previously
//! published snapshot stays in force and the failure goes to telemetry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::infrastructure::policy_index::PolicyIndex;
use crate::infrastructure::policy_loader::PolicyLoader;
use crate::infrastructure::telemetry::Telemetry;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

pub struct WatcherConfig {
    /// How long the directory must stay quiet before a reload runs.
    pub quiet_period: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

/// Owns the OS watcher and the debounce task. Dropping it stops both.
pub struct PolicyWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl PolicyWatcher {
    /// Start watching `dir` and publishing reloaded snapshots into `index`.
    pub fn spawn(
        dir: PathBuf,
        index: Arc<PolicyIndex>,
        telemetry: Arc<dyn Telemetry>,
        config: WatcherConfig,
    ) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
                let Ok(event) = res else { return };
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                // Rename/delete events may arrive without useful paths;
                // trigger unless we can prove the event is irrelevant.
                if !event.paths.is_empty() && !event.paths.iter().any(|p| is_policy_file(p)) {
                    return;
                }
                let _ = tx.send(());
            })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let quiet_period = config.quiet_period;
        let task = tokio::spawn(async move {
            debounce_loop(rx, dir, index, telemetry, quiet_period).await;
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for PolicyWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn debounce_loop(
    mut rx: mpsc::UnboundedReceiver<()>,
    dir: PathBuf,
    index: Arc<PolicyIndex>,
    telemetry: Arc<dyn Telemetry>,
    quiet_period: Duration,
) {
    loop {
        // Block until something changes; channel closure means the OS
        // watcher is gone and we are done.
        if rx.recv().await.is_none() {
            return;
        }
        debug!(dir = %dir.display(), "Policy change detected; debouncing");

        // Re-arm the quiet period on every further event.
        loop {
            match tokio::time::timeout(quiet_period, rx.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        // Serialized by construction: the loop runs one reload at a time,
        // and events landing during it queue up as the next dirty round.
        reload(&dir, &index, telemetry.as_ref());
    }
}

fn reload(dir: &Path, index: &PolicyIndex, telemetry: &dyn Telemetry) {
    match PolicyLoader::load(dir) {
        Ok((snapshot, warnings)) => {
            telemetry.policy_reloaded(&snapshot, &warnings);
            index.swap(Arc::new(snapshot));
        }
        Err(e) => telemetry.policy_reload_failed(&e.to_string()),
    }
}

fn is_policy_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
