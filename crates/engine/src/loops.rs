// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background loops.
//!
//! Each loop is an independent task on the daemon's root cancellation
//! token. Loops never surface errors to callers; they log and continue.

use crate::classify::Classifier;
use crate::sessions::SessionManager;
use crate::workspaces::WorkspaceManager;
use chrono::{DateTime, Utc};
use corral_adapters::{MuxAdapter, OneshotRunner, VcsAdapter};
use corral_config::{Config, StatePaths};
use corral_core::SessionId;
use corral_storage::StateStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Classifier sweep period.
pub const CLASSIFIER_PERIOD: Duration = Duration::from_secs(15);

/// Log pruner period.
pub const LOG_PRUNE_PERIOD: Duration = Duration::from_secs(60 * 60);

fn interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval
}

/// Low-resolution activity fallback: advance `last_output_at` from the log
/// file's mtime. Covers sessions with no live tracker (the pipe-pane keeps
/// appending regardless).
pub fn spawn_mtime_sampler(
    store: StateStore,
    paths: StatePaths,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            for session in store.list_sessions() {
                let log_path = paths.session_log(session.id.as_str());
                if let Some(mtime) = mtime_of(&log_path) {
                    if mtime > session.last_output_at {
                        store.update_session_last_output(&session.id, mtime);
                    }
                }
            }
        }
    })
}

fn mtime_of(path: &std::path::Path) -> Option<DateTime<Utc>> {
    let modified = path.metadata().ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Periodic git-status sweep over all workspaces. Passes run strictly one
/// at a time; a long pass delays the next tick instead of overlapping it.
pub fn spawn_git_status_poller<V: VcsAdapter>(
    manager: WorkspaceManager<V>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            manager.update_all_git_status().await;
        }
    })
}

/// Inactivity-triggered classification.
///
/// A session is eligible when its classification is empty, it is still
/// running, and it has been quiet past the configured threshold. At most
/// one classification is in flight per session.
pub fn spawn_classifier_loop<M: MuxAdapter, O: OneshotRunner>(
    classifier: Classifier<O>,
    sessions: SessionManager<M>,
    config: Arc<Config>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let in_flight: Arc<Mutex<HashSet<SessionId>>> = Arc::new(Mutex::new(HashSet::new()));

    tokio::spawn(async move {
        if !config.classifier_enabled() {
            return;
        }

        let threshold = config.inactivity_threshold();
        let mut tick = interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }

            let now = Utc::now();
            for session in sessions.list() {
                if !session.classification.is_empty() {
                    continue;
                }
                let idle_for = (now - session.last_output_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if idle_for < threshold {
                    continue;
                }
                if !sessions.is_running(&session.id).await {
                    continue;
                }
                if !in_flight.lock().insert(session.id.clone()) {
                    continue;
                }

                let classifier = classifier.clone();
                let in_flight = Arc::clone(&in_flight);
                tokio::spawn(async move {
                    let id = session.id.clone();
                    if let Err(e) = classifier.classify(&session).await {
                        tracing::warn!(session = %id, error = %e, "classification failed");
                    }
                    in_flight.lock().remove(&id);
                });
            }
        }
    })
}

/// Delete orphaned session logs on a slow cadence.
pub fn spawn_log_pruner<M: MuxAdapter>(
    sessions: SessionManager<M>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            sessions.prune_logs();
        }
    })
}

#[cfg(test)]
#[path = "loops_tests.rs"]
mod tests;
