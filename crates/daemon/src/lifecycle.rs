// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use corral_adapters::{CommandOneshot, GitVcs, TmuxMux};
use corral_config::{Config, StatePaths};
use corral_engine::{loops, Classifier, Orchestrator};
use corral_storage::StateStore;
use fs2::FileExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Daemon orchestrator with concrete adapter types.
pub type DaemonOrchestrator = Orchestrator<TmuxMux, GitVcs>;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory: {0}")]
    Config(#[from] corral_config::ConfigError),

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("state store error: {0}")]
    Store(#[from] corral_storage::StoreError),

    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state during operation.
pub struct DaemonState {
    pub paths: StatePaths,
    pub config: Arc<Config>,
    pub store: StateStore,
    pub orchestrator: Arc<DaemonOrchestrator>,
    /// Root cancellation token; cascades into every loop and tracker.
    pub cancel: CancellationToken,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    loop_handles: Vec<JoinHandle<()>>,
    persister: JoinHandle<()>,
}

/// Start the daemon: lock, recover state, reattach sessions, spawn loops.
pub async fn startup(paths: StatePaths) -> Result<DaemonState, LifecycleError> {
    match startup_inner(&paths).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock —
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) && paths.pid_path.exists() {
                let _ = std::fs::remove_file(&paths.pid_path);
            }
            Err(e)
        }
    }
}

async fn startup_inner(paths: &StatePaths) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;

    // Acquire the lock FIRST - prevents races. OpenOptions avoids
    // truncating the file before we hold the lock, which would wipe the
    // running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.pid_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID (truncate now that we hold the lock)
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file; // Drop mutability

    std::fs::create_dir_all(&paths.logs_dir)?;
    std::fs::create_dir_all(&paths.schemas_dir)?;

    // Boot marker: RFC3339 nanosecond UTC
    std::fs::write(
        &paths.started_path,
        format!("{}\n", Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
    )?;

    // Read-only config view; a missing file is all defaults
    let config = match Config::load(&paths.config_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            warn!(error = %e, "config unreadable, using defaults");
            Arc::new(Config::default())
        }
    };

    // Recover persisted state
    let store = StateStore::open(paths.state_path.clone())?;
    info!(
        workspaces = store.list_workspaces().len(),
        sessions = store.list_sessions().len(),
        "recovered state"
    );

    let cancel = CancellationToken::new();
    let persister = store.spawn_persister(cancel.clone());

    let orchestrator = Arc::new(Orchestrator::new(
        TmuxMux::new(),
        GitVcs::new(),
        store.clone(),
        Arc::clone(&config),
        paths.clone(),
        cancel.clone(),
    ));

    // Reattach surviving sessions and reconcile workspaces before any loop
    // observes state
    orchestrator
        .bootstrap()
        .await
        .map_err(|e| LifecycleError::Bootstrap(e.to_string()))?;

    // Classifier schemas are label-addressed files written at boot
    let classifier = Classifier::new(
        CommandOneshot::new(),
        store.clone(),
        Arc::clone(&config),
        paths.clone(),
    );
    classifier.write_schemas()?;

    let sessions = orchestrator.sessions().clone();

    let loop_handles = vec![
        loops::spawn_mtime_sampler(
            store.clone(),
            paths.clone(),
            config.mtime_poll(),
            cancel.clone(),
        ),
        loops::spawn_git_status_poller(
            orchestrator.workspaces().clone(),
            config.git_status_poll(),
            cancel.clone(),
        ),
        loops::spawn_classifier_loop(
            classifier,
            sessions.clone(),
            Arc::clone(&config),
            loops::CLASSIFIER_PERIOD,
            cancel.clone(),
        ),
        loops::spawn_log_pruner(sessions, loops::LOG_PRUNE_PERIOD, cancel.clone()),
    ];

    info!("daemon started");

    Ok(DaemonState {
        paths: paths.clone(),
        config,
        store,
        orchestrator,
        cancel,
        lock_file,
        loop_handles,
        persister,
    })
}

impl DaemonState {
    /// Shutdown gracefully: cancel loops and trackers, persist a final
    /// snapshot, release the pidfile.
    ///
    /// Multiplexer sessions are intentionally preserved so agents keep
    /// running; the next boot reattaches to them.
    pub async fn shutdown(self) {
        info!("shutting down daemon...");
        self.cancel.cancel();

        for handle in self.loop_handles {
            let _ = handle.await;
        }
        // The persister saves a final snapshot on cancellation
        let _ = self.persister.await;

        if let Err(e) = self.store.persist_now().await {
            warn!(error = %e, "final persist failed");
        }

        if self.paths.pid_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.pid_path) {
                warn!(error = %e, "failed to remove PID file");
            }
        }
        // Lock released when lock_file drops

        info!("daemon shutdown complete");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
