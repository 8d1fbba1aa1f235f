// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session output tracker.
//!
//! A tracker holds one long-lived PTY attachment to the session's
//! multiplexer window, classifies every chunk for activity tracking, and
//! fans output out to at most one consumer. A slow consumer never blocks
//! the PTY read: full channels drop chunks and the UI re-requests a
//! snapshot on reconnect.

use crate::chunk::is_meaningful_chunk;
use crate::EngineError;
use corral_adapters::{MuxAdapter, PtyAttach};
use corral_core::SessionId;
use corral_storage::StateStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Delay before retrying a failed attach.
const ATTACH_RETRY: Duration = Duration::from_millis(500);

/// Duplicate attach-failure logs are throttled to one per this window.
const ATTACH_LOG_THROTTLE: Duration = Duration::from_secs(15);

/// Minimum gap between activity-timestamp writes.
const ACTIVITY_DEBOUNCE: Duration = Duration::from_millis(500);

/// Consumer channel capacity; overflow chunks are dropped.
const CONSUMER_CAPACITY: usize = 64;

/// How long `send_input` waits for the tracker to reach `Reading`.
const INPUT_WAIT: Duration = Duration::from_secs(2);

/// Tracker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Attaching,
    Reading,
    Closing,
}

enum Cmd {
    Input(Vec<u8>, oneshot::Sender<Result<(), EngineError>>),
    Resize(u16, u16, oneshot::Sender<Result<(), EngineError>>),
    Reattach,
}

struct TrackerShared {
    session_id: SessionId,
    mux_name: Mutex<String>,
    state: Mutex<TrackerState>,
    consumer: Mutex<Option<(u64, mpsc::Sender<Vec<u8>>)>>,
    next_token: AtomicU64,
    store: StateStore,
    cancel: CancellationToken,
}

/// Handle to a running tracker. Cheap to clone.
#[derive(Clone)]
pub struct Tracker {
    shared: Arc<TrackerShared>,
    cmd_tx: mpsc::Sender<Cmd>,
}

/// Alias kept for call sites that pass trackers around.
pub type TrackerHandle = Tracker;

impl Tracker {
    /// Start a tracker for a session. The task reattaches with backoff
    /// until `stop` or the parent token cancels.
    pub fn start<M: MuxAdapter>(
        mux: M,
        session_id: SessionId,
        mux_name: String,
        store: StateStore,
        cols: u16,
        rows: u16,
        parent_cancel: &CancellationToken,
    ) -> Self {
        let cancel = parent_cancel.child_token();
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let shared = Arc::new(TrackerShared {
            session_id,
            mux_name: Mutex::new(mux_name),
            state: Mutex::new(TrackerState::Idle),
            consumer: Mutex::new(None),
            next_token: AtomicU64::new(1),
            store,
            cancel: cancel.clone(),
        });

        let task_shared = Arc::clone(&shared);
        tokio::spawn(run(task_shared, mux, cols, rows, cmd_rx));

        Self { shared, cmd_tx }
    }

    pub fn state(&self) -> TrackerState {
        *self.shared.state.lock()
    }

    /// Register as the single output consumer.
    ///
    /// Returns a fresh buffered channel and a detach token. Any previously
    /// registered channel is closed (last-writer-wins).
    pub fn attach(&self) -> (mpsc::Receiver<Vec<u8>>, u64) {
        let (tx, rx) = mpsc::channel(CONSUMER_CAPACITY);
        let token = self.shared.next_token.fetch_add(1, Ordering::SeqCst);
        // Replacing the sender drops the old one, closing its channel
        *self.shared.consumer.lock() = Some((token, tx));
        (rx, token)
    }

    /// Drop the registered consumer iff `token` still owns it.
    pub fn detach(&self, token: u64) {
        let mut consumer = self.shared.consumer.lock();
        if consumer.as_ref().is_some_and(|(t, _)| *t == token) {
            *consumer = None;
        }
    }

    /// Write input to the PTY, waiting up to 2 s for the tracker to reach
    /// `Reading`.
    pub async fn send_input(&self, bytes: Vec<u8>) -> Result<(), EngineError> {
        let deadline = Instant::now() + INPUT_WAIT;
        loop {
            if self.state() == TrackerState::Reading {
                break;
            }
            if Instant::now() >= deadline {
                return Err(EngineError::NotAttached(self.shared.session_id.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx
            .send(Cmd::Input(bytes, resp_tx))
            .await
            .map_err(|_| EngineError::NotAttached(self.shared.session_id.to_string()))?;
        resp_rx
            .await
            .map_err(|_| EngineError::NotAttached(self.shared.session_id.to_string()))?
    }

    /// Resize the PTY window.
    pub async fn resize(&self, cols: u16, rows: u16) -> Result<(), EngineError> {
        if cols == 0 || rows == 0 {
            return Err(EngineError::SpawnFailed(format!(
                "invalid terminal size {cols}x{rows}"
            )));
        }
        if self.state() != TrackerState::Reading {
            return Err(EngineError::NotAttached(self.shared.session_id.to_string()));
        }

        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx
            .send(Cmd::Resize(cols, rows, resp_tx))
            .await
            .map_err(|_| EngineError::NotAttached(self.shared.session_id.to_string()))?;
        resp_rx
            .await
            .map_err(|_| EngineError::NotAttached(self.shared.session_id.to_string()))?
    }

    /// Point the tracker at a renamed multiplexer session. The current PTY
    /// closes and the next cycle attaches against the new name.
    pub fn notify_renamed(&self, new_mux_name: String) {
        *self.shared.mux_name.lock() = new_mux_name;
        let _ = self.cmd_tx.try_send(Cmd::Reattach);
    }

    /// Stop the tracker and its PTY.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }
}

async fn run<M: MuxAdapter>(
    shared: Arc<TrackerShared>,
    mux: M,
    cols: u16,
    rows: u16,
    mut cmd_rx: mpsc::Receiver<Cmd>,
) {
    let mut last_attach_log: Option<Instant> = None;

    'outer: while !shared.cancel.is_cancelled() {
        *shared.state.lock() = TrackerState::Attaching;
        let name = shared.mux_name.lock().clone();
        let argv = mux.attach_command(&name);

        let (mut attach, mut chunks) = match PtyAttach::spawn(&argv, cols, rows) {
            Ok(pair) => pair,
            Err(e) => {
                let should_log = last_attach_log
                    .map(|t| t.elapsed() >= ATTACH_LOG_THROTTLE)
                    .unwrap_or(true);
                if should_log {
                    tracing::warn!(session = %shared.session_id, error = %e, "pty attach failed, retrying");
                    last_attach_log = Some(Instant::now());
                }
                // Reject queued input while unattached, then back off
                drain_commands(&mut cmd_rx, &shared);
                tokio::select! {
                    _ = shared.cancel.cancelled() => break 'outer,
                    _ = tokio::time::sleep(ATTACH_RETRY) => {}
                }
                continue;
            }
        };

        *shared.state.lock() = TrackerState::Reading;
        let mut last_activity: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = shared.cancel.cancelled() => {
                    *shared.state.lock() = TrackerState::Closing;
                    attach.close();
                    break 'outer;
                }
                chunk = chunks.recv() => {
                    match chunk {
                        Some(bytes) => {
                            deliver(&shared, &bytes);
                            if is_meaningful_chunk(&bytes) {
                                record_activity(&shared, &mut last_activity);
                            }
                        }
                        None => {
                            // PTY hit EOF or errored: close and reattach
                            *shared.state.lock() = TrackerState::Closing;
                            attach.close();
                            break;
                        }
                    }
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Cmd::Input(bytes, resp)) => {
                            let result = attach
                                .write(&bytes)
                                .map_err(|e| EngineError::NotAttached(e.to_string()));
                            let _ = resp.send(result);
                        }
                        Some(Cmd::Resize(c, r, resp)) => {
                            let result = attach
                                .resize(c, r)
                                .map_err(|e| EngineError::SpawnFailed(e.to_string()));
                            let _ = resp.send(result);
                        }
                        Some(Cmd::Reattach) => {
                            *shared.state.lock() = TrackerState::Closing;
                            attach.close();
                            break;
                        }
                        None => {
                            *shared.state.lock() = TrackerState::Closing;
                            attach.close();
                            break 'outer;
                        }
                    }
                }
            }
        }

        // Backoff before the next attach cycle
        *shared.state.lock() = TrackerState::Attaching;
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = tokio::time::sleep(ATTACH_RETRY) => {}
        }
    }

    *shared.state.lock() = TrackerState::Idle;
}

/// Offer a chunk to the registered consumer without blocking.
fn deliver(shared: &TrackerShared, bytes: &[u8]) {
    let consumer = shared.consumer.lock();
    if let Some((_, tx)) = consumer.as_ref() {
        // Full channel: drop the chunk rather than stall the PTY read
        let _ = tx.try_send(bytes.to_vec());
    }
}

/// Advance the session's activity timestamp, debounced.
fn record_activity(shared: &TrackerShared, last: &mut Option<Instant>) {
    let due = last
        .map(|t| t.elapsed() >= ACTIVITY_DEBOUNCE)
        .unwrap_or(true);
    if due {
        shared
            .store
            .update_session_last_output(&shared.session_id, chrono::Utc::now());
        *last = Some(Instant::now());
    }
}

/// Answer queued commands with `NotAttached` while no PTY is open.
fn drain_commands(cmd_rx: &mut mpsc::Receiver<Cmd>, shared: &TrackerShared) {
    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            Cmd::Input(_, resp) | Cmd::Resize(_, _, resp) => {
                let _ = resp.send(Err(EngineError::NotAttached(
                    shared.session_id.to_string(),
                )));
            }
            Cmd::Reattach => {}
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
