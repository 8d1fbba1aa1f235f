// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! corral-adapters: thin wrappers around the processes the daemon drives.
//!
//! Three seams live here: the terminal multiplexer (`mux`), the version
//! control system (`vcs`), and the one-shot classifier runner (`oneshot`).
//! Each seam is an async trait with a real subprocess-backed implementation
//! and a fake for tests. `pty` holds the PTY attachment used by session
//! trackers.

pub mod mux;
pub mod oneshot;
pub mod pty;
pub mod vcs;

pub use mux::{MuxAdapter, MuxError, TmuxMux};
pub use oneshot::{CommandOneshot, OneshotError, OneshotRunner};
pub use pty::{PtyAttach, PtyChunk, PtyError};
pub use vcs::{DirtyStats, GitVcs, RebaseOutcome, VcsAdapter, VcsError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use mux::{FakeMux, FakeMuxSession, MuxCall};
#[cfg(any(test, feature = "test-support"))]
pub use oneshot::{FakeOneshot, OneshotCall};
#[cfg(any(test, feature = "test-support"))]
pub use vcs::FakeVcs;
