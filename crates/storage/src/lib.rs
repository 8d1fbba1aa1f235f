// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! corral-storage: the in-process state store and its on-disk snapshot.
//!
//! The store is the single owner of workspace and session records. Reads
//! return deep copies; writes take the write lock and schedule a debounced
//! persist so no caller blocks on disk. The state file is staged and
//! atomically renamed into place, and a corrupt file is quarantined rather
//! than aborting boot.

mod state;

pub use state::{StateSnapshot, StateStore, StoreError};
