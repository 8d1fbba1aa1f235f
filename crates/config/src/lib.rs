// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! corral-config: read-only view of the daemon configuration.
//!
//! The daemon consumes `STATE/config.json` as an input; it never writes it.
//! A missing file yields all defaults, so a fresh install works without any
//! configuration. Every accessor returns a typed value with a defensible
//! default baked in.

mod paths;
mod view;

pub use paths::{state_dir, StatePaths};
pub use view::{ClassifierConfig, Config, RepoEntry, TerminalConfig};

use thiserror::Error;

/// Errors from config loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not determine state directory")]
    NoStateDir,
}
