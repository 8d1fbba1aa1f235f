// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for scenario tests.

use corral_adapters::{FakeMux, FakeVcs};
use corral_config::{Config, RepoEntry, StatePaths};
use corral_engine::Orchestrator;
use corral_storage::StateStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub paths: StatePaths,
    pub mux: FakeMux,
    pub vcs: FakeVcs,
    pub orchestrator: Orchestrator<FakeMux, FakeVcs>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::in_dir(dir)
    }

    /// Build a harness over an existing state dir, reusing the given
    /// adapters. Models a daemon restart against a surviving multiplexer.
    pub fn restart(self) -> Self {
        let Harness { dir, mux, vcs, .. } = self;
        Self::with_adapters(dir, mux, vcs)
    }

    fn in_dir(dir: tempfile::TempDir) -> Self {
        Self::with_adapters(dir, FakeMux::new(), FakeVcs::new())
    }

    fn with_adapters(dir: tempfile::TempDir, mux: FakeMux, vcs: FakeVcs) -> Self {
        let paths = StatePaths::new(dir.path());
        let store = StateStore::open(paths.state_path.clone()).unwrap();
        let config = Arc::new(Config {
            repos: vec![RepoEntry {
                name: "api".to_string(),
                url: "git@host:me/api.git".to_string(),
            }],
            ..Config::default()
        });

        let orchestrator = Orchestrator::new(
            mux.clone(),
            vcs.clone(),
            store,
            config,
            paths.clone(),
            CancellationToken::new(),
        );

        Harness {
            dir,
            paths,
            mux,
            vcs,
            orchestrator,
        }
    }
}
