// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use corral_adapters::{FakeMux, FakeOneshot};
use corral_config::ClassifierConfig;
use corral_core::{Session, Workspace, WorkspaceId};

struct Fixture {
    _dir: tempfile::TempDir,
    paths: StatePaths,
    mux: FakeMux,
    store: StateStore,
    config: Arc<Config>,
    cancel: CancellationToken,
}

fn fixture(classifier_target: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let store = StateStore::open_in(dir.path()).unwrap();
    let config = Arc::new(Config {
        classifier: ClassifierConfig {
            target: classifier_target.to_string(),
        },
        ..Config::default()
    });
    std::fs::create_dir_all(&paths.logs_dir).unwrap();
    Fixture {
        _dir: dir,
        paths,
        mux: FakeMux::new(),
        store,
        config,
        cancel: CancellationToken::new(),
    }
}

fn seed_idle_session(f: &Fixture, id: &str, idle_secs: i64) -> corral_core::SessionId {
    let now = chrono::Utc::now();
    f.store
        .add_workspace(Workspace::new(
            WorkspaceId::new("ws-1"),
            "r",
            "main",
            f.paths.state_dir.clone(),
        ))
        .unwrap_or(());
    f.store.add_session(Session {
        id: corral_core::SessionId::new(id),
        workspace_id: WorkspaceId::new("ws-1"),
        target: "claude".to_string(),
        prompt: String::new(),
        nickname: String::new(),
        multiplex_name: id.to_string(),
        pid: 0,
        created_at: now,
        last_output_at: now - chrono::Duration::seconds(idle_secs),
        classification: String::new(),
    });
    // Keep the mux window alive so is_running sees the fallback path
    f.mux.add_session(id);
    std::fs::write(f.paths.session_log(id), "agent said something\n\u{276f} ").unwrap();
    corral_core::SessionId::new(id)
}

#[tokio::test]
async fn mtime_sampler_advances_activity_from_log_writes() {
    let f = fixture("");
    let id = seed_idle_session(&f, "s-mtime", 120);
    let before = f.store.get_session(&id).unwrap().last_output_at;

    let handle = spawn_mtime_sampler(
        f.store.clone(),
        f.paths.clone(),
        Duration::from_millis(50),
        f.cancel.clone(),
    );

    // Touch the log: the pipe-pane would do this on real output
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(f.paths.session_log("s-mtime"), "new output\n").unwrap();

    let mut advanced = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if f.store.get_session(&id).unwrap().last_output_at > before {
            advanced = true;
            break;
        }
    }
    assert!(advanced, "sampler never picked up the log mtime");

    f.cancel.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn classifier_runs_exactly_once_per_idle_session() {
    let f = fixture("claude");
    let id = seed_idle_session(&f, "s-idle", 20);

    let runner = FakeOneshot::new(r#"{"state":"Idle"}"#).with_delay(Duration::from_millis(300));
    let classifier = Classifier::new(
        runner.clone(),
        f.store.clone(),
        Arc::clone(&f.config),
        f.paths.clone(),
    );
    let sessions = SessionManager::new(
        f.mux.clone(),
        f.store.clone(),
        Arc::clone(&f.config),
        f.paths.clone(),
    );

    let handle = spawn_classifier_loop(
        classifier,
        sessions,
        Arc::clone(&f.config),
        Duration::from_millis(100),
        f.cancel.clone(),
    );

    // Several periods pass while the first (slow) classification is in flight
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(runner.call_count(), 1, "at-most-one classification in flight");
    assert_eq!(
        f.store.get_session(&id).unwrap().classification,
        r#"{"state":"Idle"}"#
    );

    // Further ticks never re-invoke while the classification is non-empty
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(runner.call_count(), 1);

    f.cancel.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn classifier_skips_recently_active_sessions() {
    let f = fixture("claude");
    seed_idle_session(&f, "s-busy", 0);

    let runner = FakeOneshot::new("{}");
    let classifier = Classifier::new(
        runner.clone(),
        f.store.clone(),
        Arc::clone(&f.config),
        f.paths.clone(),
    );
    let sessions = SessionManager::new(
        f.mux.clone(),
        f.store.clone(),
        Arc::clone(&f.config),
        f.paths.clone(),
    );
    let handle = spawn_classifier_loop(
        classifier,
        sessions,
        Arc::clone(&f.config),
        Duration::from_millis(50),
        f.cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(runner.call_count(), 0);

    f.cancel.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn empty_classifier_target_disables_the_loop() {
    let f = fixture("");
    seed_idle_session(&f, "s-quiet", 3600);

    let runner = FakeOneshot::new("{}");
    let classifier = Classifier::new(
        runner.clone(),
        f.store.clone(),
        Arc::clone(&f.config),
        f.paths.clone(),
    );
    let sessions = SessionManager::new(
        f.mux.clone(),
        f.store.clone(),
        Arc::clone(&f.config),
        f.paths.clone(),
    );
    let handle = spawn_classifier_loop(
        classifier,
        sessions,
        Arc::clone(&f.config),
        Duration::from_millis(50),
        f.cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(runner.call_count(), 0, "disabled classifier made external calls");

    f.cancel.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn log_pruner_sweeps_orphaned_logs() {
    let f = fixture("");
    let id = seed_idle_session(&f, "s-keep", 0);
    std::fs::write(f.paths.logs_dir.join("orphan-00000000.log"), "stale").unwrap();

    let sessions = SessionManager::new(
        f.mux.clone(),
        f.store.clone(),
        Arc::clone(&f.config),
        f.paths.clone(),
    );
    let handle = spawn_log_pruner(sessions, Duration::from_millis(50), f.cancel.clone());

    let mut pruned = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if !f.paths.logs_dir.join("orphan-00000000.log").exists() {
            pruned = true;
            break;
        }
    }
    assert!(pruned, "orphan log never pruned");
    assert!(f.paths.session_log(id.as_str()).exists());

    f.cancel.cancel();
    let _ = handle.await;
}
