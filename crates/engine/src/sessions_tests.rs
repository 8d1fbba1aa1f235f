// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use corral_adapters::FakeMux;
use corral_core::{TargetDef, Workspace, WorkspaceId};
use corral_storage::StateStore;

fn fixture() -> (tempfile::TempDir, FakeMux, StateStore, SessionManager<FakeMux>, Workspace) {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let mux = FakeMux::new();
    let store = StateStore::open_in(dir.path()).unwrap();
    let config = Arc::new(Config::default());
    let manager = SessionManager::new(mux.clone(), store.clone(), config, paths);

    let ws_path = dir.path().join("ws/api-1");
    std::fs::create_dir_all(&ws_path).unwrap();
    let workspace = Workspace::new(WorkspaceId::new("api-1"), "r", "main", ws_path);
    store.add_workspace(workspace.clone()).unwrap();

    (dir, mux, store, manager, workspace)
}

#[test]
fn agent_command_quotes_the_prompt() {
    let cmd = build_agent_command("claude", &[], "fix the $HOME bug; rm -rf /");
    assert_eq!(cmd, "claude 'fix the $HOME bug; rm -rf /'");
}

#[test]
fn agent_command_prefixes_env_overrides() {
    let env = vec![("ANTHROPIC_MODEL".to_string(), "opus".to_string())];
    let cmd = build_agent_command("claude", &env, "go");
    assert_eq!(cmd, "ANTHROPIC_MODEL='opus' claude 'go'");
}

#[test]
fn agent_command_omits_empty_prompt() {
    assert_eq!(build_agent_command("codex", &[], ""), "codex");
}

#[tokio::test]
async fn spawn_creates_session_with_log_pipe_and_pid() {
    let (dir, mux, store, manager, workspace) = fixture();

    let session = manager
        .spawn(&workspace, "claude", "do the thing", Some("alpha"))
        .await
        .unwrap();

    assert!(session.id.as_str().starts_with("api-1-"));
    assert_eq!(session.multiplex_name, "alpha");
    assert_ne!(session.pid, 0);
    assert_eq!(session.target, "claude");

    // The mux session runs the quoted command in the workspace dir
    let created = mux.get_session("alpha").unwrap();
    assert_eq!(created.cwd, workspace.path);
    assert_eq!(created.command, "claude 'do the thing'");
    assert_eq!(created.size, Some((200, 50)));
    assert!(created.pipe_to.is_some());

    // Log file exists and is the id-derived path
    assert!(dir.path().join("logs").join(format!("{}.log", session.id)).exists());
    assert!(store.get_session(&session.id).is_some());
}

#[tokio::test]
async fn spawn_without_nickname_uses_session_id_as_mux_name() {
    let (_dir, mux, _store, manager, workspace) = fixture();

    let session = manager.spawn(&workspace, "codex", "", None).await.unwrap();
    assert_eq!(session.multiplex_name, session.id.to_string());
    assert!(mux.get_session(session.id.as_str()).is_some());
}

#[tokio::test]
async fn spawn_sanitizes_the_nickname() {
    let (_dir, mux, _store, manager, workspace) = fixture();

    let session = manager
        .spawn(&workspace, "claude", "", Some("fix:v1.2"))
        .await
        .unwrap();
    assert_eq!(session.multiplex_name, "fix-v1-2");
    assert!(mux.get_session("fix-v1-2").is_some());
}

#[tokio::test]
async fn spawn_rejects_unknown_target() {
    let (_dir, _mux, store, manager, workspace) = fixture();
    let err = manager.spawn(&workspace, "emacs", "", None).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(store.list_sessions().is_empty());
}

#[tokio::test]
async fn spawn_rejects_prompt_for_non_promptable_target() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let mux = FakeMux::new();
    let store = StateStore::open_in(dir.path()).unwrap();
    let config = Arc::new(Config {
        targets: vec![TargetDef {
            name: "watcher".to_string(),
            command: "watch-agent".to_string(),
            env: Default::default(),
            promptable: false,
        }],
        ..Config::default()
    });
    let manager = SessionManager::new(mux, store.clone(), config, paths);
    let ws_path = dir.path().join("ws");
    std::fs::create_dir_all(&ws_path).unwrap();
    let workspace = Workspace::new(WorkspaceId::new("w-1"), "r", "main", ws_path);

    let err = manager
        .spawn(&workspace, "watcher", "a prompt", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SpawnFailed(_)));

    // No prompt is fine
    manager.spawn(&workspace, "watcher", "", None).await.unwrap();
}

#[tokio::test]
async fn name_collision_retries_with_suffix() {
    let (_dir, mux, _store, manager, workspace) = fixture();

    // Occupy the nickname externally
    mux.add_session("alpha");
    let session = manager
        .spawn(&workspace, "claude", "", Some("alpha"))
        .await
        .unwrap();
    assert_eq!(session.multiplex_name, "alpha-2");
}

#[tokio::test]
async fn exhausted_name_retries_fail_with_conflict() {
    let (_dir, mux, store, manager, workspace) = fixture();

    for name in ["alpha", "alpha-2", "alpha-3", "alpha-4"] {
        mux.add_session(name);
    }
    let err = manager
        .spawn(&workspace, "claude", "", Some("alpha"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NameConflict(_)));
    assert!(store.list_sessions().is_empty());
}

#[tokio::test]
async fn failed_spawn_is_rolled_back() {
    let (dir, mux, store, manager, workspace) = fixture();

    // resize_window fails when the session vanished mid-spawn; emulate by
    // killing right after create via a failing create on the next attempt
    mux.fail_next_create();
    let err = manager.spawn(&workspace, "claude", "", Some("boom")).await.unwrap_err();
    assert!(matches!(err, EngineError::SpawnFailed(_)));
    assert!(store.list_sessions().is_empty());
    assert!(!mux.session_names().contains(&"boom".to_string()));
    // No orphaned log remains
    let logs: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
        .map(|entries| entries.flatten().collect())
        .unwrap_or_default();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn dispose_kills_session_and_removes_log() {
    let (dir, mux, store, manager, workspace) = fixture();
    let session = manager.spawn(&workspace, "claude", "", Some("alpha")).await.unwrap();
    let log_path = dir.path().join("logs").join(format!("{}.log", session.id));
    assert!(log_path.exists());

    manager.dispose(&session.id).await.unwrap();

    assert!(!mux.session_names().contains(&"alpha".to_string()));
    assert!(!log_path.exists());
    assert!(store.get_session(&session.id).is_none());
    assert!(!manager.is_running(&session.id).await);

    // Idempotent
    manager.dispose(&session.id).await.unwrap();
}

#[tokio::test]
async fn rename_moves_the_mux_session() {
    let (_dir, mux, store, manager, workspace) = fixture();
    let session = manager.spawn(&workspace, "claude", "", Some("alpha")).await.unwrap();

    manager.rename(&session.id, "beta.v2").await.unwrap();

    let renamed = store.get_session(&session.id).unwrap();
    assert_eq!(renamed.nickname, "beta.v2");
    assert_eq!(renamed.multiplex_name, "beta-v2");
    assert!(mux.get_session("beta-v2").is_some());
    assert!(mux.get_session("alpha").is_none());
}

#[tokio::test]
async fn rename_conflict_changes_nothing() {
    let (_dir, mux, store, manager, workspace) = fixture();
    let a = manager.spawn(&workspace, "claude", "", Some("x")).await.unwrap();
    let b = manager.spawn(&workspace, "claude", "", Some("y")).await.unwrap();

    let err = manager.rename(&b.id, "x").await.unwrap_err();
    assert!(matches!(err, EngineError::NameConflict(_)));

    // Both sessions unchanged in mux and state
    assert!(mux.get_session("x").is_some());
    assert!(mux.get_session("y").is_some());
    assert_eq!(store.get_session(&a.id).unwrap().multiplex_name, "x");
    assert_eq!(store.get_session(&b.id).unwrap().multiplex_name, "y");
}

#[tokio::test]
async fn is_running_falls_back_to_mux_when_pid_unknown() {
    let (_dir, mux, store, manager, workspace) = fixture();
    let session = manager.spawn(&workspace, "claude", "", Some("alive")).await.unwrap();

    // Fake pids are not real processes: zero the pid to force the fallback
    let mut record = store.get_session(&session.id).unwrap();
    record.pid = 0;
    store.update_session(record).unwrap();
    assert!(manager.is_running(&session.id).await);

    mux.kill_session("alive").await.unwrap();
    assert!(!manager.is_running(&session.id).await);
}

#[tokio::test]
async fn bootstrap_marks_dead_sessions_and_reseeds_live_logs() {
    let (dir, mux, store, manager, workspace) = fixture();

    let live = manager.spawn(&workspace, "claude", "", Some("live")).await.unwrap();
    let dead = manager.spawn(&workspace, "claude", "", Some("dead")).await.unwrap();

    // Simulate a daemon restart: the dead session's window is gone, the
    // live one lost its pipe and log
    let _ = mux.kill_session("dead").await;
    mux.stop_pipe_pane("live").await.unwrap();
    std::fs::remove_file(dir.path().join("logs").join(format!("{}.log", live.id))).unwrap();
    mux.set_screen("live", "scrollback line 1\nscrollback line 2");

    manager.bootstrap().await;

    // Dead session retained for inspection, pid cleared
    let dead_record = store.get_session(&dead.id).unwrap();
    assert_eq!(dead_record.pid, 0);

    // Live session: log reseeded from capture, pipe restored
    let log = std::fs::read_to_string(dir.path().join("logs").join(format!("{}.log", live.id))).unwrap();
    assert!(log.starts_with("scrollback line 1\nscrollback line 2"));
    assert!(mux.is_pipe_pane_active("live").await.unwrap());
    assert_ne!(store.get_session(&live.id).unwrap().pid, 0);
}

#[tokio::test]
async fn prune_logs_removes_orphans_only() {
    let (dir, _mux, _store, manager, workspace) = fixture();
    let session = manager.spawn(&workspace, "claude", "", None).await.unwrap();

    let logs_dir = dir.path().join("logs");
    std::fs::write(logs_dir.join("ghost-12345678.log"), "stale").unwrap();
    std::fs::write(logs_dir.join("notes.txt"), "keep").unwrap();

    manager.prune_logs();

    assert!(logs_dir.join(format!("{}.log", session.id)).exists());
    assert!(!logs_dir.join("ghost-12345678.log").exists());
    assert!(logs_dir.join("notes.txt").exists());
}
