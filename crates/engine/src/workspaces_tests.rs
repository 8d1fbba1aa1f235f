// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use corral_adapters::{DirtyStats, FakeVcs};
use corral_storage::StateStore;
use yare::parameterized;

#[parameterized(
    ssh = { "git@github.com:me/My.Repo.git", "my-repo" },
    https = { "https://github.com/me/api.git", "api" },
    trailing_slash = { "https://github.com/me/api/", "api" },
    local_path = { "/home/me/projects/tool", "tool" },
    plain_name = { "api", "api" },
)]
fn short_names_are_filesystem_safe(url: &str, expected: &str) {
    assert_eq!(repo_short_name(url), expected);
}

fn fixture() -> (tempfile::TempDir, FakeVcs, StateStore, WorkspaceManager<FakeVcs>) {
    let dir = tempfile::tempdir().unwrap();
    let vcs = FakeVcs::new();
    let store = StateStore::open_in(dir.path()).unwrap();
    let manager = WorkspaceManager::new(
        vcs.clone(),
        store.clone(),
        Arc::new(corral_config::Config::default()),
        dir.path().join("workspaces"),
        CancellationToken::new(),
    );
    (dir, vcs, store, manager)
}

#[tokio::test]
async fn first_workspace_for_a_repo_is_a_clone() {
    let (_dir, vcs, _store, manager) = fixture();

    let ws = manager.get_or_create("git@host:me/api.git", "main").await.unwrap();
    assert_eq!(ws.id, "api-1");
    assert_eq!(ws.branch, "main");
    assert!(ws.path.exists());

    let ops = vcs.ops_for(&ws.path);
    assert!(ops.contains(&"clone".to_string()));
    assert!(ops.contains(&"fetch".to_string()));
    assert!(ops.contains(&"clean_untracked".to_string()));
    assert!(!ops.contains(&"worktree_add".to_string()));
}

#[tokio::test]
async fn same_pair_reuses_the_workspace() {
    let (_dir, vcs, store, manager) = fixture();

    let first = manager.get_or_create("r", "main").await.unwrap();
    let second = manager.get_or_create("r", "main").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(store.list_workspaces().len(), 1);
    // Only one clone ran
    assert_eq!(vcs.ops().iter().filter(|op| *op == "clone").count(), 1);
}

#[tokio::test]
async fn concurrent_creates_for_same_pair_produce_one_workspace() {
    let (_dir, _vcs, store, manager) = fixture();

    let (a, b) = tokio::join!(
        manager.get_or_create("r", "main"),
        manager.get_or_create("r", "main"),
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(store.list_workspaces().len(), 1);
}

#[tokio::test]
async fn second_branch_of_same_repo_prefers_a_worktree() {
    let (_dir, vcs, _store, manager) = fixture();

    manager.get_or_create("r", "main").await.unwrap();
    let dev = manager.get_or_create("r", "dev").await.unwrap();

    assert_eq!(dev.id, "r-2");
    assert!(vcs.ops_for(&dev.path).contains(&"worktree_add".to_string()));
}

#[tokio::test]
async fn busy_branch_falls_back_to_clone() {
    let (_dir, vcs, _store, manager) = fixture();

    manager.get_or_create("r", "main").await.unwrap();
    vcs.set_branch_busy("dev");
    let dev = manager.get_or_create("r", "dev").await.unwrap();

    let ops = vcs.ops_for(&dev.path);
    assert!(ops.contains(&"clone".to_string()));
    assert!(!ops.contains(&"worktree_add".to_string()));
}

#[tokio::test]
async fn clone_timeout_aborts_without_partial_state() {
    let (_dir, vcs, store, manager) = fixture();
    vcs.set_clone_times_out(true);

    let err = manager.get_or_create("r", "main").await.unwrap_err();
    assert!(matches!(err, EngineError::VcsTimeout(_)));
    assert!(store.list_workspaces().is_empty());

    // Recovery: a later attempt succeeds with the same id
    vcs.set_clone_times_out(false);
    let ws = manager.get_or_create("r", "main").await.unwrap();
    assert_eq!(ws.id, "r-1");
}

#[tokio::test]
async fn dispose_refuses_while_sessions_remain() {
    let (_dir, _vcs, store, manager) = fixture();
    let ws = manager.get_or_create("r", "main").await.unwrap();

    let now = chrono::Utc::now();
    store.add_session(corral_core::Session {
        id: corral_core::SessionId::new("r-1-cafe0000"),
        workspace_id: ws.id.clone(),
        target: "claude".to_string(),
        prompt: String::new(),
        nickname: String::new(),
        multiplex_name: "r-1-cafe0000".to_string(),
        pid: 0,
        created_at: now,
        last_output_at: now,
        classification: String::new(),
    });

    let err = manager.dispose(&ws.id).await.unwrap_err();
    assert!(matches!(err, EngineError::WorkspaceHasSessions(_)));

    store.remove_session(&corral_core::SessionId::new("r-1-cafe0000"));
    manager.dispose(&ws.id).await.unwrap();
    assert!(!ws.path.exists());
    assert!(store.get_workspace(&ws.id).is_none());
}

#[tokio::test]
async fn git_status_sweep_updates_all_workspaces() {
    let (_dir, vcs, store, manager) = fixture();
    let ws = manager.get_or_create("r", "main").await.unwrap();

    vcs.set_ahead_behind(&ws.path, 2, 1);
    vcs.set_dirty(
        &ws.path,
        DirtyStats {
            lines_added: 10,
            lines_removed: 3,
            files_changed: 4,
        },
    );

    manager.update_all_git_status().await;

    let status = store.get_workspace(&ws.id).unwrap().git_status;
    assert_eq!(status.ahead, 2);
    assert_eq!(status.behind, 1);
    assert_eq!(status.lines_added, 10);
    assert_eq!(status.files_changed, 4);
    assert!(status.last_sampled_at.is_some());
}

#[tokio::test]
async fn failing_workspace_keeps_previous_status() {
    let (_dir, vcs, store, manager) = fixture();
    let ws = manager.get_or_create("r", "main").await.unwrap();

    vcs.set_ahead_behind(&ws.path, 5, 0);
    manager.update_all_git_status().await;
    assert_eq!(store.get_workspace(&ws.id).unwrap().git_status.ahead, 5);

    // Sampling now fails; the previous status sticks
    vcs.set_failing(&ws.path);
    vcs.set_ahead_behind(&ws.path, 9, 9);
    manager.update_all_git_status().await;
    assert_eq!(store.get_workspace(&ws.id).unwrap().git_status.ahead, 5);
}

#[tokio::test]
async fn scan_adopts_unknown_checkouts_and_drops_missing_records() {
    let (dir, vcs, store, manager) = fixture();
    manager.ensure_root().unwrap();
    let root = dir.path().join("workspaces");

    // An on-disk checkout corral does not know about
    let stray = root.join("stray-1");
    std::fs::create_dir_all(stray.join(".git")).unwrap();
    vcs.describe_checkout(&stray, "git@host:me/stray.git", "main");

    // A record whose directory is gone
    let ws = manager.get_or_create("r", "main").await.unwrap();
    std::fs::remove_dir_all(&ws.path).unwrap();

    manager.scan().await;

    assert!(store.get_workspace(&corral_core::WorkspaceId::new("stray-1")).is_some());
    assert!(store.get_workspace(&ws.id).is_none());
}
