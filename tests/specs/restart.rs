// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon restart scenarios: surviving sessions, log seeding.

use super::common::Harness;
use corral_adapters::MuxAdapter;

#[tokio::test]
async fn restart_preserves_sessions_and_reseeds_deleted_logs() {
    let h = Harness::new();
    let id = h
        .orchestrator
        .spawn("api", "main", "claude", "", Some("survivor"), None)
        .await
        .unwrap();

    // The pane produced output, then the daemon went away and someone
    // deleted the log; the tmux session itself survives
    h.mux.set_screen("survivor", "earlier agent output\nstill on screen");
    std::fs::remove_file(h.paths.session_log(id.as_str())).unwrap();
    h.mux.stop_pipe_pane("survivor").await.unwrap();

    let h = h.restart();
    h.orchestrator.bootstrap().await.unwrap();

    // Session still listed, log reseeded from the pane's scrollback
    let session = h.orchestrator.store().get_session(&id).unwrap();
    assert_eq!(session.nickname, "survivor");
    let log = std::fs::read_to_string(h.paths.session_log(id.as_str())).unwrap();
    assert!(log.starts_with("earlier agent output\nstill on screen"));

    // The pipe is live again: new pane output reaches the log
    h.mux.emit_output("survivor", b"fresh output\n").unwrap();
    let log = std::fs::read_to_string(h.paths.session_log(id.as_str())).unwrap();
    assert!(log.contains("fresh output"));

    // And a consumer receives further output
    h.mux.set_attach_argv(&["sh", "-c", "echo post-restart; sleep 5"]);
    let (mut rx, _token) = h.orchestrator.attach_output(&id).unwrap();
    let mut seen = Vec::new();
    while let Ok(Some(chunk)) =
        tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv()).await
    {
        seen.extend_from_slice(&chunk);
        if String::from_utf8_lossy(&seen).contains("post-restart") {
            break;
        }
    }
    assert!(String::from_utf8_lossy(&seen).contains("post-restart"));
}

#[tokio::test]
async fn restart_marks_vanished_sessions_dead_but_keeps_them() {
    let h = Harness::new();
    let id = h
        .orchestrator
        .spawn("api", "main", "claude", "", Some("gone"), None)
        .await
        .unwrap();
    assert_ne!(h.orchestrator.store().get_session(&id).unwrap().pid, 0);

    // The tmux session dies while the daemon is down
    h.mux.kill_session("gone").await.unwrap();

    let h = h.restart();
    h.orchestrator.bootstrap().await.unwrap();

    // Retained for inspection, but no longer running
    let session = h.orchestrator.store().get_session(&id).unwrap();
    assert_eq!(session.pid, 0);
    assert!(!h.orchestrator.is_running(&id).await);
}

#[tokio::test]
async fn restart_adopts_stray_workspace_directories() {
    let h = Harness::new();
    h.orchestrator
        .spawn("api", "main", "claude", "", None, None)
        .await
        .unwrap();

    // A checkout created outside corral appears under the workspace root
    let stray = h.paths.state_dir.join("workspaces/manual-1");
    std::fs::create_dir_all(stray.join(".git")).unwrap();
    h.vcs.describe_checkout(&stray, "git@host:me/manual.git", "main");

    let h = h.restart();
    h.orchestrator.bootstrap().await.unwrap();

    let adopted = h
        .orchestrator
        .store()
        .get_workspace(&corral_core::WorkspaceId::new("manual-1"))
        .unwrap();
    assert_eq!(adopted.repo, "git@host:me/manual.git");
    assert_eq!(adopted.branch, "main");
}
