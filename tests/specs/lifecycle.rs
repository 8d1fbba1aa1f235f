// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn / rename / dispose scenarios.

use super::common::Harness;
use corral_core::sanitize_mux_name;

#[tokio::test]
async fn spawn_attach_dispose_happy_path() {
    let h = Harness::new();
    h.mux.set_attach_argv(&["sh", "-c", "echo agent-output; sleep 5"]);

    let id = h
        .orchestrator
        .spawn("api", "main", "claude", "", Some("alpha"), None)
        .await
        .unwrap();

    // Exactly one workspace on main; the mux session carries the nickname
    let snapshot = h.orchestrator.list();
    assert_eq!(snapshot.workspaces.len(), 1);
    assert_eq!(snapshot.workspaces[0].branch, "main");
    assert!(h.mux.get_session("alpha").is_some());

    // Output arrives within the attach budget
    let (mut rx, token) = h.orchestrator.attach_output(&id).unwrap();
    let mut seen = Vec::new();
    while let Ok(Some(chunk)) =
        tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv()).await
    {
        seen.extend_from_slice(&chunk);
        if !seen.is_empty() {
            break;
        }
    }
    assert!(!seen.is_empty(), "no output within 2s of attach");
    h.orchestrator.detach_output(&id, token);

    // Dispose: gone from state, mux, and liveness
    h.orchestrator.dispose(&id).await.unwrap();
    assert!(h.orchestrator.list().sessions.is_empty());
    assert!(h.mux.get_session("alpha").is_none());
    assert!(!h.orchestrator.is_running(&id).await);
    assert!(!h.paths.session_log(id.as_str()).exists());
}

#[tokio::test]
async fn branch_fan_out_shares_one_workspace_per_pair() {
    let h = Harness::new();

    let one = h
        .orchestrator
        .spawn("api", "main", "claude", "", Some("one"), None)
        .await
        .unwrap();
    let two = h
        .orchestrator
        .spawn("api", "main", "claude", "", Some("two"), None)
        .await
        .unwrap();

    // (repo, branch) is unique across live workspaces: both sessions land
    // in the same workspace
    let snapshot = h.orchestrator.list();
    assert_eq!(snapshot.workspaces.len(), 1);
    let store = h.orchestrator.store();
    assert_eq!(
        store.get_session(&one).unwrap().workspace_id,
        store.get_session(&two).unwrap().workspace_id
    );

    // A different branch gets its own workspace, provisioned as a worktree
    let three = h
        .orchestrator
        .spawn("api", "dev", "claude", "", Some("three"), None)
        .await
        .unwrap();
    let snapshot = h.orchestrator.list();
    assert_eq!(snapshot.workspaces.len(), 2);
    let dev_ws = store.get_session(&three).unwrap().workspace_id;
    assert_ne!(dev_ws, store.get_session(&one).unwrap().workspace_id);
    let dev_path = store.get_workspace(&dev_ws).unwrap().path;
    assert!(h.vcs.ops_for(&dev_path).contains(&"worktree_add".to_string()));
}

#[tokio::test]
async fn rename_conflict_leaves_the_world_unchanged() {
    let h = Harness::new();
    let _a = h
        .orchestrator
        .spawn("api", "main", "claude", "", Some("X"), None)
        .await
        .unwrap();
    let b = h
        .orchestrator
        .spawn("api", "main", "claude", "", Some("Y"), None)
        .await
        .unwrap();

    let before = h.mux.session_names();
    let err = h.orchestrator.rename(&b, "X").await.unwrap_err();
    assert!(matches!(err, corral_engine::EngineError::NameConflict(_)));

    // No mux session appeared or disappeared; state unchanged
    assert_eq!(h.mux.session_names(), before);
    assert_eq!(h.orchestrator.store().get_session(&b).unwrap().nickname, "Y");
}

#[tokio::test]
async fn persisted_snapshot_upholds_invariants() {
    let h = Harness::new();
    h.orchestrator
        .spawn("api", "main", "claude", "", Some("with.dots:and:colons"), None)
        .await
        .unwrap();
    h.orchestrator
        .spawn("api", "dev", "codex", "", None, None)
        .await
        .unwrap();

    let state: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&h.paths.state_path).unwrap()).unwrap();

    // Every session references an existing workspace
    let workspace_ids: Vec<&str> = state["workspaces"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["id"].as_str().unwrap())
        .collect();
    for session in state["sessions"].as_array().unwrap() {
        assert!(workspace_ids.contains(&session["workspace_id"].as_str().unwrap()));
    }

    // (repo, branch) unique across workspaces
    let mut pairs: Vec<(String, String)> = state["workspaces"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| {
            (
                w["repo"].as_str().unwrap().to_string(),
                w["branch"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    pairs.sort();
    let total = pairs.len();
    pairs.dedup();
    assert_eq!(pairs.len(), total);

    // multiplex_name is the sanitized nickname (or the id)
    for session in state["sessions"].as_array().unwrap() {
        let nickname = session["nickname"].as_str().unwrap();
        let expected = if nickname.is_empty() {
            session["id"].as_str().unwrap().to_string()
        } else {
            sanitize_mux_name(nickname)
        };
        assert_eq!(session["multiplex_name"].as_str().unwrap(), expected);
    }
}
