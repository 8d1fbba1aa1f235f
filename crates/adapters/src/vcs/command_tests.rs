// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

/// Check if git is available on this system
fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! fail_if_no_git {
    () => {
        if !git_available() {
            panic!("git is required but not available");
        }
    };
}

#[tokio::test]
async fn captures_trimmed_stdout() {
    fail_if_no_git!();
    let cancel = CancellationToken::new();
    let out = GitCommand::new(["--version"]).run(&cancel).await.unwrap();
    assert!(out.starts_with("git version"));
    assert!(!out.ends_with('\n'));
}

#[tokio::test]
async fn nonzero_exit_surfaces_stderr() {
    fail_if_no_git!();
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let err = GitCommand::new(["rev-parse", "HEAD"])
        .current_dir(dir.path())
        .run(&cancel)
        .await
        .unwrap_err();
    match err {
        VcsError::Failed { stderr } => assert!(!stderr.is_empty()),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_aborts_the_command() {
    fail_if_no_git!();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = GitCommand::new(["--version"]).run(&cancel).await.unwrap_err();
    // Already-cancelled token wins the select
    assert!(matches!(err, VcsError::Cancelled | VcsError::Timeout(_)));
}
