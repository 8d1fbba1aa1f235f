// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn layout_is_fixed_under_state_dir() {
    let paths = StatePaths::new("/state/corral");
    assert_eq!(paths.pid_path, PathBuf::from("/state/corral/daemon.pid"));
    assert_eq!(paths.started_path, PathBuf::from("/state/corral/daemon.started"));
    assert_eq!(paths.state_path, PathBuf::from("/state/corral/state.json"));
    assert_eq!(paths.config_path, PathBuf::from("/state/corral/config.json"));
}

#[test]
fn session_log_is_a_pure_function_of_the_id() {
    let paths = StatePaths::new("/s");
    assert_eq!(
        paths.session_log("api-1-deadbeef"),
        PathBuf::from("/s/logs/api-1-deadbeef.log")
    );
    // Same id, same path
    assert_eq!(paths.session_log("api-1-deadbeef"), paths.session_log("api-1-deadbeef"));
}

#[test]
fn schema_file_is_label_addressed() {
    let paths = StatePaths::new("/s");
    assert_eq!(
        paths.schema_file("agent_state"),
        PathBuf::from("/s/schemas/agent_state.json")
    );
}
