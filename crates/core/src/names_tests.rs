// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "alpha", "alpha" },
    dots = { "v1.2.3", "v1-2-3" },
    colons = { "fix:login", "fix-login" },
    mixed = { "a.b:c", "a-b-c" },
    empty = { "", "" },
)]
fn sanitize_replaces_separators(input: &str, expected: &str) {
    assert_eq!(sanitize_mux_name(input), expected);
}

#[test]
fn quote_wraps_in_single_quotes() {
    assert_eq!(shell_single_quote("hello"), "'hello'");
}

#[test]
fn quote_escapes_embedded_single_quotes() {
    assert_eq!(shell_single_quote("don't"), "'don'\\''t'");
}

#[test]
fn quote_keeps_shell_metacharacters_inert() {
    let quoted = shell_single_quote("$(rm -rf ~); `id` && $HOME");
    assert_eq!(quoted, "'$(rm -rf ~); `id` && $HOME'");
}

#[test]
fn quote_empty_string() {
    assert_eq!(shell_single_quote(""), "''");
}
