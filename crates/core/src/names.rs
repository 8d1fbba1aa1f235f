// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name sanitization and shell quoting.

/// Sanitize a caller-supplied name for use as a multiplexer session name.
///
/// tmux treats `.` and `:` as window/pane separators in targets, so both are
/// replaced with `-` before the name reaches the adapter.
pub fn sanitize_mux_name(name: &str) -> String {
    name.replace(['.', ':'], "-")
}

/// Quote a string for safe embedding in a POSIX shell command line.
///
/// The prompt is the only caller-controlled token in a spawn command; it is
/// wrapped in single quotes with embedded single quotes rewritten as `'\''`,
/// so no interpolation happens inside it.
pub fn shell_single_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;
