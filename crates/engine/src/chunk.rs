// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Meaningful-chunk detection for terminal output.
//!
//! Terminals emit plenty of bytes that are not semantic output: focus
//! reports, color queries, cursor state toggles. Activity tracking only
//! cares about chunks that still contain a printable rune once control
//! sequences are stripped. The stripper is per-chunk; sequences split
//! across chunk boundaries may leak fragments, which is acceptable for an
//! activity heuristic.

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Escape prefixes terminals emit on focus or visibility changes.
/// Chunks starting with one of these are never meaningful.
const NOISE_PREFIXES: [&[u8]; 4] = [
    b"\x1b[?",    // private-mode set/reset (cursor, focus, bracketed paste)
    b"\x1b[>",    // device attribute queries
    b"\x1b]10;",  // OSC foreground color report
    b"\x1b]11;",  // OSC background color report
];

/// Whether a chunk counts as meaningful output for activity tracking.
pub fn is_meaningful_chunk(chunk: &[u8]) -> bool {
    if chunk.is_empty() {
        return false;
    }
    if NOISE_PREFIXES.iter().any(|p| chunk.starts_with(p)) {
        return false;
    }

    let stripped = strip_controls(chunk);
    String::from_utf8_lossy(&stripped)
        .chars()
        .any(|c| !c.is_whitespace() && !c.is_control())
}

/// Strip C0 control bytes (except `\n`, `\r`, `\t`) and CSI/OSC/DCS
/// escape sequences from a chunk.
pub fn strip_controls(chunk: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(chunk.len());
    let mut i = 0;
    while i < chunk.len() {
        let b = chunk[i];
        if b == ESC {
            i = skip_escape_sequence(chunk, i);
            continue;
        }
        if b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t' {
            i += 1;
            continue;
        }
        if b == 0x7f {
            i += 1;
            continue;
        }
        out.push(b);
        i += 1;
    }
    out
}

/// Skip one escape sequence starting at `start` (which points at ESC).
/// Returns the index of the first byte after the sequence.
fn skip_escape_sequence(chunk: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    let Some(&kind) = chunk.get(i) else {
        return chunk.len();
    };

    match kind {
        // CSI: parameters and intermediates, ended by a final byte 0x40..=0x7e
        b'[' => {
            i += 1;
            while i < chunk.len() {
                let b = chunk[i];
                i += 1;
                if (0x40..=0x7e).contains(&b) {
                    break;
                }
            }
            i
        }
        // OSC: ended by BEL or ST (ESC \)
        b']' => {
            i += 1;
            while i < chunk.len() {
                let b = chunk[i];
                if b == BEL {
                    return i + 1;
                }
                if b == ESC && chunk.get(i + 1) == Some(&b'\\') {
                    return i + 2;
                }
                i += 1;
            }
            i
        }
        // DCS / SOS / PM / APC: ended by ST (ESC \)
        b'P' | b'X' | b'^' | b'_' => {
            i += 1;
            while i < chunk.len() {
                if chunk[i] == ESC && chunk.get(i + 1) == Some(&b'\\') {
                    return i + 2;
                }
                i += 1;
            }
            i
        }
        // Two-byte escapes (charset selection, keypad modes, ...)
        _ => i + 1,
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;
