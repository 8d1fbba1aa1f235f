// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY attachment for session trackers.
//!
//! Spawns a command (a `tmux attach-session`) under a fresh PTY and reads
//! its output on a dedicated thread, forwarding fixed-size chunks into a
//! tokio channel. The channel closing signals EOF or a read error; the
//! owner then reaps the child.

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use thiserror::Error;
use tokio::sync::mpsc;

/// One raw read from the PTY. Preserves read order.
pub type PtyChunk = Vec<u8>;

/// Read buffer size; each non-empty read yields one chunk.
const READ_BUF_SIZE: usize = 8 * 1024;

/// Capacity of the chunk channel between the reader thread and the tracker.
const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Errors from PTY operations
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to open pty: {0}")]
    Open(String),
    #[error("failed to spawn attach command: {0}")]
    Spawn(String),
    #[error("pty write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error("invalid pty size {cols}x{rows}")]
    InvalidSize { cols: i32, rows: i32 },
}

/// A live PTY attachment.
pub struct PtyAttach {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
}

impl PtyAttach {
    /// Spawn `argv` under a new PTY of the given size.
    ///
    /// Returns the attachment plus the chunk receiver fed by the reader
    /// thread. The receiver ends when the PTY reaches EOF or errors.
    pub fn spawn(
        argv: &[String],
        cols: u16,
        rows: u16,
    ) -> Result<(Self, mpsc::Receiver<PtyChunk>), PtyError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PtyError::Spawn("empty attach command".to_string()))?;

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let mut builder = CommandBuilder::new(program);
        for arg in args {
            builder.arg(arg);
        }

        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        std::thread::spawn(move || read_loop(reader, tx));

        Ok((
            Self {
                master: pair.master,
                writer,
                child,
            },
            rx,
        ))
    }

    /// Write input bytes to the PTY.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Resize the PTY window.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        if cols == 0 || rows == 0 {
            return Err(PtyError::InvalidSize {
                cols: cols as i32,
                rows: rows as i32,
            });
        }
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Open(e.to_string()))?;
        Ok(())
    }

    /// Kill the attach process and reap it. Closing the master unblocks the
    /// reader thread with EOF.
    pub fn close(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        // master and writer drop here, ending the reader thread
    }
}

fn read_loop(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<PtyChunk>) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    // Receiver gone; tracker is shutting down
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

#[cfg(test)]
#[path = "pty_tests.rs"]
mod tests;
