// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;

/// Sink lifecycle. Opening is asynchronous, so writes submitted before the
/// file is ready are dropped along with their state report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    NotOpen,
    Opening,
    IsOpen,
}

enum LogRecord {
    Write(Bytes),
    /// Final record before the file is flushed and closed.
    Rotate(Bytes),
}

/// Append-only, binary-transparent file log. Writes are handed to a writer
/// task and performed asynchronously; a write error drops the sink back to
/// `NotOpen` and closes the file.
pub struct FileLog {
    state: Arc<Mutex<LogState>>,
    tx: Mutex<Option<mpsc::UnboundedSender<LogRecord>>>,
}

impl Default for FileLog {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLog {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LogState::NotOpen)),
            tx: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LogState {
        *self.state.lock().expect("log state lock poisoned")
    }

    fn set_state(state: &Arc<Mutex<LogState>>, new: LogState) {
        *state.lock().expect("log state lock poisoned") = new;
    }

    /// Starts opening the log file. No-op unless the sink is `NotOpen`.
    pub fn open(&self, path: impl Into<PathBuf>) {
        {
            let mut state = self.state.lock().expect("log state lock poisoned");
            if *state != LogState::NotOpen {
                return;
            }
            *state = LogState::Opening;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock().expect("log sender lock poisoned") = Some(tx);
        let state = Arc::clone(&self.state);
        let path = path.into();
        tokio::spawn(writer_task(path, rx, state));
    }

    /// Submits `bytes` for an asynchronous append and reports the sink
    /// state at submission time. Records sent while not `IsOpen` are lost.
    pub fn write(&self, bytes: &[u8]) -> LogState {
        self.submit(bytes, false)
    }

    /// Like `write`, but the record is the file's last: after it lands the
    /// file is flushed and closed and the sink returns to `NotOpen`.
    pub fn rotate(&self, bytes: &[u8]) -> LogState {
        self.submit(bytes, true)
    }

    fn submit(&self, bytes: &[u8], rotate: bool) -> LogState {
        let current = self.state();
        if current != LogState::IsOpen || bytes.is_empty() {
            return current;
        }
        let record = if rotate {
            Self::set_state(&self.state, LogState::NotOpen);
            LogRecord::Rotate(Bytes::copy_from_slice(bytes))
        } else {
            LogRecord::Write(Bytes::copy_from_slice(bytes))
        };
        if let Some(tx) = &*self.tx.lock().expect("log sender lock poisoned") {
            let _ = tx.send(record);
        }
        self.state()
    }
}

async fn writer_task(
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<LogRecord>,
    state: Arc<Mutex<LogState>>,
) {
    let mut file = match File::create(&path).await {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), "failed to open log file: {e}");
            FileLog::set_state(&state, LogState::NotOpen);
            return;
        }
    };
    FileLog::set_state(&state, LogState::IsOpen);

    while let Some(record) = rx.recv().await {
        match record {
            LogRecord::Write(bytes) => {
                if let Err(e) = file.write_all(&bytes).await {
                    warn!(path = %path.display(), "log write failed: {e}");
                    FileLog::set_state(&state, LogState::NotOpen);
                    break;
                }
            }
            LogRecord::Rotate(bytes) => {
                if let Err(e) = file.write_all(&bytes).await {
                    warn!(path = %path.display(), "final log write failed: {e}");
                } else {
                    let _ = file.flush().await;
                }
                break;
            }
        }
    }
    // File handle drops here, closing it.
}
