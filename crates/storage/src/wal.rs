// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL write-ahead log.

use crate::event::StoreEvent;
use crate::store::StoreError;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One event per line, flushed on every append.
pub struct Wal {
    path: PathBuf,
    file: File,
}

impl Wal {
    /// Open for appending, creating the file if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::Io(format!("open wal {}: {e}", path.display())))?;
        Ok(Self { path: path.to_path_buf(), file })
    }

    pub fn append(&mut self, event: &StoreEvent) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(event)
            .map_err(|e| StoreError::Io(format!("encode wal entry: {e}")))?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .and_then(|()| self.file.flush())
            .map_err(|e| StoreError::Io(format!("append wal {}: {e}", self.path.display())))
    }

    /// Replay every entry, stopping at the first undecodable line.
    ///
    /// A torn final line is normal after an unclean shutdown; anything after
    /// it is unreachable anyway, so replay stops there and the next
    /// checkpoint rewrites the log.
    pub fn replay(path: &Path) -> Result<Vec<StoreEvent>, StoreError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(format!("open wal {}: {e}", path.display()))),
        };

        let mut events = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StoreError::Io(format!("read wal {}: {e}", path.display())))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(path = %path.display(), line = line_no + 1, error = %e, "stopping wal replay at undecodable line");
                    break;
                }
            }
        }
        Ok(events)
    }

    /// Truncate after a successful checkpoint.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| StoreError::Io(format!("truncate wal {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
