// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned zstd-compressed snapshot of materialized state.

use crate::state::MaterializedState;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub state: MaterializedState,
}

impl Snapshot {
    pub fn new(state: MaterializedState) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, state }
    }

    /// Write atomically: temp file in the same directory, then rename.
    pub fn write(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| StoreError::Io(format!("encode snapshot: {e}")))?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)
            .map_err(|e| StoreError::Io(format!("compress snapshot: {e}")))?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &compressed)
            .map_err(|e| StoreError::Io(format!("write snapshot {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| StoreError::Io(format!("rename snapshot {}: {e}", path.display())))
    }

    /// Load a snapshot; absent file yields empty state.
    pub fn load(path: &Path) -> Result<MaterializedState, StoreError> {
        let compressed = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MaterializedState::default());
            }
            Err(e) => return Err(StoreError::Io(format!("read snapshot {}: {e}", path.display()))),
        };
        let json = zstd::decode_all(compressed.as_slice())
            .map_err(|e| StoreError::Io(format!("decompress snapshot {}: {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_slice(&json)
            .map_err(|e| StoreError::Io(format!("decode snapshot {}: {e}", path.display())))?;
        if snapshot.version != CURRENT_SNAPSHOT_VERSION {
            return Err(StoreError::Io(format!(
                "unsupported snapshot version {} in {}",
                snapshot.version,
                path.display()
            )));
        }
        Ok(snapshot.state)
    }
}
