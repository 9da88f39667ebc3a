// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use crate::lifecycle::LifecycleError;
use std::path::{Path, PathBuf};

/// Resolve state directory: FOUNDRY_STATE_DIR > XDG_STATE_HOME/foundry >
/// ~/.local/state/foundry
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FOUNDRY_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("foundry"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/foundry"))
}

/// Config file: FOUNDRY_CONFIG > <state_dir>/foundry.toml
pub fn config_path(state_dir: &Path) -> PathBuf {
    std::env::var("FOUNDRY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir.join("foundry.toml"))
}

/// Control socket lives inside the state directory.
pub fn socket_path(state_dir: &Path) -> PathBuf {
    state_dir.join("foundryd.sock")
}

/// Rolling log files live under <state_dir>/logs.
pub fn log_dir(state_dir: &Path) -> PathBuf {
    state_dir.join("logs")
}

/// Log filter: FOUNDRY_LOG, defaulting to info.
pub fn log_filter() -> String {
    std::env::var("FOUNDRY_LOG").unwrap_or_else(|_| "info".to_string())
}
