// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup and shutdown plumbing: single-instance lock and orphan
//! reconciliation.

use foundry_core::{Clock, ConfigError, JobStatus};
use foundry_storage::{JobStore, StoreError};
use fs2::FileExt;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot determine state directory (set FOUNDRY_STATE_DIR or HOME)")]
    NoStateDir,
    #[error("another foundryd owns {0}")]
    AlreadyRunning(String),
    #[error("i/o error: {0}")]
    Io(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Exclusive daemon lock; held for the process lifetime.
pub struct DaemonLock {
    _file: std::fs::File,
}

/// Take the single-instance lock inside the state directory.
pub fn acquire_lock(state_dir: &Path) -> Result<DaemonLock, LifecycleError> {
    let path = state_dir.join("foundryd.lock");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|e| LifecycleError::Io(format!("open {}: {e}", path.display())))?;
    file.try_lock_exclusive()
        .map_err(|_| LifecycleError::AlreadyRunning(path.display().to_string()))?;
    Ok(DaemonLock { _file: file })
}

/// Fail jobs that were mid-execution when the previous process died.
///
/// Only pending/building/checking jobs are orphaned: an awaiting-approval
/// job finished its pipeline and can still be decided after a restart.
/// Returns the number of jobs failed.
pub fn reconcile_orphans(store: &JobStore, clock: &impl Clock) -> usize {
    let mut failed = 0;
    for job in store.non_terminal_jobs() {
        if !matches!(job.status, JobStatus::Pending | JobStatus::Building | JobStatus::Checking) {
            continue;
        }
        match store.update_status(
            &job.id,
            JobStatus::Failed,
            Some("orphaned by restart".to_string()),
            clock.epoch_ms(),
        ) {
            Ok(_) => {
                info!(job_id = %job.id, was = %job.status, "orphaned job failed at startup");
                failed += 1;
            }
            Err(e) => warn!(job_id = %job.id, error = %e, "orphan reconcile failed"),
        }
    }
    failed
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
