// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job store facade: validated mutations over WAL + materialized state.

use crate::event::StoreEvent;
use crate::snapshot::Snapshot;
use crate::state::MaterializedState;
use crate::wal::Wal;
use foundry_core::{ApprovalRecord, AuditReport, Job, JobId, JobStatus, SandboxId, SandboxRole, TelemetrySample, WorkspaceId};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const WAL_FILE: &str = "store.wal";
const SNAPSHOT_FILE: &str = "store.snapshot";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o: {0}")]
    Io(String),
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("job already exists: {0}")]
    Duplicate(String),
    #[error("invalid status transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

struct Inner {
    state: MaterializedState,
    wal: Wal,
    snapshot_path: PathBuf,
}

/// Durable keyed collection of jobs plus append-only telemetry, audit, and
/// approval logs.
///
/// Every mutation is one atomic step under a single lock: validate against
/// materialized state, append the event to the WAL, apply it. Status
/// updates are therefore atomic against concurrent readers.
pub struct JobStore {
    inner: Mutex<Inner>,
}

impl JobStore {
    /// Load snapshot + WAL tail from `dir`, creating it if needed.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| StoreError::Io(format!("create {}: {e}", dir.display())))?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let wal_path = dir.join(WAL_FILE);

        let mut state = Snapshot::load(&snapshot_path)?;
        let replayed = Wal::replay(&wal_path)?;
        for event in &replayed {
            state.apply_event(event);
        }
        debug!(dir = %dir.display(), jobs = state.jobs.len(), replayed = replayed.len(), "job store opened");

        Ok(Self {
            inner: Mutex::new(Inner { state, wal: Wal::open(&wal_path)?, snapshot_path }),
        })
    }

    fn commit(inner: &mut Inner, event: StoreEvent) -> Result<(), StoreError> {
        inner.wal.append(&event)?;
        inner.state.apply_event(&event);
        Ok(())
    }

    /// Persist a freshly submitted job.
    pub fn create_job(&self, job: Job) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.jobs.contains_key(job.id.as_str()) {
            return Err(StoreError::Duplicate(job.id.to_string()));
        }
        Self::commit(&mut inner, StoreEvent::JobCreated { job })
    }

    /// Validated status transition; terminal statuses are write-once and
    /// stamp `completed_at`.
    pub fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        error: Option<String>,
        at_ms: u64,
    ) -> Result<Job, StoreError> {
        let mut inner = self.inner.lock();
        let current = inner
            .state
            .job(job_id.as_str())
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?
            .status;
        if !current.can_transition(status) {
            return Err(StoreError::InvalidTransition { job_id: *job_id, from: current, to: status });
        }
        Self::commit(
            &mut inner,
            StoreEvent::StatusChanged { job_id: *job_id, status, error, at_ms },
        )?;
        // Just committed, so the job is present.
        inner
            .state
            .job(job_id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    pub fn record_sandbox(
        &self,
        job_id: &JobId,
        role: SandboxRole,
        sandbox_id: SandboxId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.job(job_id.as_str()).is_none() {
            return Err(StoreError::NotFound(job_id.to_string()));
        }
        Self::commit(&mut inner, StoreEvent::SandboxRecorded { job_id: *job_id, role, sandbox_id })
    }

    pub fn record_workspace(
        &self,
        job_id: &JobId,
        workspace_id: WorkspaceId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.job(job_id.as_str()).is_none() {
            return Err(StoreError::NotFound(job_id.to_string()));
        }
        Self::commit(&mut inner, StoreEvent::WorkspaceRecorded { job_id: *job_id, workspace_id })
    }

    pub fn append_telemetry(&self, sample: TelemetrySample) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.job(sample.job_id.as_str()).is_none() {
            return Err(StoreError::NotFound(sample.job_id.to_string()));
        }
        Self::commit(&mut inner, StoreEvent::TelemetryAppended { sample })
    }

    pub fn append_audit(&self, report: AuditReport) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.job(report.job_id.as_str()).is_none() {
            return Err(StoreError::NotFound(report.job_id.to_string()));
        }
        Self::commit(&mut inner, StoreEvent::AuditAppended { report })
    }

    pub fn record_approval(&self, approval: ApprovalRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.job(approval.job_id.as_str()).is_none() {
            return Err(StoreError::NotFound(approval.job_id.to_string()));
        }
        Self::commit(&mut inner, StoreEvent::ApprovalRecorded { approval })
    }

    // -- reads (snapshot-consistent single-row) --

    pub fn job(&self, job_id: &JobId) -> Option<Job> {
        self.inner.lock().state.job(job_id.as_str()).cloned()
    }

    /// Most recent first, optionally filtered by status.
    pub fn jobs_by_recency(&self, limit: usize, status: Option<JobStatus>) -> Vec<Job> {
        let inner = self.inner.lock();
        let mut jobs: Vec<Job> = inner
            .state
            .jobs
            .values()
            .filter(|job| status.is_none_or(|s| job.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.created_at_ms.cmp(&a.created_at_ms).then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        jobs.truncate(limit);
        jobs
    }

    pub fn non_terminal_jobs(&self) -> Vec<Job> {
        let inner = self.inner.lock();
        inner.state.jobs.values().filter(|job| !job.is_terminal()).cloned().collect()
    }

    pub fn telemetry(&self, job_id: &JobId) -> Vec<TelemetrySample> {
        self.inner.lock().state.telemetry.get(job_id.as_str()).cloned().unwrap_or_default()
    }

    pub fn latest_telemetry(&self, job_id: &JobId) -> Option<TelemetrySample> {
        self.inner.lock().state.telemetry.get(job_id.as_str()).and_then(|rows| rows.last().cloned())
    }

    pub fn latest_audit(&self, job_id: &JobId) -> Option<AuditReport> {
        self.inner.lock().state.audits.get(job_id.as_str()).and_then(|rows| rows.last().cloned())
    }

    pub fn approval(&self, job_id: &JobId) -> Option<ApprovalRecord> {
        self.inner.lock().state.approvals.get(job_id.as_str()).cloned()
    }

    /// Write a fresh snapshot and truncate the WAL.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let snapshot = Snapshot::new(inner.state.clone());
        snapshot.write(&inner.snapshot_path)?;
        inner.wal.reset()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
