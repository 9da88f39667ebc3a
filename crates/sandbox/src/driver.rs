// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The driver trait and its wire types.

use async_trait::async_trait;
use foundry_core::{JobId, SandboxId, SandboxRole, WorkspaceId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("sandbox not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("workspace error: {0}")]
    Workspace(String),
    #[error("driver error: {0}")]
    Internal(String),
}

/// Lifecycle state of a sandbox as reported by the driver.
///
/// `Missing` means the sandbox was removed behind the driver's back and is
/// treated by the supervisor as a fatal error, distinct from `Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxStatus {
    Pending,
    Running,
    Paused,
    Exited,
    Dead,
    Missing,
}

foundry_core::simple_display! {
    SandboxStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Exited => "exited",
        Dead => "dead",
        Missing => "missing",
    }
}

/// Point-in-time resource usage of one sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SandboxStats {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

/// Everything the driver needs to start one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnSpec {
    pub role: SandboxRole,
    pub job_id: JobId,
    /// Task description handed to the agent verbatim.
    pub task: String,
    /// Workspace previously allocated for this job.
    pub workspace: WorkspaceId,
    /// Endpoint the agent posts callbacks to; opaque to the driver.
    pub callback: String,
    /// Builders get a writable workspace; checkers never do.
    pub write_access: bool,
}

impl SpawnSpec {
    pub fn new(role: SandboxRole, job_id: JobId, workspace: WorkspaceId) -> Self {
        Self {
            role,
            job_id,
            workspace,
            task: String::new(),
            callback: String::new(),
            write_access: role == SandboxRole::Builder,
        }
    }

    foundry_core::setters! {
        into {
            task: String,
            callback: String,
        }
        set {
            write_access: bool,
        }
    }
}

/// Abstract lifecycle of isolated workers and their workspaces.
///
/// Implementations own all resource-cap enforcement (cpu share, memory
/// ceiling, network policy, read-only mounts) and must off-load any
/// blocking client calls so the cooperative scheduler is never stalled.
#[async_trait]
pub trait SandboxDriver: Send + Sync + 'static {
    /// Create (or return) the per-job ephemeral workspace. Idempotent.
    async fn allocate_workspace(&self, job_id: &JobId) -> Result<WorkspaceId, DriverError>;

    /// Start an isolated worker with the workspace attached.
    async fn spawn(&self, spec: SpawnSpec) -> Result<SandboxId, DriverError>;

    /// Collect the exit code of a sandbox that has reached `Exited`/`Dead`.
    async fn wait(&self, id: &SandboxId) -> Result<i32, DriverError>;

    /// Point-in-time lifecycle state.
    async fn status(&self, id: &SandboxId) -> Result<SandboxStatus, DriverError>;

    /// Best-effort resource sample of a running sandbox.
    async fn sample(&self, id: &SandboxId) -> Result<SandboxStats, DriverError>;

    /// Freeze a running sandbox. Idempotent at the lifecycle level.
    async fn pause(&self, id: &SandboxId) -> Result<(), DriverError>;

    /// Unfreeze a paused sandbox. Idempotent at the lifecycle level.
    async fn resume(&self, id: &SandboxId) -> Result<(), DriverError>;

    /// Terminate within the grace window. A second stop is a no-op.
    async fn stop(&self, id: &SandboxId, grace: Duration) -> Result<(), DriverError>;

    /// All sandboxes currently `Running` (for the sentinel's pause sweep).
    async fn running(&self) -> Result<Vec<SandboxId>, DriverError>;

    /// Remove the workspace storage. Must succeed once all attached
    /// sandboxes are stopped; releasing an unknown workspace is a no-op.
    async fn release_workspace(&self, workspace: &WorkspaceId) -> Result<(), DriverError>;
}
