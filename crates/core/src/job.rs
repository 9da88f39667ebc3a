// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and status state machine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a job.
    ///
    /// Generated at submission; used to track status, telemetry, audits,
    /// and approvals across the job's whole lifecycle.
    pub struct JobId("job-");
}

crate::define_id! {
    /// Handle to a sandboxed worker managed by the sandbox driver.
    pub struct SandboxId("sbx-");
}

crate::define_id! {
    /// Handle to a per-job ephemeral workspace managed by the sandbox driver.
    pub struct WorkspaceId("wks-");
}

/// Which agent a sandbox runs.
///
/// The builder gets a writable workspace; the checker always gets the same
/// workspace read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxRole {
    Builder,
    Checker,
}

crate::simple_display! {
    SandboxRole {
        Builder => "builder",
        Checker => "checker",
    }
}

/// Job lifecycle status.
///
/// ```text
/// pending → building → checking → awaiting_approval → approved → completed
///               ↓          ↓             ↓
///             failed     failed       rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Building,
    Checking,
    AwaitingApproval,
    Approved,
    Rejected,
    Completed,
    Failed,
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Building => "building",
        Checking => "checking",
        AwaitingApproval => "awaiting_approval",
        Approved => "approved",
        Rejected => "rejected",
        Completed => "completed",
        Failed => "failed",
    }
}

impl JobStatus {
    /// Parse the snake_case form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "building" => Some(JobStatus::Building),
            "checking" => Some(JobStatus::Checking),
            "awaiting_approval" => Some(JobStatus::AwaitingApproval),
            "approved" => Some(JobStatus::Approved),
            "rejected" => Some(JobStatus::Rejected),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Rejected | JobStatus::Failed
        )
    }

    /// Whether `self → to` is a permitted edge of the state machine.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Building)
                | (Pending, Failed)
                | (Building, Checking)
                | (Building, Failed)
                | (Checking, AwaitingApproval)
                | (Checking, Failed)
                | (AwaitingApproval, Approved)
                | (AwaitingApproval, Rejected)
                | (Approved, Completed)
        )
    }
}

/// A submitted coding job.
///
/// Created at submission with status [`JobStatus::Pending`]; mutated only
/// through the store's status-update and sandbox-record operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Free-text task description handed to the agents.
    pub task: String,
    /// Opaque project location; the scheduler never interprets it.
    pub project_path: PathBuf,
    pub status: JobStatus,
    pub created_at_ms: u64,
    /// Set exactly once, together with the first terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_sandbox: Option<SandboxId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checker_sandbox: Option<SandboxId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(id: JobId, task: impl Into<String>, project_path: impl Into<PathBuf>, epoch_ms: u64) -> Self {
        Self {
            id,
            task: task.into(),
            project_path: project_path.into(),
            status: JobStatus::Pending,
            created_at_ms: epoch_ms,
            completed_at_ms: None,
            error: None,
            builder_sandbox: None,
            checker_sandbox: None,
            workspace_id: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Sandbox recorded for the given role, if any.
    pub fn sandbox(&self, role: SandboxRole) -> Option<&SandboxId> {
        match role {
            SandboxRole::Builder => self.builder_sandbox.as_ref(),
            SandboxRole::Checker => self.checker_sandbox.as_ref(),
        }
    }

    /// Record the sandbox spawned for a role.
    pub fn set_sandbox(&mut self, role: SandboxRole, sandbox: SandboxId) {
        match role {
            SandboxRole::Builder => self.builder_sandbox = Some(sandbox),
            SandboxRole::Checker => self.checker_sandbox = Some(sandbox),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
