// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL entries. Events are facts; state is derived from them.

use foundry_core::{ApprovalRecord, AuditReport, Job, JobId, JobStatus, SandboxId, SandboxRole, TelemetrySample, WorkspaceId};
use serde::{Deserialize, Serialize};

/// One durable fact about a job.
///
/// Replay must be idempotent: applying an event twice produces the same
/// state as applying it once (append-only rows are keyed by their position
/// in the WAL and only ever re-applied from a fresh replay, so plain
/// assignment and pushes are sufficient here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    JobCreated {
        job: Job,
    },
    StatusChanged {
        job_id: JobId,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        at_ms: u64,
    },
    SandboxRecorded {
        job_id: JobId,
        role: SandboxRole,
        sandbox_id: SandboxId,
    },
    WorkspaceRecorded {
        job_id: JobId,
        workspace_id: WorkspaceId,
    },
    TelemetryAppended {
        sample: TelemetrySample,
    },
    AuditAppended {
        report: AuditReport,
    },
    ApprovalRecorded {
        approval: ApprovalRecord,
    },
}
