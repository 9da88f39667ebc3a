// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only rows attached to a job: telemetry, audits, approvals.

use crate::job::{JobId, SandboxId};
use serde::{Deserialize, Serialize};

/// A point-in-time resource sample for a running sandbox.
///
/// Emitted by the scheduler's sampler loop (with a sandbox id) and by agent
/// callbacks (with a current-tool label). Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub job_id: JobId,
    pub at_ms: u64,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<SandboxId>,
}

/// Audit findings reported by the checker agent.
///
/// The payload is opaque to the core; queries return the latest report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub job_id: JobId,
    pub report: serde_json::Value,
    pub created_at_ms: u64,
}

/// The human decision on a reviewed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

crate::simple_display! {
    ApprovalDecision {
        Approved => "approved",
        Rejected => "rejected",
    }
}

/// Record of a human approve/reject decision on an awaiting-approval job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub job_id: JobId,
    pub decision: ApprovalDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub resolved_at_ms: u64,
}
