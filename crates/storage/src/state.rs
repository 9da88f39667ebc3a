// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use crate::event::StoreEvent;
use foundry_core::{ApprovalRecord, AuditReport, Job, TelemetrySample};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// In-memory view of the store, rebuilt from snapshot + WAL replay.
///
/// Maps are keyed by job id string so lookups work with borrowed ids.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<String, Job>,
    #[serde(default)]
    pub telemetry: HashMap<String, Vec<TelemetrySample>>,
    #[serde(default)]
    pub audits: HashMap<String, Vec<AuditReport>>,
    #[serde(default)]
    pub approvals: HashMap<String, ApprovalRecord>,
}

impl MaterializedState {
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Apply an event to derive state changes.
    ///
    /// Validation happens before the event is written; replay applies
    /// blindly so an old WAL always loads.
    pub fn apply_event(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::JobCreated { job } => {
                self.jobs.entry(job.id.to_string()).or_insert_with(|| job.clone());
            }
            StoreEvent::StatusChanged { job_id, status, error, at_ms } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.status = *status;
                    if let Some(error) = error {
                        job.error = Some(error.clone());
                    }
                    if status.is_terminal() && job.completed_at_ms.is_none() {
                        job.completed_at_ms = Some(*at_ms);
                    }
                }
            }
            StoreEvent::SandboxRecorded { job_id, role, sandbox_id } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.set_sandbox(*role, *sandbox_id);
                }
            }
            StoreEvent::WorkspaceRecorded { job_id, workspace_id } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.workspace_id = Some(*workspace_id);
                }
            }
            StoreEvent::TelemetryAppended { sample } => {
                self.telemetry.entry(sample.job_id.to_string()).or_default().push(sample.clone());
            }
            StoreEvent::AuditAppended { report } => {
                self.audits.entry(report.job_id.to_string()).or_default().push(report.clone());
            }
            StoreEvent::ApprovalRecorded { approval } => {
                self.approvals.insert(approval.job_id.to_string(), approval.clone());
            }
        }
    }
}
