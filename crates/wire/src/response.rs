// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use foundry_core::{ApprovalRecord, Job, JobStatus, TelemetrySample};
use serde::{Deserialize, Serialize};

/// Full job record DTO.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobDetail {
    pub job_id: String,
    pub task: String,
    pub project_path: String,
    pub status: JobStatus,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalRecord>,
}

impl From<Job> for JobDetail {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            task: job.task,
            project_path: job.project_path.display().to_string(),
            status: job.status,
            created_at_ms: job.created_at_ms,
            completed_at_ms: job.completed_at_ms,
            error_message: job.error,
            approval: None,
        }
    }
}

/// One row of the job listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub job_id: String,
    pub task: String,
    pub status: JobStatus,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            task: job.task,
            status: job.status,
            created_at_ms: job.created_at_ms,
            completed_at_ms: job.completed_at_ms,
        }
    }
}

/// Latest telemetry for a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryDetail {
    pub job_id: String,
    pub status: JobStatus,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<String>,
}

impl TelemetryDetail {
    pub fn from_sample(job_id: String, status: JobStatus, sample: Option<TelemetrySample>) -> Self {
        match sample {
            Some(sample) => Self {
                job_id,
                status,
                cpu_percent: sample.cpu_percent,
                memory_mb: sample.memory_mb,
                current_tool: sample.current_tool,
            },
            None => Self { job_id, status, cpu_percent: 0.0, memory_mb: 0.0, current_tool: None },
        }
    }
}

/// Latest audit report for a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditDetail {
    pub job_id: String,
    pub report: serde_json::Value,
    pub created_at_ms: u64,
}

/// Response from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    JobSpawned { job_id: String, status: JobStatus },
    Job(JobDetail),
    Telemetry(TelemetryDetail),
    Audit(AuditDetail),
    Jobs(Vec<JobSummary>),
    /// Generic acknowledgement (callbacks, approvals, shutdown)
    Ack,
    Error { message: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { message: message.into() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
