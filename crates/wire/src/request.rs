// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use foundry_core::CallbackEnvelope;
use serde::{Deserialize, Serialize};

/// Request from a client (or an agent callback) to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Submit a new job for the builder → checker pipeline
    SpawnJob { task: String, project_path: String },

    /// Current job record
    JobStatus { id: String },

    /// Latest telemetry sample + current-tool label
    JobTelemetry { id: String },

    /// Latest audit report from the checker
    JobAudit { id: String },

    /// Human review decision on an awaiting-approval job
    Approve {
        id: String,
        approved: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },

    /// Recency-ordered job listing
    ListJobs {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        #[serde(default)]
        limit: Option<usize>,
    },

    /// Out-of-band progress report from a running agent
    Callback { id: String, payload: CallbackEnvelope },

    /// Request daemon shutdown
    Shutdown,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
