// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent callback contract.
//!
//! Agents report progress out-of-band by posting a JSON payload with any
//! subset of the fields below. The envelope is decomposed into a closed set
//! of [`CallbackSignal`]s before the engine acts on it; unknown status tags
//! are accepted and dropped.

use serde::{Deserialize, Serialize};

/// Raw callback payload as agents send it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_usage_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_report: Option<serde_json::Value>,
}

/// One concrete thing a callback asks the engine to do.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackSignal {
    /// Append a telemetry row with the agent's current tool.
    Telemetry {
        tool: String,
        cpu_percent: f64,
        memory_mb: f64,
    },
    /// Append an audit row.
    Audit { report: serde_json::Value },
    /// One-shot fatal error signal for the running stage.
    Error { text: String },
    /// One-shot early-completion signal for the running stage.
    Complete,
}

impl CallbackEnvelope {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            status: Some("error".to_string()),
            error: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self { status: Some("completed".to_string()), ..Self::default() }
    }

    /// Decompose into the closed signal set.
    ///
    /// An error always wins over a completion claim: a payload carrying both
    /// an error text and `status == "completed"` yields only the error
    /// signal. Unknown status tags yield nothing.
    pub fn signals(self) -> Vec<CallbackSignal> {
        let mut signals = Vec::new();

        if let Some(tool) = self.current_tool {
            signals.push(CallbackSignal::Telemetry {
                tool,
                cpu_percent: self.cpu_usage.unwrap_or(0.0),
                memory_mb: self.ram_usage_mb.unwrap_or(0.0),
            });
        }

        if let Some(report) = self.audit_report {
            signals.push(CallbackSignal::Audit { report });
        }

        match self.status.as_deref() {
            Some("error") => signals.push(CallbackSignal::Error {
                text: self
                    .error
                    .unwrap_or_else(|| "agent reported error".to_string()),
            }),
            Some("completed") => {
                if let Some(text) = self.error {
                    signals.push(CallbackSignal::Error { text });
                } else {
                    signals.push(CallbackSignal::Complete);
                }
            }
            _ => {}
        }

        signals
    }
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
