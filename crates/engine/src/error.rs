// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.

use foundry_sandbox::DriverError;
use foundry_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid input on submit; no job was created.
    #[error("invalid submission: {0}")]
    Submission(String),

    /// Non-zero exit, explicit error callback, or timeout within a stage.
    #[error("stage failure: {0}")]
    Stage(String),

    /// Sandbox disappeared or the driver reported an unexpected state.
    #[error("supervision error: {0}")]
    Supervision(String),

    /// Approve/reject on a job that is not awaiting approval.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Text recorded as the failed job's error message.
    ///
    /// Stage and supervision failures carry their reason verbatim so
    /// callers (and humans) see "exit code 2" or the agent's own error
    /// text, not the taxonomy wrapper.
    pub fn status_message(&self) -> String {
        match self {
            EngineError::Stage(text) | EngineError::Supervision(text) => text.clone(),
            other => other.to_string(),
        }
    }
}
