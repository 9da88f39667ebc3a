// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job callback bus.
//!
//! A bus exists exactly while its job is non-terminal: the scheduler
//! registers it at dispatch and removes it during terminal cleanup.
//! Signals addressed to an absent bus are accepted and dropped.

use foundry_core::JobId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One-shot error/complete rendezvous for a single job.
pub struct JobSignals {
    error: CancellationToken,
    complete: CancellationToken,
    error_text: Mutex<Option<String>>,
}

impl JobSignals {
    fn new() -> Self {
        Self {
            error: CancellationToken::new(),
            complete: CancellationToken::new(),
            error_text: Mutex::new(None),
        }
    }

    /// Set the error flag. The first error text wins; later signals are
    /// discarded.
    pub fn signal_error(&self, text: impl Into<String>) {
        {
            let mut slot = self.error_text.lock();
            if slot.is_none() {
                *slot = Some(text.into());
            }
        }
        self.error.cancel();
    }

    pub fn signal_complete(&self) {
        self.complete.cancel();
    }

    /// Resolves once the error flag is set.
    pub async fn error_signalled(&self) {
        self.error.cancelled().await;
    }

    /// Resolves once the complete flag is set.
    pub async fn complete_signalled(&self) {
        self.complete.cancelled().await;
    }

    pub fn error_is_set(&self) -> bool {
        self.error.is_cancelled()
    }

    pub fn complete_is_set(&self) -> bool {
        self.complete.is_cancelled()
    }

    pub fn error_text(&self) -> String {
        self.error_text
            .lock()
            .clone()
            .unwrap_or_else(|| "agent reported error".to_string())
    }
}

/// Process-wide table of job buses; the only access path to them.
#[derive(Default)]
pub struct SignalRegistry {
    jobs: Mutex<HashMap<JobId, Arc<JobSignals>>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or return) the bus for a job.
    pub fn register(&self, job_id: JobId) -> Arc<JobSignals> {
        Arc::clone(self.jobs.lock().entry(job_id).or_insert_with(|| Arc::new(JobSignals::new())))
    }

    pub fn get(&self, job_id: &JobId) -> Option<Arc<JobSignals>> {
        self.jobs.lock().get(job_id).cloned()
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.lock().contains_key(job_id)
    }

    pub fn remove(&self, job_id: &JobId) {
        self.jobs.lock().remove(job_id);
    }

    /// Returns false when no bus exists (signal accepted, dropped).
    pub fn signal_error(&self, job_id: &JobId, text: &str) -> bool {
        match self.get(job_id) {
            Some(signals) => {
                signals.signal_error(text);
                true
            }
            None => false,
        }
    }

    /// Returns false when no bus exists (signal accepted, dropped).
    pub fn signal_complete(&self, job_id: &JobId) -> bool {
        match self.get(job_id) {
            Some(signals) => {
                signals.signal_complete();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
