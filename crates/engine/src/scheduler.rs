// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission, approval gating, callbacks, shutdown, cleanup.
//!
//! The per-job pipeline itself (stages, three-way wait, sampler) lives in
//! `pipeline.rs`; this module owns the scheduler's shared tables and its
//! public contract.

use crate::bus::SignalRegistry;
use crate::error::EngineError;
use crate::sentinel::{AdmissionGauge, AdmissionLevel};
use foundry_core::{
    ApprovalDecision, ApprovalRecord, AuditReport, CallbackEnvelope, CallbackSignal, Clock,
    Config, Job, JobId, JobStatus, TelemetrySample, WorkspaceId,
};
use foundry_sandbox::SandboxDriver;
use foundry_storage::{JobStore, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Join window for supervisors after the force-cancel at shutdown.
const CANCEL_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Book-keeping for a dispatched job. An entry exists from dispatch until
/// the job reaches a terminal status, so awaiting-approval jobs keep
/// holding their concurrency slot until the human decides.
pub(crate) struct InFlight {
    pub(crate) workspace: Option<WorkspaceId>,
    supervisor: Option<JoinHandle<()>>,
}

/// The job scheduler and lifecycle manager.
///
/// Constructed with explicit references to its collaborators; owns all job
/// state transitions and the transient per-job tables.
pub struct Scheduler<D, C> {
    pub(crate) store: Arc<JobStore>,
    pub(crate) driver: Arc<D>,
    pub(crate) gauge: AdmissionGauge,
    pub(crate) config: Config,
    pub(crate) clock: C,
    pub(crate) signals: SignalRegistry,
    pub(crate) in_flight: Mutex<HashMap<JobId, InFlight>>,
    queue_tx: mpsc::UnboundedSender<JobId>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<JobId>>>,
    /// Stops the admission loop.
    shutdown: CancellationToken,
    /// Force-cancels in-flight supervisors after the drain window.
    pub(crate) supervisor_cancel: CancellationToken,
}

impl<D, C> Scheduler<D, C>
where
    D: SandboxDriver,
    C: Clock + 'static,
{
    pub fn new(
        store: Arc<JobStore>,
        driver: Arc<D>,
        gauge: AdmissionGauge,
        config: Config,
        clock: C,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            store,
            driver,
            gauge,
            config,
            clock,
            signals: SignalRegistry::new(),
            in_flight: Mutex::new(HashMap::new()),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            shutdown: CancellationToken::new(),
            supervisor_cancel: CancellationToken::new(),
        }
    }

    /// Persist a new pending job and enqueue it. Never blocks on admission.
    pub fn submit(
        &self,
        task: impl Into<String>,
        project_path: impl Into<String>,
    ) -> Result<JobId, EngineError> {
        let task = task.into();
        let project_path = project_path.into();
        if task.trim().is_empty() {
            return Err(EngineError::Submission("task must not be empty".to_string()));
        }
        if project_path.trim().is_empty() {
            return Err(EngineError::Submission("project_path must not be empty".to_string()));
        }

        let job_id = JobId::new();
        let job = Job::new(job_id, task, project_path, self.clock.epoch_ms());
        self.store.create_job(job)?;
        self.queue_tx
            .send(job_id)
            .map_err(|_| EngineError::Submission("scheduler is stopped".to_string()))?;
        info!(job_id = %job_id, "job submitted");
        Ok(job_id)
    }

    /// Admission loop: dequeues one job id at a time and dispatches it when
    /// the concurrency cap and sentinel level allow. Loop-body errors are
    /// logged and the loop continues.
    pub async fn run(self: Arc<Self>) {
        let Some(mut queue_rx) = self.queue_rx.lock().take() else {
            warn!("admission loop already taken");
            return;
        };
        info!(max_concurrent = self.config.max_concurrent, "admission loop started");

        loop {
            let job_id = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = queue_rx.recv() => match received {
                    Some(job_id) => job_id,
                    None => break,
                },
            };
            Arc::clone(&self).admit(job_id).await;
        }
        debug!("admission loop stopped");
    }

    async fn admit(self: Arc<Self>, job_id: JobId) {
        let in_flight = self.in_flight.lock().len();
        if in_flight >= self.config.max_concurrent {
            debug!(job_id = %job_id, in_flight, "concurrency cap reached, re-queueing");
            let _ = self.queue_tx.send(job_id);
            self.idle(self.config.admit_backoff()).await;
            return;
        }

        let level = self.gauge.level();
        if level != AdmissionLevel::Green {
            let stats = self.gauge.stats();
            warn!(
                job_id = %job_id,
                level = %level,
                cpu = stats.cpu_percent,
                mem = stats.mem_percent,
                "host under load, re-queueing"
            );
            let _ = self.queue_tx.send(job_id);
            self.idle(self.config.load_backoff()).await;
            return;
        }

        self.signals.register(job_id);
        self.in_flight.lock().insert(job_id, InFlight { workspace: None, supervisor: None });

        let scheduler = Arc::clone(&self);
        let handle = tokio::spawn(scheduler.execute_job(job_id));
        if let Some(entry) = self.in_flight.lock().get_mut(&job_id) {
            entry.supervisor = Some(handle);
        }
    }

    /// Backoff sleep that shutdown can interrupt.
    async fn idle(&self, duration: Duration) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }

    /// Approve an awaiting-approval job: record the decision, release its
    /// resources, then complete it.
    pub async fn approve(&self, job_id: &JobId) -> Result<(), EngineError> {
        let at_ms = self.clock.epoch_ms();
        self.store
            .update_status(job_id, JobStatus::Approved, None, at_ms)
            .map_err(Self::approval_error)?;
        self.store.record_approval(ApprovalRecord {
            job_id: *job_id,
            decision: ApprovalDecision::Approved,
            comment: None,
            resolved_at_ms: at_ms,
        })?;
        info!(job_id = %job_id, "job approved");

        // Release before the terminal write so approved jobs never leak
        // sandboxes or workspaces.
        self.release(job_id).await;
        let at_ms = self.clock.epoch_ms();
        self.store.update_status(job_id, JobStatus::Completed, None, at_ms)?;
        Ok(())
    }

    /// Reject an awaiting-approval job; the comment becomes both the
    /// approval record's comment and the job's error message.
    pub async fn reject(&self, job_id: &JobId, comment: Option<String>) -> Result<(), EngineError> {
        let at_ms = self.clock.epoch_ms();
        self.store
            .update_status(job_id, JobStatus::Rejected, comment.clone(), at_ms)
            .map_err(Self::approval_error)?;
        self.store.record_approval(ApprovalRecord {
            job_id: *job_id,
            decision: ApprovalDecision::Rejected,
            comment,
            resolved_at_ms: at_ms,
        })?;
        info!(job_id = %job_id, "job rejected");
        self.release(job_id).await;
        Ok(())
    }

    fn approval_error(error: StoreError) -> EngineError {
        match error {
            StoreError::InvalidTransition { job_id, from, to } => EngineError::InvalidState(
                format!("cannot move job {job_id} from {from} to {to}: approval is only valid from awaiting_approval"),
            ),
            other => EngineError::Store(other),
        }
    }

    /// Consume an agent callback. Payloads for missing or terminal jobs are
    /// accepted and dropped.
    pub fn handle_callback(&self, job_id: &JobId, envelope: CallbackEnvelope) {
        let Some(job) = self.store.job(job_id) else {
            debug!(job_id = %job_id, "callback for unknown job dropped");
            return;
        };
        if job.is_terminal() {
            debug!(job_id = %job_id, status = %job.status, "callback for terminal job dropped");
            return;
        }

        for signal in envelope.signals() {
            match signal {
                CallbackSignal::Telemetry { tool, cpu_percent, memory_mb } => {
                    let sample = TelemetrySample {
                        job_id: *job_id,
                        at_ms: self.clock.epoch_ms(),
                        cpu_percent,
                        memory_mb,
                        current_tool: Some(tool),
                        sandbox_id: None,
                    };
                    if let Err(e) = self.store.append_telemetry(sample) {
                        warn!(job_id = %job_id, error = %e, "callback telemetry append failed");
                    }
                }
                CallbackSignal::Audit { report } => {
                    let report = AuditReport {
                        job_id: *job_id,
                        report,
                        created_at_ms: self.clock.epoch_ms(),
                    };
                    if let Err(e) = self.store.append_audit(report) {
                        warn!(job_id = %job_id, error = %e, "audit append failed");
                    }
                }
                CallbackSignal::Error { text } => {
                    if !self.signals.signal_error(job_id, &text) {
                        debug!(job_id = %job_id, "error signal without bus dropped");
                    }
                }
                CallbackSignal::Complete => {
                    if !self.signals.signal_complete(job_id) {
                        debug!(job_id = %job_id, "complete signal without bus dropped");
                    }
                }
            }
        }
    }

    /// Release everything a job holds: stop both recorded sandboxes,
    /// release the workspace, drop the callback bus and the in-flight
    /// entry. Idempotent; failures are cleanup warnings and never regress
    /// the job's status.
    pub(crate) async fn release(&self, job_id: &JobId) {
        let entry = self.in_flight.lock().remove(job_id);
        let job = self.store.job(job_id);

        if let Some(job) = &job {
            for sandbox in [job.builder_sandbox, job.checker_sandbox].into_iter().flatten() {
                if let Err(e) = self.driver.stop(&sandbox, self.config.stop_grace()).await {
                    warn!(job_id = %job_id, sandbox = %sandbox, error = %e, "cleanup stop failed");
                }
            }
        }

        let workspace = entry
            .as_ref()
            .and_then(|e| e.workspace)
            .or_else(|| job.as_ref().and_then(|j| j.workspace_id));
        if let Some(workspace) = workspace {
            if let Err(e) = self.driver.release_workspace(&workspace).await {
                warn!(job_id = %job_id, workspace = %workspace, error = %e, "cleanup release failed");
            }
        }

        self.signals.remove(job_id);
    }

    /// Cooperative shutdown: stop admitting, drain in-flight supervisors
    /// within the drain window, force-cancel the rest.
    pub async fn stop(&self) {
        info!("scheduler stopping");
        self.shutdown.cancel();

        let handles: Vec<(JobId, JoinHandle<()>)> = self
            .in_flight
            .lock()
            .iter_mut()
            .filter_map(|(id, entry)| entry.supervisor.take().map(|handle| (*id, handle)))
            .collect();

        let deadline = tokio::time::Instant::now() + self.config.drain_timeout();
        let mut undrained = Vec::new();
        for (job_id, mut handle) in handles {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(left, &mut handle).await.is_err() {
                undrained.push((job_id, handle));
            }
        }

        if !undrained.is_empty() {
            warn!(count = undrained.len(), "drain window expired, cancelling supervisors");
            self.supervisor_cancel.cancel();
            for (job_id, mut handle) in undrained {
                if tokio::time::timeout(CANCEL_JOIN_TIMEOUT, &mut handle).await.is_err() {
                    warn!(job_id = %job_id, "supervisor ignored cancel, aborting");
                    handle.abort();
                }
            }
        }
        info!("scheduler stopped");
    }

    /// Number of dispatched, not-yet-terminal jobs.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Whether a callback bus currently exists for the job.
    pub fn bus_exists(&self, job_id: &JobId) -> bool {
        self.signals.contains(job_id)
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
