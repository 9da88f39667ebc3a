// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job supervision: the builder → checker pipeline.
//!
//! Each stage spawns its role, runs a concurrent telemetry sampler, and
//! races three outcomes (sandbox exit, error callback, complete callback)
//! under a wall-clock budget. The first outcome wins; later signals are
//! discarded.

use crate::error::EngineError;
use crate::scheduler::Scheduler;
use foundry_core::{Clock, Job, JobId, JobStatus, SandboxId, SandboxRole, TelemetrySample, WorkspaceId};
use foundry_sandbox::{DriverError, SandboxDriver, SandboxStatus, SpawnSpec};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// First-to-complete result of the three-way wait.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StageOutcome {
    /// The sandbox reached exited/dead with this exit code.
    Exited(i32),
    /// The agent signalled a fatal error through the callback bus.
    ErrorSignalled(String),
    /// The agent signalled readiness before the sandbox drained;
    /// treated as exit code 0.
    CompletionSignalled,
}

pub(crate) struct SamplerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

impl<D, C> Scheduler<D, C>
where
    D: SandboxDriver,
    C: Clock + 'static,
{
    /// Supervisor entry point for one dispatched job. Translates pipeline
    /// errors into a terminal `failed` status and always releases resources
    /// on failure; a shutdown cancel releases without a status change.
    pub(crate) async fn execute_job(self: Arc<Self>, job_id: JobId) {
        let cancelled = self.supervisor_cancel.clone();
        tokio::select! {
            result = self.run_pipeline(&job_id) => {
                if let Err(error) = result {
                    let message = error.status_message();
                    warn!(job_id = %job_id, error = %message, "job failed");
                    let at_ms = self.clock.epoch_ms();
                    if let Err(e) =
                        self.store.update_status(&job_id, JobStatus::Failed, Some(message), at_ms)
                    {
                        warn!(job_id = %job_id, error = %e, "failure status update lost");
                    }
                    self.release(&job_id).await;
                }
            }
            _ = cancelled.cancelled() => {
                // Shutdown: the job keeps its last non-terminal status.
                info!(job_id = %job_id, "supervisor cancelled by shutdown");
                self.release(&job_id).await;
            }
        }
    }

    async fn run_pipeline(&self, job_id: &JobId) -> Result<(), EngineError> {
        let job = self
            .store
            .job(job_id)
            .ok_or_else(|| EngineError::Supervision(format!("job {job_id} missing from store")))?;

        let workspace = self.driver.allocate_workspace(job_id).await?;
        self.store.record_workspace(job_id, workspace)?;
        if let Some(entry) = self.in_flight.lock().get_mut(job_id) {
            entry.workspace = Some(workspace);
        }

        match self.run_stage(&job, SandboxRole::Builder, workspace).await? {
            StageOutcome::Exited(0) | StageOutcome::CompletionSignalled => {}
            StageOutcome::Exited(code) => {
                return Err(EngineError::Stage(format!(
                    "builder exited with non-zero exit code {code}"
                )));
            }
            StageOutcome::ErrorSignalled(text) => return Err(EngineError::Stage(text)),
        }

        match self.run_stage(&job, SandboxRole::Checker, workspace).await? {
            StageOutcome::Exited(0) | StageOutcome::CompletionSignalled => {}
            StageOutcome::Exited(code) => {
                // The audit may still be partially reported; review proceeds.
                warn!(job_id = %job_id, code, "checker exited non-zero, proceeding to review");
            }
            StageOutcome::ErrorSignalled(text) => return Err(EngineError::Stage(text)),
        }

        let at_ms = self.clock.epoch_ms();
        self.store.update_status(job_id, JobStatus::AwaitingApproval, None, at_ms)?;
        info!(job_id = %job_id, "job ready for review");
        Ok(())
    }

    async fn run_stage(
        &self,
        job: &Job,
        role: SandboxRole,
        workspace: WorkspaceId,
    ) -> Result<StageOutcome, EngineError> {
        let status = match role {
            SandboxRole::Builder => JobStatus::Building,
            SandboxRole::Checker => JobStatus::Checking,
        };
        let at_ms = self.clock.epoch_ms();
        self.store.update_status(&job.id, status, None, at_ms)?;

        let spec = SpawnSpec::new(role, job.id, workspace)
            .task(job.task.clone())
            .callback(format!("jobs/{}/callback", job.id))
            .write_access(role == SandboxRole::Builder);
        let sandbox = self.driver.spawn(spec).await?;
        self.store.record_sandbox(&job.id, role, sandbox)?;
        info!(job_id = %job.id, role = %role, sandbox = %sandbox, "stage started");

        let sampler = self.start_sampler(job.id, sandbox);
        let outcome = self.supervise(&job.id, sandbox).await;
        sampler.stop().await;

        if let Ok(StageOutcome::ErrorSignalled(text)) = &outcome {
            // Abort the stage promptly; terminal cleanup would get there
            // later, but the agent already declared this run dead.
            warn!(job_id = %job.id, role = %role, error = %text, "stopping sandbox after error signal");
            if let Err(e) = self.driver.stop(&sandbox, self.config.stop_grace()).await {
                warn!(sandbox = %sandbox, error = %e, "stop after error signal failed");
            }
        }
        outcome
    }

    /// The three-way wait, bounded by the stage timeout.
    async fn supervise(
        &self,
        job_id: &JobId,
        sandbox: SandboxId,
    ) -> Result<StageOutcome, EngineError> {
        let signals = self
            .signals
            .get(job_id)
            .ok_or_else(|| EngineError::Supervision(format!("no callback bus for {job_id}")))?;

        let exited = self.wait_for_exit(sandbox);
        tokio::pin!(exited);
        let budget = tokio::time::sleep(self.config.stage_timeout());
        tokio::pin!(budget);

        tokio::select! {
            result = &mut exited => result.map(StageOutcome::Exited),
            _ = signals.error_signalled() => Ok(StageOutcome::ErrorSignalled(signals.error_text())),
            _ = signals.complete_signalled() => Ok(StageOutcome::CompletionSignalled),
            _ = &mut budget => {
                warn!(job_id = %job_id, sandbox = %sandbox, timeout_secs = self.config.stage_timeout_secs, "stage timed out, stopping sandbox");
                if let Err(e) = self.driver.stop(&sandbox, self.config.stop_grace()).await {
                    warn!(sandbox = %sandbox, error = %e, "stop after timeout failed");
                }
                Err(EngineError::Stage(format!(
                    "stage timed out after {}s",
                    self.config.stage_timeout_secs
                )))
            }
        }
    }

    /// Poll the sandbox until it leaves the running states, then collect
    /// its exit code. `Missing` is a supervision error, not an exit.
    async fn wait_for_exit(&self, sandbox: SandboxId) -> Result<i32, EngineError> {
        loop {
            match self.driver.status(&sandbox).await {
                Ok(SandboxStatus::Exited | SandboxStatus::Dead) => {
                    return Ok(self.driver.wait(&sandbox).await?);
                }
                Ok(SandboxStatus::Missing) => {
                    return Err(EngineError::Supervision(format!(
                        "sandbox {sandbox} was removed externally"
                    )));
                }
                // Pending, running, or paused by the sentinel: keep waiting.
                Ok(_) => {}
                Err(DriverError::NotFound(id)) => {
                    return Err(EngineError::Supervision(format!(
                        "sandbox {id} was removed externally"
                    )));
                }
                Err(e) => return Err(EngineError::Driver(e)),
            }
            tokio::time::sleep(self.config.exit_poll()).await;
        }
    }

    /// Concurrent telemetry sampler for one stage's sandbox, spawned with
    /// its own clones of the collaborators so it outlives no borrow.
    fn start_sampler(&self, job_id: JobId, sandbox: SandboxId) -> SamplerHandle {
        let cancel = self.supervisor_cancel.child_token();
        let task = tokio::spawn(sampler_loop(
            Arc::clone(&self.driver),
            Arc::clone(&self.store),
            self.clock.clone(),
            self.config.sampler_interval(),
            job_id,
            sandbox,
            cancel.clone(),
        ));
        SamplerHandle { cancel, task }
    }
}

/// Telemetry loop for one sandbox. Sampling errors are non-fatal; the loop
/// exits when the sandbox leaves `Running`, the driver reports it missing,
/// or the stage ends.
async fn sampler_loop<D: SandboxDriver, C: Clock>(
    driver: Arc<D>,
    store: Arc<foundry_storage::JobStore>,
    clock: C,
    interval: std::time::Duration,
    job_id: JobId,
    sandbox: SandboxId,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        match driver.status(&sandbox).await {
            Ok(SandboxStatus::Running) => {}
            Ok(status) => {
                debug!(sandbox = %sandbox, status = %status, "sampler exiting");
                break;
            }
            Err(e) => {
                debug!(sandbox = %sandbox, error = %e, "sampler status check failed, exiting");
                break;
            }
        }

        match driver.sample(&sandbox).await {
            Ok(stats) => {
                let sample = TelemetrySample {
                    job_id,
                    at_ms: clock.epoch_ms(),
                    cpu_percent: stats.cpu_percent,
                    memory_mb: stats.memory_mb,
                    current_tool: None,
                    sandbox_id: Some(sandbox),
                };
                if let Err(e) = store.append_telemetry(sample) {
                    warn!(job_id = %job_id, error = %e, "telemetry append failed");
                }
            }
            Err(e) => {
                warn!(sandbox = %sandbox, error = %e, "telemetry sample failed");
            }
        }
    }
}
