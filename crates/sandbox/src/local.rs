// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-backed sandbox driver.
//!
//! Each sandbox is a supervised child process running the configured
//! per-role command inside the job's workspace directory. Pause/resume map
//! to SIGSTOP/SIGCONT; stop is SIGTERM, then SIGKILL after the grace
//! window. Resource caps from the role profile are exported to the command
//! wrapper, which owns their enforcement.

use crate::driver::{DriverError, SandboxDriver, SandboxStats, SandboxStatus, SpawnSpec};
use async_trait::async_trait;
use foundry_core::{JobId, RoleProfile, SandboxConfig, SandboxId, SandboxRole, WorkspaceId};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Supervised state of one spawned process.
struct SandboxCell {
    pid: u32,
    job_id: JobId,
    status: Mutex<SandboxStatus>,
    /// Set once by the waiter task when the process exits.
    exit: watch::Receiver<Option<i32>>,
}

#[derive(Default)]
struct DriverState {
    workspaces: HashMap<JobId, WorkspaceId>,
    workspace_paths: HashMap<WorkspaceId, PathBuf>,
    sandboxes: HashMap<SandboxId, Arc<SandboxCell>>,
}

/// Sandbox driver that runs agents as local child processes.
pub struct LocalDriver {
    root: PathBuf,
    config: SandboxConfig,
    state: Mutex<DriverState>,
    system: Arc<Mutex<System>>,
}

impl LocalDriver {
    pub fn new(root: impl Into<PathBuf>, config: SandboxConfig) -> Self {
        Self {
            root: root.into(),
            config,
            state: Mutex::new(DriverState::default()),
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    fn profile(&self, role: SandboxRole) -> &RoleProfile {
        match role {
            SandboxRole::Builder => &self.config.builder,
            SandboxRole::Checker => &self.config.checker,
        }
    }

    fn cell(&self, id: &SandboxId) -> Result<Arc<SandboxCell>, DriverError> {
        self.state
            .lock()
            .sandboxes
            .get(id)
            .cloned()
            .ok_or_else(|| DriverError::NotFound(id.to_string()))
    }

    fn signal(cell: &SandboxCell, signal: Signal) -> Result<(), DriverError> {
        kill(Pid::from_raw(cell.pid as i32), signal)
            .map_err(|e| DriverError::Internal(format!("signal {signal} failed: {e}")))
    }

    async fn set_workspace_mode(path: &Path, mode: u32) -> Result<(), DriverError> {
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| DriverError::Workspace(format!("chmod {}: {e}", path.display())))
    }

    /// Block until the waiter task records an exit, or the timeout elapses.
    async fn await_exit(cell: &SandboxCell, timeout: Duration) -> Option<i32> {
        let mut rx = cell.exit.clone();
        let wait = async {
            loop {
                if let Some(code) = *rx.borrow_and_update() {
                    return Some(code);
                }
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }
}

#[async_trait]
impl SandboxDriver for LocalDriver {
    async fn allocate_workspace(&self, job_id: &JobId) -> Result<WorkspaceId, DriverError> {
        if let Some(ws) = self.state.lock().workspaces.get(job_id) {
            return Ok(*ws);
        }

        let ws = WorkspaceId::new();
        let path = self.root.join("workspaces").join(ws.as_str());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| DriverError::Workspace(format!("create {}: {e}", path.display())))?;

        let mut state = self.state.lock();
        state.workspaces.insert(*job_id, ws);
        state.workspace_paths.insert(ws, path);
        debug!(job_id = %job_id, workspace = %ws, "workspace allocated");
        Ok(ws)
    }

    async fn spawn(&self, spec: SpawnSpec) -> Result<SandboxId, DriverError> {
        let path = self
            .state
            .lock()
            .workspace_paths
            .get(&spec.workspace)
            .cloned()
            .ok_or_else(|| DriverError::Workspace(format!("unknown workspace {}", spec.workspace)))?;

        // Builders own the workspace; checkers get it read-only.
        let mode = if spec.write_access { 0o755 } else { 0o555 };
        Self::set_workspace_mode(&path, mode).await?;

        let profile = self.profile(spec.role).clone();
        let mut command = tokio::process::Command::new("sh");
        command
            .arg("-c")
            .arg(&profile.command)
            .current_dir(&path)
            .env("JOB_ID", spec.job_id.as_str())
            .env("TASK", &spec.task)
            .env("WORKSPACE", &path)
            .env("CALLBACK", &spec.callback)
            .env("SANDBOX_ROLE", spec.role.to_string())
            .env("WRITE_ACCESS", if spec.write_access { "1" } else { "0" })
            .env("FOUNDRY_CPU_LIMIT", profile.cpu_limit.to_string())
            .env("FOUNDRY_MEMORY_LIMIT_MB", profile.memory_limit_mb.to_string())
            .env("FOUNDRY_NETWORK", &profile.network)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = command
            .spawn()
            .map_err(|e| DriverError::SpawnFailed(format!("{} ({}): {e}", profile.command, spec.role)))?;
        let pid = child
            .id()
            .ok_or_else(|| DriverError::SpawnFailed("child exited before pid was read".to_string()))?;

        let (exit_tx, exit_rx) = watch::channel(None);
        let id = SandboxId::new();
        let cell = Arc::new(SandboxCell {
            pid,
            job_id: spec.job_id,
            status: Mutex::new(SandboxStatus::Running),
            exit: exit_rx,
        });
        self.state.lock().sandboxes.insert(id, Arc::clone(&cell));

        // Waiter task: reaps the child and records its exit exactly once.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    *cell.status.lock() = SandboxStatus::Exited;
                    let _ = exit_tx.send(Some(code));
                }
                Err(e) => {
                    warn!(pid, error = %e, "sandbox wait failed");
                    *cell.status.lock() = SandboxStatus::Dead;
                    let _ = exit_tx.send(Some(-1));
                }
            }
        });

        debug!(sandbox = %id, pid, role = %spec.role, job_id = %spec.job_id, "sandbox spawned");
        Ok(id)
    }

    async fn wait(&self, id: &SandboxId) -> Result<i32, DriverError> {
        let cell = self.cell(id)?;
        Self::await_exit(&cell, Duration::MAX)
            .await
            .ok_or_else(|| DriverError::Internal(format!("waiter for {id} lost")))
    }

    async fn status(&self, id: &SandboxId) -> Result<SandboxStatus, DriverError> {
        Ok(*self.cell(id)?.status.lock())
    }

    async fn sample(&self, id: &SandboxId) -> Result<SandboxStats, DriverError> {
        let cell = self.cell(id)?;
        let system = Arc::clone(&self.system);
        let pid = cell.pid;
        let stats = tokio::task::spawn_blocking(move || {
            let mut sys = system.lock();
            let target = sysinfo::Pid::from_u32(pid);
            sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
            sys.process(target).map(|p| SandboxStats {
                cpu_percent: p.cpu_usage() as f64,
                memory_mb: p.memory() as f64 / (1024.0 * 1024.0),
            })
        })
        .await
        .map_err(|e| DriverError::Internal(format!("sample task: {e}")))?;

        stats.ok_or_else(|| DriverError::NotFound(id.to_string()))
    }

    async fn pause(&self, id: &SandboxId) -> Result<(), DriverError> {
        let cell = self.cell(id)?;
        let mut status = cell.status.lock();
        match *status {
            SandboxStatus::Running => {
                Self::signal(&cell, Signal::SIGSTOP)?;
                *status = SandboxStatus::Paused;
                Ok(())
            }
            // Already paused or finished: lifecycle-level no-op.
            _ => Ok(()),
        }
    }

    async fn resume(&self, id: &SandboxId) -> Result<(), DriverError> {
        let cell = self.cell(id)?;
        let mut status = cell.status.lock();
        match *status {
            SandboxStatus::Paused => {
                Self::signal(&cell, Signal::SIGCONT)?;
                *status = SandboxStatus::Running;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn stop(&self, id: &SandboxId, grace: Duration) -> Result<(), DriverError> {
        let cell = self.cell(id)?;
        {
            let status = cell.status.lock();
            if matches!(*status, SandboxStatus::Exited | SandboxStatus::Dead) {
                return Ok(());
            }
        }

        let pid = Pid::from_raw(cell.pid as i32);
        // A stopped process cannot handle SIGTERM; wake it first.
        let _ = kill(pid, Signal::SIGCONT);
        let _ = kill(pid, Signal::SIGTERM);

        if Self::await_exit(&cell, grace).await.is_none() {
            warn!(sandbox = %id, job_id = %cell.job_id, grace_secs = grace.as_secs(), "grace expired, killing");
            let _ = kill(pid, Signal::SIGKILL);
        }
        Ok(())
    }

    async fn running(&self) -> Result<Vec<SandboxId>, DriverError> {
        let state = self.state.lock();
        Ok(state
            .sandboxes
            .iter()
            .filter(|(_, cell)| *cell.status.lock() == SandboxStatus::Running)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn release_workspace(&self, workspace: &WorkspaceId) -> Result<(), DriverError> {
        let path = {
            let mut state = self.state.lock();
            state.workspaces.retain(|_, ws| ws != workspace);
            state.workspace_paths.remove(workspace)
        };
        let Some(path) = path else {
            return Ok(());
        };

        // Restore write permission so a read-only checker workspace deletes.
        let _ = Self::set_workspace_mode(&path, 0o755).await;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DriverError::Workspace(format!("remove {}: {e}", path.display()))),
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
