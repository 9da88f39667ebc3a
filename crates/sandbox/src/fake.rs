// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-memory driver for other crates' tests.
//!
//! Outcomes are planned per role; every lifecycle call is recorded so tests
//! can assert the no-leak invariants (all sandboxes stopped, all workspaces
//! released) after the fact. Plan timers use tokio time, so paused-clock
//! tests control them precisely.

use crate::driver::{DriverError, SandboxDriver, SandboxStats, SandboxStatus, SpawnSpec};
use async_trait::async_trait;
use foundry_core::{JobId, SandboxId, SandboxRole, WorkspaceId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What a spawned sandbox of a given role will do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnPlan {
    /// Exit with `code` once `after` has elapsed.
    Exit { code: i32, after: Duration },
    /// Keep running until stopped.
    Never,
    /// Report `Missing` once `after` has elapsed (removed externally).
    Vanish { after: Duration },
}

/// Exit code reported when a sandbox is stopped before its planned exit.
const STOP_EXIT_CODE: i32 = 143;

struct FakeSandbox {
    spawned_at: Instant,
    plan: SpawnPlan,
    paused: bool,
    stopped: bool,
}

impl FakeSandbox {
    fn status(&self, now: Instant) -> SandboxStatus {
        if self.stopped {
            return SandboxStatus::Exited;
        }
        // A paused sandbox is frozen: its planned exit does not fire.
        if self.paused {
            return SandboxStatus::Paused;
        }
        match self.plan {
            SpawnPlan::Exit { after, .. } if now >= self.spawned_at + after => {
                SandboxStatus::Exited
            }
            SpawnPlan::Vanish { after } if now >= self.spawned_at + after => {
                SandboxStatus::Missing
            }
            _ => SandboxStatus::Running,
        }
    }

    fn exit_code(&self) -> i32 {
        match self.plan {
            SpawnPlan::Exit { code, .. } if !self.stopped => code,
            _ => STOP_EXIT_CODE,
        }
    }
}

#[derive(Default)]
struct FakeState {
    plans: HashMap<SandboxRole, SpawnPlan>,
    sandboxes: HashMap<SandboxId, FakeSandbox>,
    workspaces: HashMap<JobId, WorkspaceId>,
    spawned: Vec<(SandboxId, SpawnSpec)>,
    stop_calls: Vec<(SandboxId, Duration)>,
    released: Vec<WorkspaceId>,
    pause_log: Vec<SandboxId>,
    resume_log: Vec<SandboxId>,
    sample: SandboxStats,
    fail_spawn: Option<String>,
    fail_sample: bool,
}

/// Scripted sandbox driver. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct FakeDriver {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    /// Both roles exit 0 after 2 seconds unless re-planned.
    pub fn new() -> Self {
        let mut state = FakeState {
            sample: SandboxStats { cpu_percent: 10.0, memory_mb: 100.0 },
            ..FakeState::default()
        };
        let default_plan = SpawnPlan::Exit { code: 0, after: Duration::from_secs(2) };
        state.plans.insert(SandboxRole::Builder, default_plan);
        state.plans.insert(SandboxRole::Checker, default_plan);
        Self { inner: Arc::new(Mutex::new(state)) }
    }

    pub fn set_plan(&self, role: SandboxRole, plan: SpawnPlan) {
        self.inner.lock().plans.insert(role, plan);
    }

    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        self.inner.lock().fail_spawn = Some(message.into());
    }

    pub fn set_sample(&self, stats: SandboxStats) {
        self.inner.lock().sample = stats;
    }

    pub fn fail_samples(&self, fail: bool) {
        self.inner.lock().fail_sample = fail;
    }

    // -- introspection for assertions --

    pub fn spawned(&self) -> Vec<SpawnSpec> {
        self.inner.lock().spawned.iter().map(|(_, spec)| spec.clone()).collect()
    }

    pub fn sandbox_for(&self, job_id: &JobId, role: SandboxRole) -> Option<SandboxId> {
        self.inner
            .lock()
            .spawned
            .iter()
            .find(|(_, spec)| spec.job_id == *job_id && spec.role == role)
            .map(|(id, _)| *id)
    }

    pub fn workspace_for(&self, job_id: &JobId) -> Option<WorkspaceId> {
        self.inner.lock().workspaces.get(job_id).copied()
    }

    /// Distinct sandboxes that have received at least one stop call.
    pub fn stopped(&self) -> Vec<SandboxId> {
        let state = self.inner.lock();
        let mut seen = Vec::new();
        for (id, _) in &state.stop_calls {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        seen
    }

    pub fn stop_calls(&self) -> Vec<(SandboxId, Duration)> {
        self.inner.lock().stop_calls.clone()
    }

    pub fn released(&self) -> Vec<WorkspaceId> {
        self.inner.lock().released.clone()
    }

    pub fn pause_log(&self) -> Vec<SandboxId> {
        self.inner.lock().pause_log.clone()
    }

    pub fn resume_log(&self) -> Vec<SandboxId> {
        self.inner.lock().resume_log.clone()
    }

    pub fn status_now(&self, id: &SandboxId) -> Option<SandboxStatus> {
        let state = self.inner.lock();
        state.sandboxes.get(id).map(|s| s.status(Instant::now()))
    }

    /// True when every spawned sandbox is out of `Running`/`Paused` and every
    /// allocated workspace has been released.
    pub fn leak_free(&self) -> bool {
        let state = self.inner.lock();
        let now = Instant::now();
        let all_down = state.sandboxes.values().all(|s| {
            !matches!(s.status(now), SandboxStatus::Running | SandboxStatus::Paused)
        });
        all_down && state.workspaces.is_empty()
    }
}

#[async_trait]
impl SandboxDriver for FakeDriver {
    async fn allocate_workspace(&self, job_id: &JobId) -> Result<WorkspaceId, DriverError> {
        let mut state = self.inner.lock();
        if let Some(ws) = state.workspaces.get(job_id) {
            return Ok(*ws);
        }
        let ws = WorkspaceId::new();
        state.workspaces.insert(*job_id, ws);
        Ok(ws)
    }

    async fn spawn(&self, spec: SpawnSpec) -> Result<SandboxId, DriverError> {
        let mut state = self.inner.lock();
        if let Some(message) = state.fail_spawn.take() {
            return Err(DriverError::SpawnFailed(message));
        }
        let plan = state
            .plans
            .get(&spec.role)
            .copied()
            .unwrap_or(SpawnPlan::Exit { code: 0, after: Duration::ZERO });
        let id = SandboxId::new();
        state.sandboxes.insert(
            id,
            FakeSandbox {
                spawned_at: Instant::now(),
                plan,
                paused: false,
                stopped: false,
            },
        );
        state.spawned.push((id, spec));
        Ok(id)
    }

    async fn wait(&self, id: &SandboxId) -> Result<i32, DriverError> {
        loop {
            {
                let state = self.inner.lock();
                let sandbox = state
                    .sandboxes
                    .get(id)
                    .ok_or_else(|| DriverError::NotFound(id.to_string()))?;
                match sandbox.status(Instant::now()) {
                    SandboxStatus::Exited | SandboxStatus::Dead => {
                        return Ok(sandbox.exit_code());
                    }
                    SandboxStatus::Missing => {
                        return Err(DriverError::NotFound(id.to_string()));
                    }
                    _ => {}
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    async fn status(&self, id: &SandboxId) -> Result<SandboxStatus, DriverError> {
        let state = self.inner.lock();
        let sandbox = state
            .sandboxes
            .get(id)
            .ok_or_else(|| DriverError::NotFound(id.to_string()))?;
        Ok(sandbox.status(Instant::now()))
    }

    async fn sample(&self, id: &SandboxId) -> Result<SandboxStats, DriverError> {
        let state = self.inner.lock();
        if state.fail_sample {
            return Err(DriverError::Internal("sample failure injected".to_string()));
        }
        state
            .sandboxes
            .get(id)
            .ok_or_else(|| DriverError::NotFound(id.to_string()))?;
        Ok(state.sample)
    }

    async fn pause(&self, id: &SandboxId) -> Result<(), DriverError> {
        let mut state = self.inner.lock();
        let now = Instant::now();
        let sandbox = state
            .sandboxes
            .get_mut(id)
            .ok_or_else(|| DriverError::NotFound(id.to_string()))?;
        if sandbox.status(now) == SandboxStatus::Running {
            sandbox.paused = true;
            state.pause_log.push(*id);
        }
        Ok(())
    }

    async fn resume(&self, id: &SandboxId) -> Result<(), DriverError> {
        let mut state = self.inner.lock();
        let sandbox = state
            .sandboxes
            .get_mut(id)
            .ok_or_else(|| DriverError::NotFound(id.to_string()))?;
        if sandbox.paused {
            sandbox.paused = false;
            // Restart the plan timer so "eventually exits" holds after a freeze.
            sandbox.spawned_at = Instant::now();
            state.resume_log.push(*id);
        }
        Ok(())
    }

    async fn stop(&self, id: &SandboxId, grace: Duration) -> Result<(), DriverError> {
        let mut state = self.inner.lock();
        let now = Instant::now();
        let sandbox = state
            .sandboxes
            .get_mut(id)
            .ok_or_else(|| DriverError::NotFound(id.to_string()))?;
        let already_down = matches!(
            sandbox.status(now),
            SandboxStatus::Exited | SandboxStatus::Dead | SandboxStatus::Missing
        );
        if !already_down {
            sandbox.stopped = true;
            sandbox.paused = false;
        }
        state.stop_calls.push((*id, grace));
        Ok(())
    }

    async fn running(&self) -> Result<Vec<SandboxId>, DriverError> {
        let state = self.inner.lock();
        let now = Instant::now();
        Ok(state
            .sandboxes
            .iter()
            .filter(|(_, s)| s.status(now) == SandboxStatus::Running)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn release_workspace(&self, workspace: &WorkspaceId) -> Result<(), DriverError> {
        let mut state = self.inner.lock();
        state.workspaces.retain(|_, ws| ws != workspace);
        state.released.push(*workspace);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
