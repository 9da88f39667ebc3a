// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host sentinel: samples host pressure and gates admission.
//!
//! Publishes a GREEN/YELLOW/RED level through an [`AdmissionGauge`] the
//! scheduler reads before admitting work. Entering RED pauses every
//! running sandbox; the following return to GREEN resumes the handles
//! remembered from that sweep. YELLOW only gates admission.

use foundry_core::{SandboxId, SentinelConfig};
use foundry_sandbox::{DriverError, SandboxDriver, SandboxStatus};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use sysinfo::System;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("host sample failed: {0}")]
    Unavailable(String),
}

/// Host pressure snapshot; `load` is the max of the two percentages.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostStats {
    pub cpu_percent: f64,
    pub mem_percent: f64,
}

impl HostStats {
    pub fn load(&self) -> f64 {
        self.cpu_percent.max(self.mem_percent)
    }
}

/// Something that can measure host CPU/memory pressure.
pub trait HostSampler: Send + 'static {
    fn sample(&mut self) -> Result<HostStats, SampleError>;
}

/// Production sampler backed by sysinfo.
///
/// CPU usage needs two refreshes to produce a delta; the sentinel's poll
/// cadence provides them.
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self { system: System::new() }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler for SysinfoSampler {
    fn sample(&mut self) -> Result<HostStats, SampleError> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(SampleError::Unavailable("no memory information".to_string()));
        }
        Ok(HostStats {
            cpu_percent: self.system.global_cpu_usage() as f64,
            mem_percent: self.system.used_memory() as f64 / total as f64 * 100.0,
        })
    }
}

/// Scripted sampler for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeSampler {
    inner: Arc<Mutex<(HostStats, bool)>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeSampler {
    pub fn new(cpu_percent: f64, mem_percent: f64) -> Self {
        Self { inner: Arc::new(Mutex::new((HostStats { cpu_percent, mem_percent }, false))) }
    }

    pub fn set(&self, cpu_percent: f64, mem_percent: f64) {
        self.inner.lock().0 = HostStats { cpu_percent, mem_percent };
    }

    pub fn fail(&self, fail: bool) {
        self.inner.lock().1 = fail;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl HostSampler for FakeSampler {
    fn sample(&mut self) -> Result<HostStats, SampleError> {
        let (stats, fail) = *self.inner.lock();
        if fail {
            return Err(SampleError::Unavailable("sample failure injected".to_string()));
        }
        Ok(stats)
    }
}

/// Global admission level published by the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdmissionLevel {
    /// Normal operation.
    Green = 0,
    /// High usage: stop admitting new jobs, in-flight continue.
    Yellow = 1,
    /// Critical: every running sandbox is paused.
    Red = 2,
}

foundry_core::simple_display! {
    AdmissionLevel {
        Green => "green",
        Yellow => "yellow",
        Red => "red",
    }
}

impl AdmissionLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            2 => AdmissionLevel::Red,
            1 => AdmissionLevel::Yellow,
            _ => AdmissionLevel::Green,
        }
    }
}

struct GaugeInner {
    level: AtomicU8,
    stats: RwLock<HostStats>,
}

/// Atomically-readable admission level + host stats snapshot.
///
/// This handle is the only sentinel surface the scheduler sees.
#[derive(Clone)]
pub struct AdmissionGauge {
    inner: Arc<GaugeInner>,
}

impl Default for AdmissionGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionGauge {
    /// Starts GREEN with empty stats.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GaugeInner {
                level: AtomicU8::new(AdmissionLevel::Green as u8),
                stats: RwLock::new(HostStats::default()),
            }),
        }
    }

    pub fn level(&self) -> AdmissionLevel {
        AdmissionLevel::from_u8(self.inner.level.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> HostStats {
        *self.inner.stats.read()
    }

    fn publish(&self, level: AdmissionLevel, stats: HostStats) {
        *self.inner.stats.write() = stats;
        self.inner.level.store(level as u8, Ordering::Release);
    }

    /// Force a level without a sentinel, for tests.
    #[cfg(any(test, feature = "test-support"))]
    pub fn force(&self, level: AdmissionLevel) {
        self.inner.level.store(level as u8, Ordering::Release);
    }
}

/// Continuous host monitor owning the RED pause/resume sweeps.
pub struct HostSentinel<D> {
    driver: Arc<D>,
    config: SentinelConfig,
    gauge: AdmissionGauge,
    /// Handles paused by the last RED entry, resumed on the next GREEN.
    paused: Mutex<Vec<SandboxId>>,
    shutdown: CancellationToken,
}

impl<D: SandboxDriver> HostSentinel<D> {
    pub fn new(driver: Arc<D>, config: SentinelConfig) -> Self {
        Self {
            driver,
            config,
            gauge: AdmissionGauge::new(),
            paused: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// The read-only handle shared with the scheduler.
    pub fn gauge(&self) -> AdmissionGauge {
        self.gauge.clone()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Sampling loop. Sampling failure is non-fatal: log, keep the
    /// previous level, try again next tick.
    pub async fn run<S: HostSampler>(self: Arc<Self>, mut sampler: S) {
        let poll = std::time::Duration::from_secs(self.config.poll_interval_secs);
        info!(
            yellow = self.config.yellow_threshold,
            red = self.config.red_threshold,
            poll_secs = poll.as_secs(),
            "sentinel started"
        );
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(poll) => {}
            }
            match sampler.sample() {
                Ok(stats) => self.observe(stats).await,
                Err(e) => warn!(error = %e, level = %self.gauge.level(), "host sample failed, keeping level"),
            }
        }
        debug!("sentinel stopped");
    }

    /// Apply one host observation: transition the level and run the
    /// RED-entry pause sweep or GREEN-return resume sweep.
    pub async fn observe(&self, stats: HostStats) {
        let load = stats.load();
        let current = self.gauge.level();

        let next = if load >= self.config.red_threshold {
            AdmissionLevel::Red
        } else if load < self.config.yellow_threshold {
            AdmissionLevel::Green
        } else {
            // Between the thresholds: GREEN degrades to YELLOW, RED holds
            // until the host drops below the yellow threshold.
            match current {
                AdmissionLevel::Green => AdmissionLevel::Yellow,
                held => held,
            }
        };

        self.gauge.publish(next, stats);

        if next != current {
            info!(
                from = %current,
                to = %next,
                cpu = stats.cpu_percent,
                mem = stats.mem_percent,
                "admission level changed"
            );
        }

        if next == AdmissionLevel::Red && current != AdmissionLevel::Red {
            self.pause_running().await;
        } else if current == AdmissionLevel::Red && next == AdmissionLevel::Green {
            self.resume_remembered().await;
        }
    }

    async fn pause_running(&self) {
        let running = match self.driver.running().await {
            Ok(running) => running,
            Err(e) => {
                warn!(error = %e, "could not enumerate sandboxes for RED pause");
                return;
            }
        };

        let mut remembered = Vec::new();
        for id in running {
            match self.driver.pause(&id).await {
                Ok(()) => remembered.push(id),
                Err(e) => warn!(sandbox = %id, error = %e, "pause failed"),
            }
        }
        info!(count = remembered.len(), "paused sandboxes under RED alert");
        *self.paused.lock() = remembered;
    }

    async fn resume_remembered(&self) {
        let remembered: Vec<SandboxId> = std::mem::take(&mut *self.paused.lock());
        if remembered.is_empty() {
            return;
        }
        info!(count = remembered.len(), "resuming sandboxes paused under RED alert");

        for id in remembered {
            match self.driver.status(&id).await {
                Ok(SandboxStatus::Paused) => {
                    if let Err(e) = self.driver.resume(&id).await {
                        warn!(sandbox = %id, error = %e, "resume failed");
                    }
                }
                // Gone in the meantime: tolerated.
                Ok(SandboxStatus::Missing) | Err(DriverError::NotFound(_)) => {
                    debug!(sandbox = %id, "paused sandbox no longer exists");
                }
                Ok(_) => {}
                Err(e) => warn!(sandbox = %id, error = %e, "status check before resume failed"),
            }
        }
    }
}

#[cfg(test)]
#[path = "sentinel_tests.rs"]
mod tests;
