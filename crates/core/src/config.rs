// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! Loaded from a `foundry.toml` file into one value object that every
//! component receives by reference. There is no module-level configuration
//! state anywhere in the workspace.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Concurrency ceiling for in-flight jobs.
    pub max_concurrent: usize,
    /// Per-stage wall-clock budget in seconds.
    pub stage_timeout_secs: u64,
    /// Grace window handed to `stop(handle, grace)` in seconds.
    pub stop_grace_secs: u64,
    /// Sleep after re-enqueueing a job because the cap is reached.
    pub admit_backoff_secs: u64,
    /// Sleep after re-enqueueing a job because the sentinel is not GREEN.
    pub load_backoff_secs: u64,
    /// How long shutdown waits for in-flight supervisors before force-cancel.
    pub drain_timeout_secs: u64,
    /// Cadence of the supervisor's sandbox status poll.
    pub exit_poll_secs: u64,
    pub sampler: SamplerConfig,
    pub sentinel: SentinelConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Seconds between sandbox telemetry samples.
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SentinelConfig {
    /// Host-load percent at which admission stops.
    pub yellow_threshold: f64,
    /// Host-load percent at which running sandboxes are paused.
    pub red_threshold: f64,
    /// Seconds between host samples.
    pub poll_interval_secs: u64,
}

/// Per-role sandbox profiles for the local driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    pub builder: RoleProfile,
    pub checker: RoleProfile,
}

/// How the driver runs one agent role.
///
/// The resource caps are the driver's contract; the scheduler never
/// re-enforces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoleProfile {
    /// Command the driver executes for this role.
    pub command: String,
    /// CPU share, in cores.
    pub cpu_limit: f64,
    /// Memory ceiling in megabytes.
    pub memory_limit_mb: u64,
    /// Network policy label, opaque to the core.
    pub network: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            stage_timeout_secs: 600,
            stop_grace_secs: 10,
            admit_backoff_secs: 5,
            load_backoff_secs: 10,
            drain_timeout_secs: 30,
            exit_poll_secs: 2,
            sampler: SamplerConfig::default(),
            sentinel: SentinelConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self { yellow_threshold: 80.0, red_threshold: 90.0, poll_interval_secs: 5 }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            builder: RoleProfile {
                command: "foundry-builder".to_string(),
                cpu_limit: 2.0,
                memory_limit_mb: 2048,
                network: "bridge".to_string(),
            },
            checker: RoleProfile {
                command: "foundry-checker".to_string(),
                cpu_limit: 1.0,
                memory_limit_mb: 1024,
                network: "bridge".to_string(),
            },
        }
    }
}

impl Default for RoleProfile {
    fn default() -> Self {
        Self {
            command: String::new(),
            cpu_limit: 1.0,
            memory_limit_mb: 1024,
            network: "bridge".to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid("max_concurrent must be at least 1".into()));
        }
        if self.sentinel.yellow_threshold > self.sentinel.red_threshold {
            return Err(ConfigError::Invalid(format!(
                "sentinel.yellow_threshold ({}) must not exceed red_threshold ({})",
                self.sentinel.yellow_threshold, self.sentinel.red_threshold
            )));
        }
        if self.stage_timeout_secs == 0 {
            return Err(ConfigError::Invalid("stage_timeout_secs must be non-zero".into()));
        }
        Ok(())
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn admit_backoff(&self) -> Duration {
        Duration::from_secs(self.admit_backoff_secs)
    }

    pub fn load_backoff(&self) -> Duration {
        Duration::from_secs(self.load_backoff_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn exit_poll(&self) -> Duration {
        Duration::from_secs(self.exit_poll_secs)
    }

    pub fn sampler_interval(&self) -> Duration {
        Duration::from_secs(self.sampler.interval_secs)
    }

    pub fn sentinel_poll(&self) -> Duration {
        Duration::from_secs(self.sentinel.poll_interval_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
