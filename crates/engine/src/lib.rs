// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foundry-engine: the job scheduler and lifecycle manager.
//!
//! Three cooperating pieces:
//! - [`HostSentinel`] samples the host and publishes a GREEN/YELLOW/RED
//!   admission level, pausing sandboxes under RED.
//! - [`SignalRegistry`] is the per-job callback bus carrying one-shot
//!   error/complete signals from agents.
//! - [`Scheduler`] admits queued jobs, drives each through the
//!   builder → checker pipeline, gates commits on human approval, and
//!   guarantees resource cleanup on every exit path.

mod bus;
mod error;
mod pipeline;
mod scheduler;
mod sentinel;

pub use bus::{JobSignals, SignalRegistry};
pub use error::EngineError;
pub use scheduler::Scheduler;
pub use sentinel::{
    AdmissionGauge, AdmissionLevel, HostSampler, HostSentinel, HostStats, SampleError,
    SysinfoSampler,
};

#[cfg(any(test, feature = "test-support"))]
pub use sentinel::FakeSampler;
