// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foundry-sandbox: the sandbox driver abstraction.
//!
//! The scheduler talks to isolated workers only through the [`SandboxDriver`]
//! trait: allocate a workspace, spawn a role into it, supervise, sample,
//! pause/resume/stop, release. A container runtime is one possible backend;
//! the in-tree [`LocalDriver`] supervises plain child processes.

mod driver;
mod local;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use driver::{DriverError, SandboxDriver, SandboxStats, SandboxStatus, SpawnSpec};
pub use local::LocalDriver;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeDriver, SpawnPlan};
