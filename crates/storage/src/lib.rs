// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foundry-storage: durable record of jobs and their append-only logs.
//!
//! The store is event-sourced: every mutation appends a [`StoreEvent`] to a
//! JSONL write-ahead log and applies it to materialized in-memory state
//! under one lock. A zstd-compressed snapshot is checkpointed on clean
//! shutdown so startup replays only the WAL tail.

mod event;
mod snapshot;
mod state;
mod store;
mod wal;

pub use event::StoreEvent;
pub use snapshot::{Snapshot, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use store::{JobStore, StoreError};
pub use wal::Wal;
