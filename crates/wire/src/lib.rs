// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod framing;
mod request;
mod response;

pub use framing::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    MAX_FRAME_LEN,
};
pub use request::Request;
pub use response::{AuditDetail, JobDetail, JobSummary, Response, TelemetryDetail};
