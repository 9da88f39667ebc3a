// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::JobId;

#[test]
fn generated_ids_have_prefix_and_fixed_length() {
    let id = JobId::new();
    assert!(id.as_str().starts_with("job-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn generated_ids_are_distinct() {
    assert_ne!(JobId::new(), JobId::new());
}

#[test]
fn from_string_round_trips() {
    let id = JobId::from_string("job-abc123");
    assert_eq!(id.as_str(), "job-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn short_truncates_suffix() {
    let id = JobId::from_string("job-abcdefgh");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(100), "abcdefgh");
}

#[test]
fn id_serde_is_transparent() {
    let id = JobId::from_string("job-serde");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"job-serde\"");

    let parsed: JobId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn deserialize_rejects_oversize_ids() {
    let long = format!("\"{}\"", "x".repeat(ID_MAX_LEN + 1));
    assert!(serde_json::from_str::<JobId>(&long).is_err());
}

#[test]
fn id_compares_against_str() {
    let id = JobId::from_string("job-x");
    assert_eq!(id, "job-x");
    assert_ne!(id, "job-y");
}

#[test]
fn short_helper_truncates() {
    assert_eq!(short("abcdef", 3), "abc");
    assert_eq!(short("ab", 3), "ab");
}
