// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use foundry_core::ApprovalDecision;
use yare::parameterized;

fn store(dir: &tempfile::TempDir) -> JobStore {
    JobStore::open(dir.path()).unwrap()
}

fn submit(store: &JobStore, id: &str, at_ms: u64) -> JobId {
    let job_id = JobId::from_string(id);
    store.create_job(Job::new(job_id, "write hello", "/tmp/project", at_ms)).unwrap();
    job_id
}

#[test]
fn create_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let id = submit(&store, "job-1", 1_000);

    let job = store.job(&id).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.task, "write hello");
    assert_eq!(job.created_at_ms, 1_000);
}

#[test]
fn duplicate_create_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    submit(&store, "job-1", 1_000);

    let err = store
        .create_job(Job::new(JobId::from_string("job-1"), "again", "/p", 2_000))
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
}

#[test]
fn full_happy_status_chain() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let id = submit(&store, "job-1", 1_000);

    for status in [
        JobStatus::Building,
        JobStatus::Checking,
        JobStatus::AwaitingApproval,
        JobStatus::Approved,
        JobStatus::Completed,
    ] {
        store.update_status(&id, status, None, 2_000).unwrap();
    }

    let job = store.job(&id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_at_ms, Some(2_000));
}

#[parameterized(
    pending_to_checking = { JobStatus::Pending, JobStatus::Checking },
    pending_to_completed = { JobStatus::Pending, JobStatus::Completed },
    building_to_approved = { JobStatus::Building, JobStatus::Approved },
)]
fn invalid_transitions_are_rejected(from: JobStatus, to: JobStatus) {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let id = submit(&store, "job-1", 1_000);
    if from != JobStatus::Pending {
        store.update_status(&id, from, None, 1_100).unwrap();
    }

    let err = store.update_status(&id, to, None, 1_200).unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
    assert_eq!(store.job(&id).unwrap().status, from);
}

#[test]
fn terminal_status_is_write_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let id = submit(&store, "job-1", 1_000);
    store.update_status(&id, JobStatus::Building, None, 1_100).unwrap();
    store.update_status(&id, JobStatus::Failed, Some("exit code 2".into()), 1_200).unwrap();

    for status in [JobStatus::Building, JobStatus::Completed, JobStatus::Failed] {
        assert!(store.update_status(&id, status, None, 1_300).is_err());
    }
    let job = store.job(&id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.completed_at_ms, Some(1_200));
    assert_eq!(job.error.as_deref(), Some("exit code 2"));
}

#[test]
fn unknown_job_updates_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let err = store
        .update_status(&JobId::from_string("job-x"), JobStatus::Building, None, 1_000)
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn sandbox_and_workspace_are_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let id = submit(&store, "job-1", 1_000);

    store.record_sandbox(&id, SandboxRole::Builder, SandboxId::from_string("sbx-b")).unwrap();
    store.record_sandbox(&id, SandboxRole::Checker, SandboxId::from_string("sbx-c")).unwrap();
    store.record_workspace(&id, WorkspaceId::from_string("wks-1")).unwrap();

    let job = store.job(&id).unwrap();
    assert_eq!(job.builder_sandbox, Some(SandboxId::from_string("sbx-b")));
    assert_eq!(job.checker_sandbox, Some(SandboxId::from_string("sbx-c")));
    assert_eq!(job.workspace_id, Some(WorkspaceId::from_string("wks-1")));
}

#[test]
fn telemetry_appends_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let id = submit(&store, "job-1", 1_000);

    for at_ms in [1_100, 1_200, 1_300] {
        store
            .append_telemetry(TelemetrySample {
                job_id: id,
                at_ms,
                cpu_percent: 10.0,
                memory_mb: 100.0,
                current_tool: None,
                sandbox_id: None,
            })
            .unwrap();
    }

    let rows = store.telemetry(&id);
    assert_eq!(rows.len(), 3);
    assert_eq!(store.latest_telemetry(&id).unwrap().at_ms, 1_300);
}

#[test]
fn latest_audit_wins() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let id = submit(&store, "job-1", 1_000);

    for (at_ms, score) in [(1_100, 50), (1_200, 90)] {
        store
            .append_audit(AuditReport {
                job_id: id,
                report: serde_json::json!({ "score": score }),
                created_at_ms: at_ms,
            })
            .unwrap();
    }

    let latest = store.latest_audit(&id).unwrap();
    assert_eq!(latest.report, serde_json::json!({ "score": 90 }));
}

#[test]
fn approval_record_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let id = submit(&store, "job-1", 1_000);

    store
        .record_approval(ApprovalRecord {
            job_id: id,
            decision: ApprovalDecision::Rejected,
            comment: Some("not good enough".into()),
            resolved_at_ms: 2_000,
        })
        .unwrap();

    let approval = store.approval(&id).unwrap();
    assert_eq!(approval.decision, ApprovalDecision::Rejected);
    assert_eq!(approval.comment.as_deref(), Some("not good enough"));
}

#[test]
fn rows_for_unknown_jobs_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let sample = TelemetrySample {
        job_id: JobId::from_string("job-x"),
        at_ms: 1_000,
        cpu_percent: 0.0,
        memory_mb: 0.0,
        current_tool: None,
        sandbox_id: None,
    };
    assert!(matches!(store.append_telemetry(sample), Err(StoreError::NotFound(_))));
}

#[test]
fn list_is_recency_ordered_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let a = submit(&store, "job-a", 1_000);
    let _b = submit(&store, "job-b", 2_000);
    let c = submit(&store, "job-c", 3_000);
    store.update_status(&a, JobStatus::Building, None, 3_500).unwrap();

    let all = store.jobs_by_recency(10, None);
    assert_eq!(all[0].id, c);
    assert_eq!(all.len(), 3);

    let pending = store.jobs_by_recency(10, Some(JobStatus::Pending));
    assert_eq!(pending.len(), 2);

    let limited = store.jobs_by_recency(1, None);
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, c);
}

#[test]
fn reopen_replays_wal() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = store(&dir);
        let id = submit(&store, "job-1", 1_000);
        store.update_status(&id, JobStatus::Building, None, 1_100).unwrap();
    }

    let reopened = JobStore::open(dir.path()).unwrap();
    let job = reopened.job(&JobId::from_string("job-1")).unwrap();
    assert_eq!(job.status, JobStatus::Building);
}

#[test]
fn checkpoint_then_reopen_preserves_state() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = store(&dir);
        let id = submit(&store, "job-1", 1_000);
        store.update_status(&id, JobStatus::Building, None, 1_100).unwrap();
        store.checkpoint().unwrap();
        // Post-checkpoint mutation lands in the fresh WAL.
        store.update_status(&id, JobStatus::Checking, None, 1_200).unwrap();
    }

    let reopened = JobStore::open(dir.path()).unwrap();
    let job = reopened.job(&JobId::from_string("job-1")).unwrap();
    assert_eq!(job.status, JobStatus::Checking);
}

#[test]
fn non_terminal_jobs_are_listed() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let a = submit(&store, "job-a", 1_000);
    let b = submit(&store, "job-b", 2_000);
    store.update_status(&a, JobStatus::Failed, None, 3_000).unwrap();

    // job-a went pending -> failed, job-b is still pending
    let open: Vec<JobId> = store.non_terminal_jobs().into_iter().map(|j| j.id).collect();
    assert_eq!(open, vec![b]);
}
