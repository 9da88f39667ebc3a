// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use foundry_core::{CallbackEnvelope, Config, FakeClock};
use foundry_engine::AdmissionGauge;
use foundry_sandbox::FakeDriver;
use std::time::Duration;

type TestCtx = ListenCtx<FakeDriver, FakeClock>;

struct Harness {
    ctx: Arc<TestCtx>,
    driver: FakeDriver,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JobStore::open(dir.path()).unwrap());
    let driver = FakeDriver::new();
    let config = Config { drain_timeout_secs: 1, ..Config::default() };
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::new(driver.clone()),
        AdmissionGauge::new(),
        config,
        FakeClock::new(),
    ));
    tokio::spawn(Arc::clone(&scheduler).run());
    let ctx = Arc::new(ListenCtx {
        scheduler,
        store,
        shutdown: CancellationToken::new(),
    });
    Harness { ctx, driver, _dir: dir }
}

async fn wait_for(ctx: &TestCtx, id: &str, status: JobStatus) {
    let job_id = JobId::from_string(id);
    for _ in 0..600 {
        if ctx.store.job(&job_id).map(|j| j.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for {status}");
}

async fn spawn_job(ctx: &TestCtx) -> String {
    let response = dispatch(
        ctx,
        Request::SpawnJob { task: "write hello".into(), project_path: "/tmp/p".into() },
    )
    .await;
    match response {
        Response::JobSpawned { job_id, status } => {
            assert_eq!(status, JobStatus::Pending);
            job_id
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn ping_pongs() {
    let h = harness();
    assert_eq!(dispatch(&h.ctx, Request::Ping).await, Response::Pong);
}

#[tokio::test(start_paused = true)]
async fn spawn_creates_a_pending_job() {
    let h = harness();
    let id = spawn_job(&h.ctx).await;
    assert_eq!(h.ctx.store.job(&JobId::from_string(&id)).unwrap().status, JobStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn empty_spawn_is_an_error() {
    let h = harness();
    let response = dispatch(
        &h.ctx,
        Request::SpawnJob { task: "".into(), project_path: "/tmp/p".into() },
    )
    .await;
    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test(start_paused = true)]
async fn status_of_unknown_job_is_an_error() {
    let h = harness();
    let response = dispatch(&h.ctx, Request::JobStatus { id: "job-ghost".into() }).await;
    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test(start_paused = true)]
async fn full_review_cycle_over_dispatch() {
    let h = harness();
    let id = spawn_job(&h.ctx).await;
    wait_for(&h.ctx, &id, JobStatus::AwaitingApproval).await;

    let response =
        dispatch(&h.ctx, Request::Approve { id: id.clone(), approved: true, comment: None }).await;
    assert_eq!(response, Response::Ack);

    match dispatch(&h.ctx, Request::JobStatus { id: id.clone() }).await {
        Response::Job(detail) => {
            assert_eq!(detail.status, JobStatus::Completed);
            assert!(detail.approval.is_some());
        }
        other => panic!("unexpected response: {other:?}"),
    }
    assert!(h.driver.leak_free());
}

#[tokio::test(start_paused = true)]
async fn approving_a_pending_job_reports_invalid_state() {
    let h = harness();
    // Submit but keep the queue from dispatching by approving right away;
    // admission has not run inside this paused test yet.
    let id = spawn_job(&h.ctx).await;
    let response =
        dispatch(&h.ctx, Request::Approve { id, approved: true, comment: None }).await;
    match response {
        Response::Error { message } => assert!(message.contains("invalid state")),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn callbacks_are_always_acked() {
    let h = harness();
    let response = dispatch(
        &h.ctx,
        Request::Callback { id: "job-ghost".into(), payload: CallbackEnvelope::completed() },
    )
    .await;
    assert_eq!(response, Response::Ack);
}

#[tokio::test(start_paused = true)]
async fn telemetry_endpoint_serves_latest_sample() {
    let h = harness();
    let id = spawn_job(&h.ctx).await;
    wait_for(&h.ctx, &id, JobStatus::Building).await;

    dispatch(
        &h.ctx,
        Request::Callback {
            id: id.clone(),
            payload: CallbackEnvelope {
                current_tool: Some("pytest".into()),
                cpu_usage: Some(12.0),
                ram_usage_mb: Some(128.0),
                ..Default::default()
            },
        },
    )
    .await;

    match dispatch(&h.ctx, Request::JobTelemetry { id }).await {
        Response::Telemetry(detail) => {
            assert_eq!(detail.current_tool.as_deref(), Some("pytest"));
            assert_eq!(detail.cpu_percent, 12.0);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn audit_endpoint_404s_without_report() {
    let h = harness();
    let id = spawn_job(&h.ctx).await;
    let response = dispatch(&h.ctx, Request::JobAudit { id: id.clone() }).await;
    assert!(matches!(response, Response::Error { .. }));

    wait_for(&h.ctx, &id, JobStatus::Building).await;
    dispatch(
        &h.ctx,
        Request::Callback {
            id: id.clone(),
            payload: CallbackEnvelope {
                audit_report: Some(serde_json::json!({"ok": true})),
                ..Default::default()
            },
        },
    )
    .await;

    match dispatch(&h.ctx, Request::JobAudit { id }).await {
        Response::Audit(detail) => assert_eq!(detail.report, serde_json::json!({"ok": true})),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn list_jobs_filters_by_status() {
    let h = harness();
    let first = spawn_job(&h.ctx).await;
    wait_for(&h.ctx, &first, JobStatus::AwaitingApproval).await;
    let second = spawn_job(&h.ctx).await;

    match dispatch(
        &h.ctx,
        Request::ListJobs { status: Some("pending".into()), limit: None },
    )
    .await
    {
        Response::Jobs(jobs) => {
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].job_id, second);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let response =
        dispatch(&h.ctx, Request::ListJobs { status: Some("bogus".into()), limit: None }).await;
    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test(start_paused = true)]
async fn shutdown_request_cancels_the_token() {
    let h = harness();
    assert_eq!(dispatch(&h.ctx, Request::Shutdown).await, Response::Ack);
    assert!(h.ctx.shutdown.is_cancelled());
}
