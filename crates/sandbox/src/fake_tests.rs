// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::driver::SpawnSpec;
use std::time::Duration;

fn spec(driver_ws: WorkspaceId, role: SandboxRole) -> SpawnSpec {
    SpawnSpec::new(role, JobId::from_string("job-fake"), driver_ws).task("do things")
}

#[tokio::test(start_paused = true)]
async fn planned_exit_fires_after_delay() {
    let driver = FakeDriver::new();
    let job = JobId::from_string("job-fake");
    let ws = driver.allocate_workspace(&job).await.unwrap();
    driver.set_plan(SandboxRole::Builder, SpawnPlan::Exit { code: 2, after: Duration::from_secs(1) });

    let id = driver.spawn(spec(ws, SandboxRole::Builder)).await.unwrap();
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Running);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Exited);
    assert_eq!(driver.wait(&id).await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn allocate_workspace_is_idempotent() {
    let driver = FakeDriver::new();
    let job = JobId::from_string("job-fake");
    let first = driver.allocate_workspace(&job).await.unwrap();
    let second = driver.allocate_workspace(&job).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn stop_records_once_per_effective_stop() {
    let driver = FakeDriver::new();
    let job = JobId::from_string("job-fake");
    let ws = driver.allocate_workspace(&job).await.unwrap();
    driver.set_plan(SandboxRole::Builder, SpawnPlan::Never);
    let id = driver.spawn(spec(ws, SandboxRole::Builder)).await.unwrap();

    driver.stop(&id, Duration::from_secs(10)).await.unwrap();
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Exited);
    assert_eq!(driver.wait(&id).await.unwrap(), 143);

    // Second stop is a no-op: still exited, same stop code.
    driver.stop(&id, Duration::from_secs(10)).await.unwrap();
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Exited);
    assert_eq!(driver.wait(&id).await.unwrap(), 143);
    assert_eq!(driver.stopped(), vec![id]);
    assert_eq!(driver.stop_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_planned_exit() {
    let driver = FakeDriver::new();
    let job = JobId::from_string("job-fake");
    let ws = driver.allocate_workspace(&job).await.unwrap();
    let id = driver.spawn(spec(ws, SandboxRole::Builder)).await.unwrap();

    driver.pause(&id).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Paused);

    driver.resume(&id).await.unwrap();
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Running);
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Exited);
}

#[tokio::test(start_paused = true)]
async fn vanish_reports_missing() {
    let driver = FakeDriver::new();
    let job = JobId::from_string("job-fake");
    let ws = driver.allocate_workspace(&job).await.unwrap();
    driver.set_plan(SandboxRole::Builder, SpawnPlan::Vanish { after: Duration::from_secs(1) });
    let id = driver.spawn(spec(ws, SandboxRole::Builder)).await.unwrap();

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Missing);
    assert!(driver.wait(&id).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn running_lists_only_live_sandboxes() {
    let driver = FakeDriver::new();
    let job = JobId::from_string("job-fake");
    let ws = driver.allocate_workspace(&job).await.unwrap();
    driver.set_plan(SandboxRole::Builder, SpawnPlan::Never);
    driver.set_plan(SandboxRole::Checker, SpawnPlan::Exit { code: 0, after: Duration::ZERO });

    let live = driver.spawn(spec(ws, SandboxRole::Builder)).await.unwrap();
    let done = driver.spawn(spec(ws, SandboxRole::Checker)).await.unwrap();

    let running = driver.running().await.unwrap();
    assert_eq!(running, vec![live]);
    assert_ne!(running, vec![done]);
}

#[tokio::test(start_paused = true)]
async fn leak_free_tracks_workspaces_and_sandboxes() {
    let driver = FakeDriver::new();
    let job = JobId::from_string("job-fake");
    let ws = driver.allocate_workspace(&job).await.unwrap();
    driver.set_plan(SandboxRole::Builder, SpawnPlan::Never);
    let id = driver.spawn(spec(ws, SandboxRole::Builder)).await.unwrap();

    assert!(!driver.leak_free());
    driver.stop(&id, Duration::from_secs(1)).await.unwrap();
    assert!(!driver.leak_free());
    driver.release_workspace(&ws).await.unwrap();
    assert!(driver.leak_free());
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_is_one_shot() {
    let driver = FakeDriver::new();
    let job = JobId::from_string("job-fake");
    let ws = driver.allocate_workspace(&job).await.unwrap();
    driver.fail_next_spawn("no capacity");

    let err = driver.spawn(spec(ws, SandboxRole::Builder)).await.unwrap_err();
    assert!(matches!(err, DriverError::SpawnFailed(_)));
    assert!(driver.spawn(spec(ws, SandboxRole::Builder)).await.is_ok());
}
