// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::driver::SpawnSpec;
use foundry_core::SandboxConfig;

fn test_config(builder_cmd: &str, checker_cmd: &str) -> SandboxConfig {
    let mut config = SandboxConfig::default();
    config.builder.command = builder_cmd.to_string();
    config.checker.command = checker_cmd.to_string();
    config
}

fn driver(dir: &tempfile::TempDir, builder_cmd: &str) -> LocalDriver {
    LocalDriver::new(dir.path(), test_config(builder_cmd, "true"))
}

#[tokio::test]
async fn allocate_workspace_is_idempotent_and_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(&dir, "true");
    let job = JobId::from_string("job-local");

    let first = driver.allocate_workspace(&job).await.unwrap();
    let second = driver.allocate_workspace(&job).await.unwrap();
    assert_eq!(first, second);
    assert!(dir.path().join("workspaces").join(first.as_str()).is_dir());
}

#[tokio::test]
async fn release_workspace_removes_dir_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(&dir, "true");
    let job = JobId::from_string("job-local");
    let ws = driver.allocate_workspace(&job).await.unwrap();
    let path = dir.path().join("workspaces").join(ws.as_str());

    driver.release_workspace(&ws).await.unwrap();
    assert!(!path.exists());
    driver.release_workspace(&ws).await.unwrap();
}

#[tokio::test]
async fn spawn_and_wait_reports_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(&dir, "exit 7");
    let job = JobId::from_string("job-local");
    let ws = driver.allocate_workspace(&job).await.unwrap();

    let id = driver
        .spawn(SpawnSpec::new(SandboxRole::Builder, job, ws).task("t").callback("cb"))
        .await
        .unwrap();

    assert_eq!(driver.wait(&id).await.unwrap(), 7);
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Exited);
}

#[tokio::test]
async fn stop_terminates_within_grace() {
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(&dir, "sleep 30");
    let job = JobId::from_string("job-local");
    let ws = driver.allocate_workspace(&job).await.unwrap();

    let id = driver
        .spawn(SpawnSpec::new(SandboxRole::Builder, job, ws))
        .await
        .unwrap();
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Running);

    driver.stop(&id, Duration::from_secs(5)).await.unwrap();
    let status = driver.status(&id).await.unwrap();
    assert!(matches!(status, SandboxStatus::Exited | SandboxStatus::Dead));

    // stop after exit is a no-op
    driver.stop(&id, Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn pause_and_resume_track_status() {
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(&dir, "sleep 30");
    let job = JobId::from_string("job-local");
    let ws = driver.allocate_workspace(&job).await.unwrap();
    let id = driver
        .spawn(SpawnSpec::new(SandboxRole::Builder, job, ws))
        .await
        .unwrap();

    driver.pause(&id).await.unwrap();
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Paused);
    assert!(driver.running().await.unwrap().is_empty());

    driver.resume(&id).await.unwrap();
    assert_eq!(driver.status(&id).await.unwrap(), SandboxStatus::Running);
    assert_eq!(driver.running().await.unwrap(), vec![id]);

    driver.stop(&id, Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn unknown_sandbox_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(&dir, "true");
    let missing = SandboxId::from_string("sbx-nope");
    assert!(matches!(driver.status(&missing).await, Err(DriverError::NotFound(_))));
}
