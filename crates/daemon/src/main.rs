// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `foundryd`: the Foundry orchestrator daemon.

use foundry_core::{Config, SystemClock};
use foundry_daemon::{env, lifecycle, ListenCtx, Listener};
use foundry_engine::{HostSentinel, Scheduler, SysinfoSampler};
use foundry_sandbox::LocalDriver;
use foundry_storage::JobStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SENTINEL_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("foundryd: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), lifecycle::LifecycleError> {
    let state_dir = env::state_dir()?;
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| lifecycle::LifecycleError::Io(format!("create {}: {e}", state_dir.display())))?;

    let appender = tracing_appender::rolling::daily(env::log_dir(&state_dir), "foundryd.log");
    let (writer, _log_guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env::log_filter()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let _lock = lifecycle::acquire_lock(&state_dir)?;

    let config_path = env::config_path(&state_dir);
    let config = if config_path.is_file() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };
    info!(state_dir = %state_dir.display(), max_concurrent = config.max_concurrent, "foundryd starting");

    let store = Arc::new(JobStore::open(&state_dir.join("store"))?);
    let clock = SystemClock;
    let orphaned = lifecycle::reconcile_orphans(store.as_ref(), &clock);
    if orphaned > 0 {
        warn!(orphaned, "failed jobs left behind by an unclean shutdown");
    }

    let driver = Arc::new(LocalDriver::new(&state_dir, config.sandbox.clone()));
    let sentinel = Arc::new(HostSentinel::new(Arc::clone(&driver), config.sentinel.clone()));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&driver),
        sentinel.gauge(),
        config,
        clock,
    ));

    let sentinel_task = tokio::spawn(Arc::clone(&sentinel).run(SysinfoSampler::new()));
    let scheduler_task = tokio::spawn(Arc::clone(&scheduler).run());

    let socket_path = env::socket_path(&state_dir);
    let _ = std::fs::remove_file(&socket_path);
    let unix = UnixListener::bind(&socket_path)
        .map_err(|e| lifecycle::LifecycleError::Io(format!("bind {}: {e}", socket_path.display())))?;
    info!(socket = %socket_path.display(), "listening");

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(ListenCtx {
        scheduler: Arc::clone(&scheduler),
        store: Arc::clone(&store),
        shutdown: shutdown.clone(),
    });
    let listener_task = tokio::spawn(Listener::new(unix, ctx).run());

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| lifecycle::LifecycleError::Io(format!("sigterm handler: {e}")))?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
        _ = sigterm.recv() => info!("terminate received"),
        _ = shutdown.cancelled() => info!("shutdown requested over the wire"),
    }

    // Ordered shutdown: admission loop and supervisors first, the sentinel
    // after them, the store checkpoint last.
    shutdown.cancel();
    scheduler.stop().await;
    let _ = scheduler_task.await;

    sentinel.stop();
    if tokio::time::timeout(SENTINEL_JOIN_TIMEOUT, sentinel_task).await.is_err() {
        warn!("sentinel ignored shutdown within its deadline");
    }
    let _ = listener_task.await;

    if let Err(e) = store.checkpoint() {
        warn!(error = %e, "final checkpoint failed");
    }
    let _ = std::fs::remove_file(&socket_path);
    info!("foundryd stopped");
    Ok(())
}
