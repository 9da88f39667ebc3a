// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections on the control socket and translates wire requests
//! into scheduler and store operations without blocking the engine tasks.

use foundry_core::{Clock, JobId, JobStatus};
use foundry_engine::Scheduler;
use foundry_sandbox::SandboxDriver;
use foundry_storage::JobStore;
use foundry_wire::{
    read_request, write_response, AuditDetail, JobDetail, JobSummary, ProtocolError, Request,
    Response, TelemetryDetail,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Shared daemon context for all request handlers.
pub struct ListenCtx<D, C> {
    pub scheduler: Arc<Scheduler<D, C>>,
    pub store: Arc<JobStore>,
    /// Cancelled by a Shutdown request; the main task watches it.
    pub shutdown: CancellationToken,
}

/// Listener task for accepting socket connections.
pub struct Listener<D, C> {
    unix: UnixListener,
    ctx: Arc<ListenCtx<D, C>>,
}

impl<D, C> Listener<D, C>
where
    D: SandboxDriver,
    C: Clock + 'static,
{
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx<D, C>>) -> Self {
        Self { unix, ctx }
    }

    /// Run the accept loop until shutdown, spawning a task per connection.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.ctx.shutdown.cancelled() => break,
                accepted = self.unix.accept() => match accepted {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let (mut reader, mut writer) = stream.into_split();
                            handle_connection(&mut reader, &mut writer, &ctx).await;
                        });
                    }
                    Err(e) => error!(error = %e, "accept failed"),
                },
            }
        }
        debug!("listener stopped");
    }
}

/// Serve one connection: a sequence of request/response frames.
pub async fn handle_connection<D, C, R, W>(reader: &mut R, writer: &mut W, ctx: &ListenCtx<D, C>)
where
    D: SandboxDriver,
    C: Clock + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let request = match read_request(reader).await {
            Ok(request) => request,
            Err(ProtocolError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                debug!(error = %e, "dropping connection after protocol error");
                break;
            }
        };

        let response = dispatch(ctx, request).await;
        if let Err(e) = write_response(writer, &response).await {
            warn!(error = %e, "response write failed");
            break;
        }
    }
}

/// Translate one request into scheduler/store operations.
pub async fn dispatch<D, C>(ctx: &ListenCtx<D, C>, request: Request) -> Response
where
    D: SandboxDriver,
    C: Clock + 'static,
{
    match request {
        Request::Ping => Response::Pong,

        Request::SpawnJob { task, project_path } => {
            match ctx.scheduler.submit(task, project_path) {
                Ok(job_id) => Response::JobSpawned {
                    job_id: job_id.to_string(),
                    status: JobStatus::Pending,
                },
                Err(e) => Response::error(e.to_string()),
            }
        }

        Request::JobStatus { id } => {
            let job_id = JobId::from_string(&id);
            match ctx.store.job(&job_id) {
                Some(job) => {
                    let mut detail = JobDetail::from(job);
                    detail.approval = ctx.store.approval(&job_id);
                    Response::Job(detail)
                }
                None => Response::error(format!("job {id} not found")),
            }
        }

        Request::JobTelemetry { id } => {
            let job_id = JobId::from_string(&id);
            match ctx.store.job(&job_id) {
                Some(job) => Response::Telemetry(TelemetryDetail::from_sample(
                    id,
                    job.status,
                    ctx.store.latest_telemetry(&job_id),
                )),
                None => Response::error(format!("job {id} not found")),
            }
        }

        Request::JobAudit { id } => {
            let job_id = JobId::from_string(&id);
            match ctx.store.latest_audit(&job_id) {
                Some(audit) => Response::Audit(AuditDetail {
                    job_id: id,
                    report: audit.report,
                    created_at_ms: audit.created_at_ms,
                }),
                None => Response::error(format!("no audit report for job {id}")),
            }
        }

        Request::Approve { id, approved, comment } => {
            let job_id = JobId::from_string(&id);
            let result = if approved {
                ctx.scheduler.approve(&job_id).await
            } else {
                ctx.scheduler.reject(&job_id, comment).await
            };
            match result {
                Ok(()) => Response::Ack,
                Err(e) => Response::error(e.to_string()),
            }
        }

        Request::ListJobs { status, limit } => {
            let filter = match status.as_deref() {
                None => None,
                Some(s) => match JobStatus::parse(s) {
                    Some(status) => Some(status),
                    None => return Response::error(format!("unknown status {s:?}")),
                },
            };
            let jobs = ctx
                .store
                .jobs_by_recency(limit.unwrap_or(50), filter)
                .into_iter()
                .map(JobSummary::from)
                .collect();
            Response::Jobs(jobs)
        }

        // Callbacks are always acknowledged, even for unknown or terminal
        // jobs; the scheduler drops what it cannot use.
        Request::Callback { id, payload } => {
            ctx.scheduler.handle_callback(&JobId::from_string(&id), payload);
            Response::Ack
        }

        Request::Shutdown => {
            ctx.shutdown.cancel();
            Response::Ack
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
