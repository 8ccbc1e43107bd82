//! Status poller.
//!
//! One poll task per [`PollLease`]. Each tick fetches the job status,
//! classifies the reply into a [`Transition`] and hands it to a
//! [`TickHandler`], which decides whether the lease stays alive. Ticks are
//! strictly sequential: the next delay starts only after the previous
//! reply has been handled, so a lease never has two requests in flight.

use std::sync::Arc;
use std::time::Duration;

use limefrog_core::job_status::JobStatusSnapshot;
use limefrog_core::types::JobHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{JobService, StatusReply};
use crate::lease::{LeaseId, PollLease};

/// Reference cadence between status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// What one tick learned about the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Snapshot(JobStatusSnapshot),
    /// The service does not know the job.
    Gone,
}

/// Whether the poll loop should keep going after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickVerdict {
    Continue,
    Stop,
}

/// Receiver of tick transitions.
///
/// Implementations must return [`TickVerdict::Stop`] for a lease that is
/// no longer current, without applying the transition.
pub trait TickHandler: Send + Sync + 'static {
    fn apply(&self, lease: LeaseId, job: &JobHandle, transition: Transition) -> TickVerdict;
}

/// Spawn the poll task for `job` and return its lease.
///
/// The first tick runs immediately. `parent` is the owner's root token;
/// the lease gets a child of it so owner shutdown also stops the task.
pub fn arm(
    id: LeaseId,
    job: JobHandle,
    service: Arc<dyn JobService>,
    handler: Arc<dyn TickHandler>,
    interval: Duration,
    parent: &CancellationToken,
) -> PollLease {
    let cancel = parent.child_token();
    let task = tokio::spawn(run_poll_loop(
        id,
        job.clone(),
        service,
        handler,
        interval,
        cancel.clone(),
    ));

    tracing::info!(lease = %id, job_id = %job, "Status polling started");
    PollLease::new(id, job, cancel, task)
}

/// Tick until the handler stops the lease or the token is cancelled.
pub async fn run_poll_loop(
    id: LeaseId,
    job: JobHandle,
    service: Arc<dyn JobService>,
    handler: Arc<dyn TickHandler>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            reply = service.job_status(&job) => reply,
        };

        let verdict = match reply {
            Ok(StatusReply::Found(snapshot)) => {
                tracing::debug!(lease = %id, job_id = %job, state = snapshot.state().as_str(), "Status tick");
                handler.apply(id, &job, Transition::Snapshot(snapshot))
            }
            Ok(StatusReply::NotFound) => {
                tracing::info!(lease = %id, job_id = %job, "Job not found on service");
                handler.apply(id, &job, Transition::Gone);
                TickVerdict::Stop
            }
            Err(e) => {
                tracing::warn!(lease = %id, job_id = %job, error = %e, "Status tick failed, retrying next tick");
                TickVerdict::Continue
            }
        };

        if verdict == TickVerdict::Stop {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::debug!(lease = %id, job_id = %job, "Status polling stopped");
}
