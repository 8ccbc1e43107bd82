//! Job lifecycle controller.
//!
//! [`JobController`] owns the active job: it submits jobs, persists the
//! job handle in the durable store, arms the status poller and applies
//! every tick's transition. The persisted handle slot is only ever
//! written from here.
//!
//! Lease replacement and tick application happen under the same mutex,
//! and a tick is applied only when its lease is still the live one. A
//! reply that arrives for a revoked lease is dropped, so observers never
//! see a stale job's snapshot after a new job has started.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use limefrog_core::error::CoreError;
use limefrog_core::job_status::JobStatusSnapshot;
use limefrog_core::options::JobRequest;
use limefrog_core::types::JobHandle;
use limefrog_store::kv::{KeyValueStore, JOB_ID_KEY};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, JobService};
use crate::events::{ClientEvent, EventHub};
use crate::lease::{LeaseId, PollLease};
use crate::poller::{self, TickHandler, TickVerdict, Transition};

/// Shown when a submission fails without a server-provided message.
pub const GENERIC_SUBMIT_FAILURE: &str = "Job submission failed";

/// How long [`JobController::shutdown`] waits for the poll task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where the controller is in the job lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    /// No job; ready to submit.
    Idle,
    /// A submission request is in flight.
    Submitting,
    /// A lease is polling `job`. `snapshot` is `None` until the first tick
    /// completes.
    Tracking {
        job: JobHandle,
        snapshot: Option<JobStatusSnapshot>,
    },
    /// `job` reached a terminal state.
    Finished {
        job: JobHandle,
        snapshot: JobStatusSnapshot,
    },
}

/// Which user actions currently make sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub can_submit: bool,
    pub can_stop: bool,
    pub can_download: bool,
}

/// Why a submission did not produce a job.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// Rejected locally before anything was sent.
    #[error("{0}")]
    Invalid(String),

    /// The service rejected the job or could not be reached. `message` is
    /// the service's own text when it sent one.
    #[error("{message}")]
    Rejected {
        message: String,
        #[source]
        source: ApiError,
    },

    /// Another submission from this controller has not finished yet.
    #[error("A submission is already in progress")]
    InProgress,
}

impl From<CoreError> for SubmissionError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) | CoreError::Protocol(msg) => Self::Invalid(msg),
        }
    }
}

impl From<ApiError> for SubmissionError {
    fn from(source: ApiError) -> Self {
        let message = source
            .server_message()
            .unwrap_or_else(|| GENERIC_SUBMIT_FAILURE.to_string());
        Self::Rejected { message, source }
    }
}

// ---------------------------------------------------------------------------
// JobController
// ---------------------------------------------------------------------------

/// Owns the active job and its poll lease.
///
/// The durable store and the service are injected so they can be faked
/// in tests. Methods that arm a lease spawn a task and must be called
/// from within a tokio runtime.
pub struct JobController {
    inner: Arc<Inner>,
}

struct Inner {
    service: Arc<dyn JobService>,
    store: Arc<dyn KeyValueStore>,
    events: EventHub,
    poll_interval: Duration,
    /// Root token; every lease token is a child of it.
    cancel: CancellationToken,
    state: Mutex<ControllerState>,
}

struct ControllerState {
    phase: JobPhase,
    submitting: bool,
    lease: Option<PollLease>,
    last_lease: LeaseId,
}

impl JobController {
    pub fn new(
        service: Arc<dyn JobService>,
        store: Arc<dyn KeyValueStore>,
        events: EventHub,
        poll_interval: Duration,
    ) -> Self {
        let inner = Arc::new(Inner {
            service,
            store,
            events,
            poll_interval,
            cancel: CancellationToken::new(),
            state: Mutex::new(ControllerState {
                phase: JobPhase::Idle,
                submitting: false,
                lease: None,
                last_lease: LeaseId::new(0),
            }),
        });
        Self { inner }
    }

    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }

    /// Submit a job and start polling it.
    ///
    /// On success the handle is persisted durably before the first tick
    /// runs. On failure nothing is persisted and the current phase is left
    /// as it was.
    pub async fn submit(&self, request: JobRequest) -> Result<JobHandle, SubmissionError> {
        if let Err(e) = request.validate() {
            let err = SubmissionError::from(e);
            self.inner.events.publish(ClientEvent::SubmitFailed {
                message: err.to_string(),
            });
            return Err(err);
        }

        {
            let mut state = self.inner.lock();
            if state.submitting {
                return Err(SubmissionError::InProgress);
            }
            state.submitting = true;
        }
        self.inner.events.publish(ClientEvent::Submitting);

        let result = self.inner.service.submit_job(&request).await;

        let mut state = self.inner.lock();
        state.submitting = false;

        match result {
            Ok(job) => {
                tracing::info!(job_id = %job, urls = request.urls.len(), "Job submitted");
                // The old lease goes first so its last in-flight tick cannot
                // clear the handle persisted below.
                self.inner.revoke(&mut state);
                self.inner.persist_job(&job);
                self.inner
                    .events
                    .publish(ClientEvent::Submitted { job: job.clone() });
                self.inner.track(&mut state, job.clone());
                Ok(job)
            }
            Err(e) => {
                tracing::error!(error = %e, "Job submission failed");
                let err = SubmissionError::from(e);
                self.inner.events.publish(ClientEvent::SubmitFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Ask the service to stop `job`.
    ///
    /// The lease is left alone: the poller sees the resulting `stopped`
    /// status on a later tick and ends itself.
    pub async fn stop(&self, job: &JobHandle) -> Result<(), ApiError> {
        self.inner.service.stop_job(job).await?;
        tracing::info!(job_id = %job, "Stop requested");
        self.inner
            .events
            .publish(ClientEvent::StopRequested { job: job.clone() });
        Ok(())
    }

    /// Resume polling the persisted job, if any, without resubmitting.
    ///
    /// Returns the resumed job. With nothing persisted this is a no-op.
    /// While a lease is already polling the persisted job, the call
    /// returns it without arming another lease.
    pub fn resume_if_persisted(&self) -> Option<JobHandle> {
        let job = self.persisted_job()?;

        let mut state = self.inner.lock();
        if state.lease.as_ref().is_some_and(|lease| lease.job() == &job) {
            tracing::debug!(job_id = %job, "Persisted job is already being polled");
            return Some(job);
        }
        tracing::info!(job_id = %job, "Resuming persisted job");
        self.inner.revoke(&mut state);
        self.inner
            .events
            .publish(ClientEvent::Resumed { job: job.clone() });
        self.inner.track(&mut state, job.clone());
        Some(job)
    }

    /// Drop the current job: revoke the lease and clear the persisted
    /// handle.
    pub fn forget(&self) {
        let mut state = self.inner.lock();
        self.inner.revoke(&mut state);
        self.inner.clear_persisted_job();
        state.phase = JobPhase::Idle;
    }

    /// Revoke the lease and wait briefly for the poll task to exit.
    pub async fn shutdown(&self) {
        let task = {
            let mut state = self.inner.lock();
            state.lease.take().and_then(PollLease::revoke)
        };
        self.inner.cancel.cancel();

        if let Some(task) = task {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, task).await;
        }
        tracing::debug!("Job controller shut down");
    }

    // ---- observers ----

    pub fn phase(&self) -> JobPhase {
        let state = self.inner.lock();
        if state.submitting {
            JobPhase::Submitting
        } else {
            state.phase.clone()
        }
    }

    /// The job handle in the durable store.
    pub fn persisted_job(&self) -> Option<JobHandle> {
        self.inner
            .store
            .load(JOB_ID_KEY)
            .filter(|id| !id.is_empty())
            .map(JobHandle::new)
    }

    /// Job bound to the live lease, if any.
    pub fn polling_job(&self) -> Option<JobHandle> {
        self.inner
            .lock()
            .lease
            .as_ref()
            .map(|lease| lease.job().clone())
    }

    /// Job the controller is tracking or last finished.
    pub fn current_job(&self) -> Option<JobHandle> {
        match &self.inner.lock().phase {
            JobPhase::Tracking { job, .. } | JobPhase::Finished { job, .. } => Some(job.clone()),
            JobPhase::Idle | JobPhase::Submitting => None,
        }
    }

    /// True when the current job is terminal and has results.
    pub fn download_ready(&self) -> bool {
        self.ready_job().is_some()
    }

    /// The job whose results can be downloaded right now.
    pub fn ready_job(&self) -> Option<JobHandle> {
        match &self.inner.lock().phase {
            JobPhase::Finished { job, snapshot } if snapshot.has_results() => Some(job.clone()),
            _ => None,
        }
    }

    pub fn controls(&self) -> Controls {
        let state = self.inner.lock();
        if state.submitting {
            return Controls::default();
        }
        match &state.phase {
            JobPhase::Idle | JobPhase::Submitting => Controls {
                can_submit: true,
                ..Controls::default()
            },
            JobPhase::Tracking { .. } => Controls {
                can_stop: true,
                ..Controls::default()
            },
            JobPhase::Finished { snapshot, .. } => Controls {
                can_submit: true,
                can_stop: false,
                can_download: snapshot.has_results(),
            },
        }
    }
}

impl Drop for JobController {
    // The poll task keeps `Inner` alive, so its lease is not dropped with
    // the controller.
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Revoke the live lease, if any.
    fn revoke(&self, state: &mut ControllerState) {
        if let Some(previous) = state.lease.take() {
            tracing::info!(lease = %previous.id(), job_id = %previous.job(), "Superseding poll lease");
        }
    }

    /// Arm a fresh lease for `job`. The caller has already revoked the
    /// previous one.
    fn track(self: &Arc<Self>, state: &mut ControllerState, job: JobHandle) {
        let id = state.last_lease.next();
        state.last_lease = id;

        let handler: Arc<dyn TickHandler> = Arc::clone(self) as Arc<dyn TickHandler>;
        let lease = poller::arm(
            id,
            job.clone(),
            Arc::clone(&self.service),
            handler,
            self.poll_interval,
            &self.cancel,
        );

        state.lease = Some(lease);
        state.phase = JobPhase::Tracking {
            job,
            snapshot: None,
        };
    }

    fn persist_job(&self, job: &JobHandle) {
        if let Err(e) = self.store.save(JOB_ID_KEY, job.as_str()) {
            tracing::warn!(job_id = %job, error = %e, "Failed to persist job id");
        }
    }

    fn clear_persisted_job(&self) {
        if let Err(e) = self.store.remove(JOB_ID_KEY) {
            tracing::warn!(error = %e, "Failed to clear persisted job id");
        }
    }
}

impl TickHandler for Inner {
    fn apply(&self, lease: LeaseId, job: &JobHandle, transition: Transition) -> TickVerdict {
        let mut state = self.lock();

        if state.lease.as_ref().map(PollLease::id) != Some(lease) {
            tracing::debug!(lease = %lease, job_id = %job, "Discarding tick from revoked lease");
            return TickVerdict::Stop;
        }

        match transition {
            Transition::Snapshot(snapshot) if !snapshot.is_terminal() => {
                state.phase = JobPhase::Tracking {
                    job: job.clone(),
                    snapshot: Some(snapshot.clone()),
                };
                self.events.publish(ClientEvent::Progress {
                    job: job.clone(),
                    snapshot,
                });
                TickVerdict::Continue
            }
            Transition::Snapshot(snapshot) => {
                state.lease = None;
                if !snapshot.has_results() {
                    self.clear_persisted_job();
                }
                tracing::info!(
                    job_id = %job,
                    state = snapshot.state().as_str(),
                    has_results = snapshot.has_results(),
                    "Job finished",
                );
                state.phase = JobPhase::Finished {
                    job: job.clone(),
                    snapshot: snapshot.clone(),
                };
                self.events.publish(ClientEvent::Finished {
                    job: job.clone(),
                    snapshot,
                });
                TickVerdict::Stop
            }
            Transition::Gone => {
                state.lease = None;
                self.clear_persisted_job();
                state.phase = JobPhase::Idle;
                self.events
                    .publish(ClientEvent::JobNotFound { job: job.clone() });
                TickVerdict::Stop
            }
        }
    }
}
