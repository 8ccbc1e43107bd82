#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use limefrog_client::api::{ApiError, JobService, StatusReply};
use limefrog_client::controller::JobController;
use limefrog_client::events::{ClientEvent, EventHub};
use limefrog_core::job_status::{JobStatusSnapshot, Progress};
use limefrog_core::options::{CheckOptions, JobRequest, RuntimeOptions};
use limefrog_core::stats::{ResourceUsage, SharedStats};
use limefrog_core::types::{JobHandle, SessionIdentity};
use limefrog_store::MemoryStore;
use tokio::sync::broadcast;

pub const POLL: Duration = Duration::from_millis(2000);

/// In-process [`JobService`] driven by per-job reply scripts.
///
/// Once a job's script is exhausted its status stays "running 0/1".
#[derive(Default)]
pub struct FakeService {
    submit_replies: Mutex<VecDeque<Result<JobHandle, ApiError>>>,
    status_scripts: Mutex<HashMap<String, VecDeque<Result<StatusReply, ApiError>>>>,
    status_latency: Mutex<HashMap<String, Duration>>,
    pub status_calls: Mutex<Vec<String>>,
    pub stop_calls: Mutex<Vec<String>>,
    pub heartbeats: Mutex<Vec<String>>,
    pub heartbeat_failures: AtomicUsize,
    pub stats_replies: Mutex<VecDeque<Result<SharedStats, ApiError>>>,
    pub resource_replies: Mutex<VecDeque<Result<ResourceUsage, ApiError>>>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accept(&self, job: &str) {
        self.submit_replies
            .lock()
            .unwrap()
            .push_back(Ok(JobHandle::new(job)));
    }

    pub fn reject(&self, error: ApiError) {
        self.submit_replies.lock().unwrap().push_back(Err(error));
    }

    pub fn script(&self, job: &str, replies: Vec<Result<StatusReply, ApiError>>) {
        self.status_scripts
            .lock()
            .unwrap()
            .entry(job.to_string())
            .or_default()
            .extend(replies);
    }

    pub fn slow_status(&self, job: &str, latency: Duration) {
        self.status_latency
            .lock()
            .unwrap()
            .insert(job.to_string(), latency);
    }

    pub fn status_calls_for(&self, job: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == job)
            .count()
    }
}

#[async_trait]
impl JobService for FakeService {
    async fn submit_job(&self, _request: &JobRequest) -> Result<JobHandle, ApiError> {
        self.submit_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Protocol("no submit reply scripted".into())))
    }

    async fn job_status(&self, job: &JobHandle) -> Result<StatusReply, ApiError> {
        self.status_calls
            .lock()
            .unwrap()
            .push(job.as_str().to_string());
        let latency = self.status_latency.lock().unwrap().get(job.as_str()).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.status_scripts
            .lock()
            .unwrap()
            .get_mut(job.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(StatusReply::Found(running(0, 1))))
    }

    async fn stop_job(&self, job: &JobHandle) -> Result<(), ApiError> {
        self.stop_calls
            .lock()
            .unwrap()
            .push(job.as_str().to_string());
        Ok(())
    }

    async fn heartbeat(&self, session: &SessionIdentity) -> Result<(), ApiError> {
        self.heartbeats
            .lock()
            .unwrap()
            .push(session.as_str().to_string());
        if self.heartbeat_failures.load(Ordering::SeqCst) > 0 {
            self.heartbeat_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(ApiError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }

    async fn stats(&self) -> Result<SharedStats, ApiError> {
        self.stats_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SharedStats::default()))
    }

    async fn resource_usage(&self) -> Result<ResourceUsage, ApiError> {
        self.resource_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Protocol("no resource reply scripted".into())))
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

pub fn queued(position: u32, total: u32) -> StatusReply {
    StatusReply::Found(JobStatusSnapshot::Queued {
        progress: Progress::new(0, total),
        queue_position: position,
    })
}

pub fn running(completed: u32, total: u32) -> JobStatusSnapshot {
    JobStatusSnapshot::Running {
        progress: Progress::new(completed, total),
    }
}

pub fn completed(total: u32, has_results: bool) -> JobStatusSnapshot {
    JobStatusSnapshot::Completed {
        progress: Progress::new(total, total),
        has_results,
    }
}

pub fn found(snapshot: JobStatusSnapshot) -> Result<StatusReply, ApiError> {
    Ok(StatusReply::Found(snapshot))
}

pub fn transport_error() -> ApiError {
    ApiError::Protocol("connection reset by peer".into())
}

// ---------------------------------------------------------------------------
// Controller setup
// ---------------------------------------------------------------------------

pub struct Harness {
    pub service: Arc<FakeService>,
    pub store: Arc<MemoryStore>,
    pub controller: JobController,
    pub events: broadcast::Receiver<ClientEvent>,
}

pub fn harness() -> Harness {
    harness_with_store(Arc::new(MemoryStore::new()))
}

pub fn harness_with_store(store: Arc<MemoryStore>) -> Harness {
    let service = FakeService::new();
    let hub = EventHub::default();
    let events = hub.subscribe();
    let controller = JobController::new(service.clone(), store.clone(), hub, POLL);
    Harness {
        service,
        store,
        controller,
        events,
    }
}

pub fn request(urls: &str) -> JobRequest {
    JobRequest::from_text(urls, CheckOptions::default(), RuntimeOptions::default())
}

/// Wait (in paused time) for the next event.
pub async fn next_event(rx: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(600), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Everything published so far, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
