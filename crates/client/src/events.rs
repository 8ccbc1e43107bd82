//! Observer events emitted by the client.
//!
//! All components publish to one [`EventHub`]; observers (a terminal UI,
//! a log sink, tests) subscribe and render what they need.

use limefrog_core::job_status::JobStatusSnapshot;
use limefrog_core::stats::{ResourceUsage, SharedStats};
use limefrog_core::types::JobHandle;
use serde::Serialize;
use tokio::sync::broadcast;

/// Status text shown when a tracked job disappears from the service.
pub const JOB_NOT_FOUND_TEXT: &str = "Job not found";

/// Something observers may want to display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClientEvent {
    /// A submission request is in flight.
    Submitting,

    /// The service accepted the job and polling has begun.
    Submitted { job: JobHandle },

    /// The submission was rejected locally or by the service.
    SubmitFailed { message: String },

    /// Polling resumed for a job persisted by an earlier run.
    Resumed { job: JobHandle },

    /// A non-terminal snapshot (queued or running).
    Progress {
        job: JobHandle,
        snapshot: JobStatusSnapshot,
    },

    /// The terminal snapshot. Published exactly once per job.
    Finished {
        job: JobHandle,
        snapshot: JobStatusSnapshot,
    },

    /// The service no longer knows the job; local state was cleared.
    JobNotFound { job: JobHandle },

    /// The service acknowledged a stop request.
    StopRequested { job: JobHandle },

    Stats(SharedStats),

    Resource(ResourceUsage),
}

impl ClientEvent {
    /// Status line for job-related events; `None` for background signals.
    pub fn status_line(&self) -> Option<String> {
        match self {
            Self::Submitting => Some("Starting...".to_string()),
            Self::Submitted { job } => Some(format!("Job {job} submitted")),
            Self::SubmitFailed { message } => Some(message.clone()),
            Self::Resumed { job } => Some(format!("Resuming job {job}")),
            Self::Progress { snapshot, .. } | Self::Finished { snapshot, .. } => {
                Some(snapshot.status_line())
            }
            Self::JobNotFound { .. } => Some(JOB_NOT_FOUND_TEXT.to_string()),
            Self::StopRequested { .. } => Some("Stopping...".to_string()),
            Self::Stats(_) | Self::Resource(_) => None,
        }
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out hub for [`ClientEvent`]s.
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventHub {
    /// Create a hub with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer fills.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: ClientEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use limefrog_core::job_status::Progress;

    use super::*;

    #[tokio::test]
    async fn clones_publish_to_same_subscribers() {
        let hub = EventHub::default();
        let mut rx = hub.subscribe();

        hub.clone().publish(ClientEvent::Stats(SharedStats {
            active_users: 2,
            queued: 1,
        }));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(
            received,
            ClientEvent::Stats(SharedStats {
                active_users: 2,
                queued: 1
            })
        );
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventHub::default().publish(ClientEvent::Submitting);
    }

    #[test]
    fn status_lines() {
        let job = JobHandle::new("j1");
        assert_eq!(
            ClientEvent::JobNotFound { job: job.clone() }.status_line().as_deref(),
            Some(JOB_NOT_FOUND_TEXT)
        );
        assert_eq!(
            ClientEvent::StopRequested { job: job.clone() }.status_line().as_deref(),
            Some("Stopping...")
        );

        let snapshot = JobStatusSnapshot::Running {
            progress: Progress::new(4, 10),
        };
        assert_eq!(
            ClientEvent::Progress { job, snapshot }.status_line().as_deref(),
            Some("Status: running. 4/10")
        );
        assert_eq!(ClientEvent::Stats(SharedStats::default()).status_line(), None);
    }
}
