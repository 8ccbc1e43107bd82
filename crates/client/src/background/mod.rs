//! Background signals that run independently of job tracking.
//!
//! Each submodule provides a long-running async function intended to be
//! spawned via `tokio::spawn`. All of them accept a [`CancellationToken`]
//! for graceful shutdown and swallow their own failures, so a broken
//! signal never affects the job state machine or its siblings.

pub mod heartbeat;
pub mod resource;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use limefrog_core::types::SessionIdentity;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::JobService;
use crate::config::ClientConfig;
use crate::events::EventHub;

/// How long [`BackgroundTasks::shutdown`] waits for each task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Handles to the spawned background tasks.
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    /// Spawn heartbeat, shared-stats and resource polling.
    pub fn spawn(
        service: Arc<dyn JobService>,
        session: SessionIdentity,
        events: EventHub,
        config: &ClientConfig,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();

        let handles = vec![
            (
                "heartbeat",
                tokio::spawn(heartbeat::run(
                    Arc::clone(&service),
                    session,
                    config.heartbeat_interval,
                    cancel.clone(),
                )),
            ),
            (
                "stats",
                tokio::spawn(stats::run(
                    Arc::clone(&service),
                    events.clone(),
                    config.stats_interval,
                    cancel.clone(),
                )),
            ),
            (
                "resource",
                tokio::spawn(resource::run(
                    service,
                    events,
                    config.resource_interval,
                    cancel.clone(),
                )),
            ),
        ];

        Self { cancel, handles }
    }

    /// Cancel every task and wait for each to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in self.handles {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                tracing::warn!(task = name, "Background task did not stop in time");
            }
        }
    }
}
