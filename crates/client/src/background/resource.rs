//! Host resource usage poller.
//!
//! Unlike the other signals the first fetch happens one interval after
//! start. Usage is only published when the service reports it as
//! available.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::JobService;
use crate::events::{ClientEvent, EventHub};

pub const DEFAULT_RESOURCE_INTERVAL: Duration = Duration::from_millis(5000);

/// Run the resource loop until `cancel` is triggered.
pub async fn run(
    service: Arc<dyn JobService>,
    events: EventHub,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match service.resource_usage().await {
                    Ok(usage) if usage.available => events.publish(ClientEvent::Resource(usage)),
                    Ok(_) => tracing::trace!("Resource usage unavailable on service host"),
                    Err(e) => tracing::debug!(error = %e, "Resource fetch failed"),
                }
            }
        }
    }
}
