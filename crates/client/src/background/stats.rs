//! Shared statistics poller.
//!
//! Fetches service-wide counters once immediately and then on a fixed
//! interval, republishing them verbatim as [`ClientEvent::Stats`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::JobService;
use crate::events::{ClientEvent, EventHub};

/// Reference cadence between statistics fetches.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_millis(3000);

/// Run the statistics loop until `cancel` is triggered.
pub async fn run(
    service: Arc<dyn JobService>,
    events: EventHub,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_ms = interval.as_millis() as u64, "Stats polling started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Stats polling stopping");
                break;
            }
            _ = ticker.tick() => {
                match service.stats().await {
                    Ok(stats) => events.publish(ClientEvent::Stats(stats)),
                    Err(e) => tracing::debug!(error = %e, "Stats fetch failed"),
                }
            }
        }
    }
}
