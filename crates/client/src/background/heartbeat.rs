//! Liveness heartbeat.
//!
//! Announces this client's session id to the service once immediately
//! and then on a fixed interval. Delivery is best effort: a failed
//! heartbeat is logged and the next one goes out on schedule.

use std::sync::Arc;
use std::time::Duration;

use limefrog_core::types::SessionIdentity;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::JobService;

/// Reference cadence between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5000);

/// Run the heartbeat loop until `cancel` is triggered.
pub async fn run(
    service: Arc<dyn JobService>,
    session: SessionIdentity,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        session_id = %session,
        interval_ms = interval.as_millis() as u64,
        "Heartbeat started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Heartbeat stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = service.heartbeat(&session).await {
                    tracing::debug!(error = %e, "Heartbeat failed");
                }
            }
        }
    }
}
