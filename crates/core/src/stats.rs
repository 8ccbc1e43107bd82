//! Aggregate payloads published by the background pollers.

use serde::{Deserialize, Serialize};

/// Service-wide counters shown next to the job controls.
///
/// Missing fields in the service response default to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedStats {
    #[serde(default)]
    pub active_users: u32,
    #[serde(default)]
    pub queued: u32,
}

/// Host resource usage reported by the service.
///
/// `available` is false on hosts where the service cannot sample CPU and
/// memory; the numeric fields are absent in that case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub memory_percent: f64,
}

impl ResourceUsage {
    /// One-line summary, e.g. `CPU: 12.5% | RAM: 40%`.
    pub fn summary(&self) -> String {
        format!("CPU: {}% | RAM: {}%", self.cpu, self.memory_percent)
    }
}
