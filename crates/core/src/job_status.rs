//! Job status state machine vocabulary.
//!
//! The service reports job status as a loosely-typed record (see
//! [`StatusRecord`]). It is converted into the closed [`JobStatusSnapshot`]
//! variant so that the queue position is only reachable while a job is
//! queued and `has_results` only once it is terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_STOPPED: &str = "stopped";
pub const STATUS_ERROR: &str = "error";

/// All status strings the service may report.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_QUEUED,
    STATUS_RUNNING,
    STATUS_COMPLETED,
    STATUS_STOPPED,
    STATUS_ERROR,
];

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Stopped,
    Error,
}

impl JobState {
    /// Convert from the service's status string.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            STATUS_QUEUED => Ok(Self::Queued),
            STATUS_RUNNING => Ok(Self::Running),
            STATUS_COMPLETED => Ok(Self::Completed),
            STATUS_STOPPED => Ok(Self::Stopped),
            STATUS_ERROR => Ok(Self::Error),
            _ => Err(CoreError::Protocol(format!(
                "Unknown job status '{s}'. Expected one of: {}",
                VALID_STATUSES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => STATUS_QUEUED,
            Self::Running => STATUS_RUNNING,
            Self::Completed => STATUS_COMPLETED,
            Self::Stopped => STATUS_STOPPED,
            Self::Error => STATUS_ERROR,
        }
    }

    /// Completed, stopped and error admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Processed-item counter for a job.
///
/// `completed` never exceeds `total` once `total` is known (non-zero).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    completed: u32,
    total: u32,
}

impl Progress {
    pub fn new(completed: u32, total: u32) -> Self {
        let completed = if total > 0 {
            completed.min(total)
        } else {
            completed
        };
        Self { completed, total }
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Rounded completion percentage, `0` when the total is unknown.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (f64::from(self.completed) / f64::from(self.total) * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

// ---------------------------------------------------------------------------
// Wire record
// ---------------------------------------------------------------------------

/// Status record exactly as returned by `GET /api/job/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusRecord {
    pub status: String,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub has_results: bool,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One complete status report for a job at a single point in time.
///
/// Each snapshot replaces the previous one; snapshots are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatusSnapshot {
    Queued {
        progress: Progress,
        queue_position: u32,
    },
    Running {
        progress: Progress,
    },
    Completed {
        progress: Progress,
        has_results: bool,
    },
    Stopped {
        progress: Progress,
        has_results: bool,
    },
    Error {
        progress: Progress,
        message: Option<String>,
        has_results: bool,
    },
}

impl JobStatusSnapshot {
    pub fn state(&self) -> JobState {
        match self {
            Self::Queued { .. } => JobState::Queued,
            Self::Running { .. } => JobState::Running,
            Self::Completed { .. } => JobState::Completed,
            Self::Stopped { .. } => JobState::Stopped,
            Self::Error { .. } => JobState::Error,
        }
    }

    pub fn progress(&self) -> Progress {
        match self {
            Self::Queued { progress, .. }
            | Self::Running { progress }
            | Self::Completed { progress, .. }
            | Self::Stopped { progress, .. }
            | Self::Error { progress, .. } => *progress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Whether results can be downloaded. Always false for a job that is
    /// still queued or running.
    pub fn has_results(&self) -> bool {
        match self {
            Self::Queued { .. } | Self::Running { .. } => false,
            Self::Completed { has_results, .. }
            | Self::Stopped { has_results, .. }
            | Self::Error { has_results, .. } => *has_results,
        }
    }

    /// Queue position worth displaying: only while queued and positive.
    pub fn queue_position(&self) -> Option<u32> {
        match self {
            Self::Queued { queue_position, .. } if *queue_position > 0 => Some(*queue_position),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Human-readable status line for display.
    pub fn status_line(&self) -> String {
        let progress = self.progress();
        let mut line = match (self, self.queue_position()) {
            (_, Some(position)) => format!("Queued: position {position}"),
            (Self::Running { .. }, _) => format!(
                "Status: running. {}/{}",
                progress.completed(),
                progress.total()
            ),
            _ => format!(
                "Status: {}. Processed {}/{}",
                self.state().as_str(),
                progress.completed(),
                progress.total()
            ),
        };
        if let Some(message) = self.error_message() {
            line.push_str(", error: ");
            line.push_str(message);
        }
        line
    }
}

impl fmt::Display for JobStatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}

impl TryFrom<StatusRecord> for JobStatusSnapshot {
    type Error = CoreError;

    fn try_from(record: StatusRecord) -> Result<Self, CoreError> {
        let state = JobState::from_str_value(&record.status)?;
        let progress = Progress::new(record.completed, record.total);
        let has_results = record.has_results;

        Ok(match state {
            JobState::Queued => Self::Queued {
                progress,
                queue_position: record.queue_position.unwrap_or(0),
            },
            // A running job may still carry a stale queue position; drop it.
            JobState::Running => Self::Running { progress },
            JobState::Completed => Self::Completed {
                progress,
                has_results,
            },
            JobState::Stopped => Self::Stopped {
                progress,
                has_results,
            },
            JobState::Error => Self::Error {
                progress,
                message: record.error.filter(|m| !m.is_empty()),
                has_results,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn record(json: &str) -> StatusRecord {
        serde_json::from_str(json).expect("valid status record")
    }

    #[test]
    fn state_round_trips_through_strings() {
        for s in VALID_STATUSES {
            let state = JobState::from_str_value(s).unwrap();
            assert_eq!(state.as_str(), *s);
        }
    }

    #[test]
    fn unknown_status_is_protocol_error() {
        assert_matches!(
            JobState::from_str_value("pending"),
            Err(CoreError::Protocol(_))
        );
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Stopped.is_terminal());
        assert!(JobState::Error.is_terminal());
    }

    #[test]
    fn progress_percent_rounds() {
        assert_eq!(Progress::new(4, 10).percent(), 40);
        assert_eq!(Progress::new(1, 3).percent(), 33);
        assert_eq!(Progress::new(2, 3).percent(), 67);
        assert_eq!(Progress::new(0, 0).percent(), 0);
    }

    #[test]
    fn progress_clamps_completed_to_total() {
        let p = Progress::new(12, 10);
        assert_eq!(p.completed(), 10);
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn queued_record_keeps_queue_position() {
        let snapshot = JobStatusSnapshot::try_from(record(
            r#"{"status":"queued","completed":0,"total":10,"queue_position":3}"#,
        ))
        .unwrap();
        assert_eq!(snapshot.queue_position(), Some(3));
        assert!(!snapshot.has_results());
        assert_eq!(snapshot.status_line(), "Queued: position 3");
    }

    #[test]
    fn queued_with_zero_position_hides_it() {
        let snapshot = JobStatusSnapshot::try_from(record(
            r#"{"status":"queued","completed":0,"total":5,"queue_position":0}"#,
        ))
        .unwrap();
        assert_eq!(snapshot.queue_position(), None);
        assert_eq!(snapshot.status_line(), "Status: queued. Processed 0/5");
    }

    #[test]
    fn running_record_discards_stale_queue_position() {
        let snapshot = JobStatusSnapshot::try_from(record(
            r#"{"status":"running","completed":4,"total":10,"queue_position":2,"has_results":true}"#,
        ))
        .unwrap();
        assert_matches!(snapshot, JobStatusSnapshot::Running { .. });
        assert_eq!(snapshot.queue_position(), None);
        assert!(!snapshot.has_results(), "has_results is ignored while running");
        assert_eq!(snapshot.progress().percent(), 40);
        assert_eq!(snapshot.status_line(), "Status: running. 4/10");
    }

    #[test]
    fn error_record_carries_message() {
        let snapshot = JobStatusSnapshot::try_from(record(
            r#"{"status":"error","completed":2,"total":10,"error":"boom","has_results":false}"#,
        ))
        .unwrap();
        assert_eq!(snapshot.error_message(), Some("boom"));
        assert!(snapshot.is_terminal());
        assert_eq!(snapshot.status_line(), "Status: error. Processed 2/10, error: boom");
    }

    #[test]
    fn null_fields_use_defaults() {
        let snapshot = JobStatusSnapshot::try_from(record(
            r#"{"status":"completed","error":null,"queue_position":null,"has_results":true}"#,
        ))
        .unwrap();
        assert_matches!(
            snapshot,
            JobStatusSnapshot::Completed { has_results: true, .. }
        );
        assert_eq!(snapshot.progress(), Progress::new(0, 0));
    }

    #[test]
    fn unknown_status_record_is_rejected() {
        let result = JobStatusSnapshot::try_from(record(r#"{"status":"paused"}"#));
        assert_matches!(result, Err(CoreError::Protocol(_)));
    }
}
