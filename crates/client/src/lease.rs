//! Ownership of the single active status poll.

use std::fmt;

use limefrog_core::types::JobHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identifies one armed lease. Never reused within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaseId(u64);

impl LeaseId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The right to run one repeating status poll for one job.
///
/// Dropping the lease revokes it: the poll task's cancellation token fires
/// and the task exits at its next suspension point. Holders therefore
/// revoke a lease simply by replacing or taking it.
pub struct PollLease {
    id: LeaseId,
    job: JobHandle,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollLease {
    pub(crate) fn new(
        id: LeaseId,
        job: JobHandle,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            job,
            cancel,
            task: Some(task),
        }
    }

    pub fn id(&self) -> LeaseId {
        self.id
    }

    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    pub fn is_revoked(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Revoke the lease and hand back the poll task so the caller can
    /// wait for it to wind down.
    pub fn revoke(mut self) -> Option<JoinHandle<()>> {
        self.cancel.cancel();
        self.task.take()
    }
}

impl Drop for PollLease {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(lease = %self.id, job_id = %self.job, "Revoking poll lease");
        }
        self.cancel.cancel();
    }
}

impl fmt::Debug for PollLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollLease")
            .field("id", &self.id)
            .field("job", &self.job)
            .field("revoked", &self.is_revoked())
            .finish()
    }
}
