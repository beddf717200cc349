//! The pending approval set as last observed by polling.
//!
//! The server is the sole source of truth for request status: the client
//! never marks a request approved or denied optimistically, it re-polls and
//! trusts the next snapshot. A failed poll keeps the previous set (no
//! flicker to empty) and is retried only on the normal cadence.

use std::time::Duration;

use tracing::debug;
use vigil_core::ApprovalRequest;

/// Reference polling cadence while a valid credential exists.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome of ingesting one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// True iff the pending count strictly increased relative to the
    /// previous successful poll. Deltas are atomic per poll; there is no
    /// sub-poll granularity.
    pub increased: bool,
}

/// Ordered pending set, server order preserved.
#[derive(Debug, Default)]
pub struct ApprovalQueue {
    pending: Vec<ApprovalRequest>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a successful poll. Non-PENDING entries are filtered out;
    /// ordering of the remainder is preserved.
    pub fn apply_poll(&mut self, requests: Vec<ApprovalRequest>) -> PollOutcome {
        let previous = self.pending.len();
        self.pending = requests.into_iter().filter(|r| r.is_pending()).collect();
        let current = self.pending.len();
        if current != previous {
            debug!(previous, current, "pending set changed");
        }
        PollOutcome {
            increased: current > previous,
        }
    }

    /// A failed poll leaves the previous set untouched. Transient network
    /// failure is invisible beyond a possibly stale set.
    pub fn poll_failed(&mut self) {
        debug!(stale = self.pending.len(), "poll failed; keeping previous set");
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApprovalRequest> {
        self.pending.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ApprovalRequest> {
        self.pending.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&ApprovalRequest> {
        self.pending.iter().find(|r| r.id == id)
    }
}
