//! Per-node performance records and the blacklist policy.
//!
//! A [`NodeWeight`] is updated after every completed or failed round and
//! read by the selector. Two classes of misbehavior are distinguished:
//!
//! - structurally invalid responses and failed proofs blacklist the node
//!   immediately, with a backoff that doubles per repeated offense and never
//!   decreases automatically;
//! - plain timeouts only rotate the node to the back of future candidate
//!   lists, until they repeat often enough to cross the blacklist threshold.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Mutable performance record for one node.
#[derive(Debug, Clone, Default)]
pub struct NodeWeight {
    /// Completed responses observed from this node.
    pub response_count: u64,
    /// Cumulative response time across all completed responses.
    pub total_response_time_ms: u64,
    /// Exclusion deadline; the node is skipped while this is in the future.
    pub blacklisted_until: Option<Instant>,
    /// Offenses on record; drives the escalating backoff.
    pub offense_count: u32,
    /// Consecutive timeouts since the last completed response.
    pub timeout_streak: u32,
}

impl NodeWeight {
    /// Records a completed response and clears the timeout streak.
    pub fn record_response(&mut self, elapsed: Duration) {
        self.response_count += 1;
        self.total_response_time_ms += u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.timeout_streak = 0;
    }

    /// Records a timeout. Returns `true` once the streak crosses
    /// `blacklist_threshold`, at which point the caller should blacklist.
    pub fn record_timeout(&mut self, blacklist_threshold: u32) -> bool {
        self.timeout_streak += 1;
        self.timeout_streak >= blacklist_threshold
    }

    /// Blacklists the node with escalating backoff:
    /// `base * 2^offenses`, capped at `cap`. The deadline only ever moves
    /// forward.
    pub fn blacklist(&mut self, base: Duration, cap: Duration) {
        let factor = 2u32.saturating_pow(self.offense_count.min(16));
        let backoff = base.saturating_mul(factor).min(cap);
        self.offense_count += 1;
        let until = Instant::now() + backoff;
        match self.blacklisted_until {
            Some(existing) if existing >= until => {
                debug!(offenses = self.offense_count, "blacklist deadline unchanged");
            }
            _ => {
                warn!(
                    offenses = self.offense_count,
                    backoff_secs = backoff.as_secs(),
                    "node blacklisted"
                );
                self.blacklisted_until = Some(until);
            }
        }
        self.timeout_streak = 0;
    }

    #[must_use]
    pub fn is_blacklisted(&self, now: Instant) -> bool {
        self.blacklisted_until.is_some_and(|until| until > now)
    }

    /// Average response time, if any response completed yet.
    #[must_use]
    pub fn avg_response_time_ms(&self) -> Option<u64> {
        if self.response_count == 0 {
            None
        } else {
            Some(self.total_response_time_ms / self.response_count)
        }
    }
}
