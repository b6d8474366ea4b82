//! Per-key request history.

use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};

/// Timestamps of admitted requests for one resource/caller pair, oldest first.
///
/// Rejected requests are never recorded here. Entries leave the history only
/// through [`RequestHistory::prune_expired`], which the count-in-window rule
/// calls while it evaluates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHistory {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl RequestHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an admitted request.
    ///
    /// Timestamps normally arrive in order and are appended. A timestamp older
    /// than the newest entry (the clock stepped backwards) is inserted at its
    /// ordered position.
    pub fn record(&mut self, at: DateTime<Utc>) {
        match self.timestamps.back() {
            Some(newest) if at < *newest => {
                let idx = self.timestamps.partition_point(|t| *t <= at);
                self.timestamps.insert(idx, at);
            }
            _ => self.timestamps.push_back(at),
        }
    }

    /// Drop every timestamp `t` with `now - t >= window`.
    ///
    /// Returns the number of entries removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>, window: TimeDelta) -> usize {
        let before = self.timestamps.len();
        while let Some(oldest) = self.timestamps.front() {
            if now - *oldest >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        before - self.timestamps.len()
    }

    /// The most recent admitted request, if any.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.timestamps.back().copied()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.timestamps.iter()
    }
}

impl FromIterator<DateTime<Utc>> for RequestHistory {
    fn from_iter<I: IntoIterator<Item = DateTime<Utc>>>(iter: I) -> Self {
        let mut history = RequestHistory::new();
        for at in iter {
            history.record(at);
        }
        history
    }
}
