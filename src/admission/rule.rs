//! Admission rules.
//!
//! A rule is an immutable policy that looks at a caller's request history and
//! the time of the incoming request and answers "admit" or "reject". Rules
//! hold no state of their own; everything they need lives in the history.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::history::RequestHistory;
use crate::error::{Result, WardenError};

/// Capability shared by every admission policy.
pub trait Admit {
    /// Decide whether a request arriving at `now` may be admitted.
    ///
    /// Implementations may trim stale entries from `history` but never record
    /// the request itself; that is up to the caller once every rule agrees.
    fn admit(&self, history: &mut RequestHistory, now: DateTime<Utc>) -> bool;
}

/// Allows at most `max_count` admitted requests within a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountInWindow {
    max_count: usize,
    window: TimeDelta,
}

impl CountInWindow {
    /// Create a new count-in-window rule.
    ///
    /// Both `max_count` and `window` must be non-zero.
    pub fn new(max_count: usize, window: Duration) -> Result<Self> {
        if max_count == 0 {
            return Err(WardenError::Config(
                "count_in_window: max_count must be greater than zero".to_string(),
            ));
        }
        let window = to_time_delta(window, "count_in_window: window")?;
        if window <= TimeDelta::zero() {
            return Err(WardenError::Config(
                "count_in_window: window must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_count, window })
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }
}

impl Admit for CountInWindow {
    fn admit(&self, history: &mut RequestHistory, now: DateTime<Utc>) -> bool {
        history.prune_expired(now, self.window);
        history.len() < self.max_count
    }
}

/// Requires strictly more than `min_spacing` between consecutive admitted
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinSpacing {
    min_spacing: TimeDelta,
}

impl MinSpacing {
    /// Create a new minimum-spacing rule. A zero spacing only rejects requests
    /// that do not move past the latest recorded timestamp.
    pub fn new(min_spacing: Duration) -> Result<Self> {
        Ok(Self {
            min_spacing: to_time_delta(min_spacing, "min_spacing")?,
        })
    }

    pub fn min_spacing(&self) -> TimeDelta {
        self.min_spacing
    }
}

impl Admit for MinSpacing {
    fn admit(&self, history: &mut RequestHistory, now: DateTime<Utc>) -> bool {
        match history.latest() {
            None => true,
            Some(latest) => now - latest > self.min_spacing,
        }
    }
}

/// The closed set of rules that can be configured for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    CountInWindow(CountInWindow),
    MinSpacing(MinSpacing),
}

impl Rule {
    /// Shorthand for [`CountInWindow::new`].
    pub fn count_in_window(max_count: usize, window: Duration) -> Result<Self> {
        CountInWindow::new(max_count, window).map(Rule::CountInWindow)
    }

    /// Shorthand for [`MinSpacing::new`].
    pub fn min_spacing(min_spacing: Duration) -> Result<Self> {
        MinSpacing::new(min_spacing).map(Rule::MinSpacing)
    }

    /// How far back this rule ever looks into a history.
    ///
    /// Entries older than this can no longer change the rule's verdict.
    pub fn horizon(&self) -> TimeDelta {
        match self {
            Rule::CountInWindow(rule) => rule.window(),
            Rule::MinSpacing(rule) => rule.min_spacing(),
        }
    }
}

impl Admit for Rule {
    fn admit(&self, history: &mut RequestHistory, now: DateTime<Utc>) -> bool {
        match self {
            Rule::CountInWindow(rule) => rule.admit(history, now),
            Rule::MinSpacing(rule) => rule.admit(history, now),
        }
    }
}

impl From<CountInWindow> for Rule {
    fn from(rule: CountInWindow) -> Self {
        Rule::CountInWindow(rule)
    }
}

impl From<MinSpacing> for Rule {
    fn from(rule: MinSpacing) -> Self {
        Rule::MinSpacing(rule)
    }
}

fn to_time_delta(duration: Duration, what: &str) -> Result<TimeDelta> {
    TimeDelta::from_std(duration)
        .map_err(|e| WardenError::Config(format!("{} is out of range: {}", what, e)))
}
