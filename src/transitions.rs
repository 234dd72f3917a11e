//! Static status-transition table.
//!
//! One row per non-terminal status: the next status and the minimum dwell
//! time before a ticket becomes eligible to advance. Loaded once at startup
//! from config and read-only for the life of the process.

use chrono::Duration;

use crate::config::Config;
use crate::model::Status;

/// Default dwell times, in minutes, used when config is absent.
pub const DEFAULT_DWELL_OPEN: i64 = 2;
pub const DEFAULT_DWELL_IN_PROGRESS: i64 = 1;
pub const DEFAULT_DWELL_REVIEW: i64 = 3;
pub const DEFAULT_DWELL_TESTING: i64 = 2;

/// The transition table. Pure; no I/O.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    dwell_open: i64,
    dwell_in_progress: i64,
    dwell_review: i64,
    dwell_testing: i64,
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self {
            dwell_open: DEFAULT_DWELL_OPEN,
            dwell_in_progress: DEFAULT_DWELL_IN_PROGRESS,
            dwell_review: DEFAULT_DWELL_REVIEW,
            dwell_testing: DEFAULT_DWELL_TESTING,
        }
    }
}

impl TransitionTable {
    /// Build the table from configured dwell times.
    pub fn from_config(config: &Config) -> Self {
        Self {
            dwell_open: config.dwell_open_minutes,
            dwell_in_progress: config.dwell_in_progress_minutes,
            dwell_review: config.dwell_review_minutes,
            dwell_testing: config.dwell_testing_minutes,
        }
    }

    /// The status a ticket advances to from `current`. `None` for the
    /// terminal status, which has no outgoing transition.
    pub fn next_status(&self, current: Status) -> Option<Status> {
        match current {
            Status::Open => Some(Status::InProgress),
            Status::InProgress => Some(Status::Review),
            Status::Review => Some(Status::Testing),
            Status::Testing => Some(Status::Done),
            Status::Done => None,
        }
    }

    /// Minimum time a ticket must sit in `current` before advancing.
    /// Zero for the terminal status (never consulted — no transition exists).
    pub fn min_dwell(&self, current: Status) -> Duration {
        let minutes = match current {
            Status::Open => self.dwell_open,
            Status::InProgress => self.dwell_in_progress,
            Status::Review => self.dwell_review,
            Status::Testing => self.dwell_testing,
            Status::Done => 0,
        };
        Duration::minutes(minutes)
    }
}
