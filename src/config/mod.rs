//! Typed configuration from environment variables.
//!
//! Loads once at startup. Every key has a documented default; an absent or
//! malformed value falls back to its default rather than failing the
//! process. The webhook token is wrapped in secrecy::SecretString to
//! prevent log leaks.

use secrecy::SecretString;

use crate::transitions::{
    DEFAULT_DWELL_IN_PROGRESS, DEFAULT_DWELL_OPEN, DEFAULT_DWELL_REVIEW, DEFAULT_DWELL_TESTING,
};

/// Default scan cadence: once per minute.
pub const DEFAULT_SCAN_INTERVAL_SECONDS: u64 = 60;

/// Default per-call bound on notifier / directory I/O.
pub const DEFAULT_NOTIFY_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: String,

    /// Minimum minutes in `Open` before advancing.
    pub dwell_open_minutes: i64,
    /// Minimum minutes in `In Progress` before advancing.
    pub dwell_in_progress_minutes: i64,
    /// Minimum minutes in `Review` before advancing.
    pub dwell_review_minutes: i64,
    /// Minimum minutes in `Testing` before advancing.
    pub dwell_testing_minutes: i64,

    /// Seconds between scheduled pipeline cycles.
    pub scan_interval_seconds: u64,

    /// Webhook endpoint for completion digests. `None` disables sending;
    /// status progression still runs.
    pub notify_webhook_url: Option<String>,
    /// Optional bearer token for the webhook endpoint.
    pub notify_token: Option<SecretString>,
    /// Per-send timeout in seconds.
    pub notify_timeout_seconds: u64,

    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup. Lets tests supply
    /// values without touching process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_path: lookup("TICKETD_DB").unwrap_or_else(|| "ticketd.db".to_string()),
            dwell_open_minutes: parse_or(&lookup, "OPEN_TO_INPROGRESS_MINUTES", DEFAULT_DWELL_OPEN),
            dwell_in_progress_minutes: parse_or(
                &lookup,
                "INPROGRESS_TO_REVIEW_MINUTES",
                DEFAULT_DWELL_IN_PROGRESS,
            ),
            dwell_review_minutes: parse_or(
                &lookup,
                "REVIEW_TO_TESTING_MINUTES",
                DEFAULT_DWELL_REVIEW,
            ),
            dwell_testing_minutes: parse_or(
                &lookup,
                "TESTING_TO_DONE_MINUTES",
                DEFAULT_DWELL_TESTING,
            ),
            scan_interval_seconds: parse_or(
                &lookup,
                "SCAN_INTERVAL_SECONDS",
                DEFAULT_SCAN_INTERVAL_SECONDS,
            ),
            notify_webhook_url: lookup("NOTIFY_WEBHOOK_URL").filter(|v| !v.trim().is_empty()),
            notify_token: lookup("NOTIFY_TOKEN").map(SecretString::from),
            notify_timeout_seconds: parse_or(
                &lookup,
                "NOTIFY_TIMEOUT_SECONDS",
                DEFAULT_NOTIFY_TIMEOUT_SECONDS,
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    lookup(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
