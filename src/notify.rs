//! Completion notifications.
//!
//! Digest composition plus the notifier seam. Delivery reports a success
//! flag, never an error: a failed send is logged by the caller and lost for
//! that cycle (no retry, no outbox).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::model::Ticket;

/// Delivers a composed digest to a contact address.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// `true` on delivery, `false` on any failure (including disabled
    /// configuration). Never errors.
    async fn send(&self, to: &str, subject: &str, body: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Digest composition
// ---------------------------------------------------------------------------

/// One aggregated notification covering all of an owner's newly-completed
/// tickets for a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub body: String,
}

/// Compose the single message for one owner's batch. Subject phrasing is
/// singular for one ticket, plural for more.
pub fn compose_digest(tickets: &[Ticket], now: DateTime<Utc>) -> Digest {
    let count = tickets.len();

    let subject = if count == 1 {
        format!("Ticket Completed: {}", tickets[0].title)
    } else {
        format!("{count} Tickets Completed in Your Account")
    };

    let mut body = if count == 1 {
        "1 Ticket Completed!\n".to_string()
    } else {
        format!("{count} Tickets Completed!\n")
    };

    for (idx, ticket) in tickets.iter().enumerate() {
        let completed_at = ticket
            .status_history
            .last()
            .map(|entry| entry.timestamp)
            .unwrap_or(now);
        body.push_str(&format!(
            "\nTicket {n}\n  Title: {title}\n  Description: {description}\n  Status: Done\n  Ticket ID: {id}\n  Completed At: {completed_at}\n",
            n = idx + 1,
            title = ticket.title,
            description = ticket.description,
            id = ticket.id,
        ));
    }

    body.push_str(&format!(
        "\nThe above ticket{} been successfully completed.\n",
        if count == 1 { " has" } else { "s have" }
    ));

    Digest { subject, body }
}

// ---------------------------------------------------------------------------
// Webhook notifier
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts digests as JSON to a configured webhook endpoint.
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
    token: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn new(endpoint: String, token: Option<SecretString>, timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            endpoint,
            token,
        }
    }

    /// Build a notifier from config. `None` when no endpoint is configured —
    /// the caller substitutes [`DisabledNotifier`] and progression still runs.
    pub fn from_config(config: &Config) -> Option<Self> {
        config.notify_webhook_url.as_ref().map(|endpoint| {
            Self::new(
                endpoint.clone(),
                config.notify_token.clone(),
                Duration::from_secs(config.notify_timeout_seconds),
            )
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&WebhookPayload { to, subject, body });

        if let Some(ref token) = self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(to, status = %response.status(), "notification rejected");
                false
            }
            Err(e) => {
                warn!(to, "notification send failed: {e}");
                false
            }
        }
    }
}

/// Stand-in used when notification config is missing. Sending is disabled
/// but status progression is unaffected.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, to: &str, _subject: &str, _body: &str) -> bool {
        warn!(to, "notification config missing, skipping send");
        false
    }
}
