//! Tests for digest composition and the webhook notifier.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use secrecy::SecretString;
use ticketd::model::{OwnerId, Status, StatusEntry, Ticket};
use ticketd::notify::{DisabledNotifier, Notifier, WebhookNotifier, compose_digest};
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn done_ticket(title: &str) -> Ticket {
    let mut ticket = Ticket::new(OwnerId::new("7"), title, "a finished ticket");
    ticket.status = Status::Done;
    ticket.status_history.push(StatusEntry {
        status: Status::Done,
        timestamp: Utc::now(),
    });
    ticket.updated_at = Utc::now();
    ticket
}

// ---------------------------------------------------------------------------
// Digest composition
// ---------------------------------------------------------------------------

#[test]
fn single_ticket_digest_uses_singular_phrasing() {
    let tickets = vec![done_ticket("ship the release")];
    let digest = compose_digest(&tickets, Utc::now());

    assert_eq!(digest.subject, "Ticket Completed: ship the release");
    assert!(digest.body.contains("ship the release"));
    assert!(digest.body.contains("ticket has been successfully completed"));
}

#[test]
fn multi_ticket_digest_uses_plural_phrasing_and_lists_all() {
    let tickets = vec![
        done_ticket("first"),
        done_ticket("second"),
        done_ticket("third"),
    ];
    let digest = compose_digest(&tickets, Utc::now());

    assert_eq!(digest.subject, "3 Tickets Completed in Your Account");
    assert!(digest.body.contains("first"));
    assert!(digest.body.contains("second"));
    assert!(digest.body.contains("third"));
    assert!(digest.body.contains("tickets have been successfully completed"));
}

#[test]
fn digest_body_includes_ticket_ids_and_completion_times() {
    let ticket = done_ticket("traceable");
    let completed_at = ticket.status_history.last().unwrap().timestamp;
    let digest = compose_digest(std::slice::from_ref(&ticket), Utc::now());

    assert!(digest.body.contains(&ticket.id.to_string()));
    assert!(digest.body.contains(&completed_at.to_string()));
}

#[test]
fn digest_falls_back_to_now_for_missing_history() {
    // Should not happen given the history invariant, but must not panic
    let mut ticket = done_ticket("empty history");
    ticket.status_history.clear();

    let now = Utc::now() - Duration::minutes(1);
    let digest = compose_digest(std::slice::from_ref(&ticket), now);
    assert!(digest.body.contains(&now.to_string()));
}

// ---------------------------------------------------------------------------
// Webhook notifier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn webhook_send_posts_payload_and_reports_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(body_partial_json(serde_json::json!({
            "to": "kay@example.com",
            "subject": "Ticket Completed: x",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(
        format!("{}/notify", server.uri()),
        None,
        StdDuration::from_secs(5),
    );

    let delivered = notifier
        .send("kay@example.com", "Ticket Completed: x", "body text")
        .await;
    assert!(delivered);
}

#[tokio::test]
async fn webhook_sends_bearer_token_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(bearer_token("hook-secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(
        format!("{}/notify", server.uri()),
        Some(SecretString::from("hook-secret")),
        StdDuration::from_secs(5),
    );

    assert!(notifier.send("kay@example.com", "subject", "body").await);
}

#[tokio::test]
async fn webhook_rejection_reports_failure_without_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(server.uri(), None, StdDuration::from_secs(5));
    assert!(!notifier.send("kay@example.com", "subject", "body").await);
}

#[tokio::test]
async fn webhook_unreachable_endpoint_reports_failure() {
    // Nothing is listening here
    let notifier = WebhookNotifier::new(
        "http://127.0.0.1:1/notify".to_string(),
        None,
        StdDuration::from_secs(1),
    );
    assert!(!notifier.send("kay@example.com", "subject", "body").await);
}

#[tokio::test]
async fn disabled_notifier_always_reports_failure() {
    assert!(!DisabledNotifier.send("kay@example.com", "subject", "body").await);
}
