//! Tests for the SQLite store.

use chrono::{Duration, Utc};
use ticketd::model::{OwnerId, Status, StatusEntry, Ticket};
use ticketd::store::{OwnerDirectory, SqliteStore, TicketStore};

fn test_store() -> SqliteStore {
    SqliteStore::in_memory().expect("failed to create in-memory store")
}

/// A ticket whose dwell clock started `minutes_ago` in the given status.
fn backdated(owner: &str, title: &str, status: Status, minutes_ago: i64) -> Ticket {
    let at = Utc::now() - Duration::minutes(minutes_ago);
    let mut ticket = Ticket::new(OwnerId::new(owner), title, "a test ticket");
    ticket.status = status;
    ticket.status_history = vec![StatusEntry {
        status,
        timestamp: at,
    }];
    ticket.created_at = at;
    ticket.updated_at = at;
    ticket
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn insert_and_get_round_trip() {
    let store = test_store();
    let ticket = Ticket::new(OwnerId::new("7"), "fix login", "the login page 500s");

    store.insert(&ticket).await.unwrap();

    let loaded = store.get(ticket.id).await.unwrap().expect("ticket exists");
    assert_eq!(loaded.id, ticket.id);
    assert_eq!(loaded.title, "fix login");
    assert_eq!(loaded.status, Status::Open);
    assert_eq!(loaded.owner, OwnerId::new("7"));

    // History seeded with the creation entry
    assert_eq!(loaded.status_history.len(), 1);
    assert_eq!(loaded.status_history[0].status, Status::Open);
}

#[tokio::test]
async fn get_missing_ticket_is_none() {
    let store = test_store();
    let ticket = Ticket::new(OwnerId::new("7"), "never stored", "x");
    assert!(store.get(ticket.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Non-terminal query
// ---------------------------------------------------------------------------

#[tokio::test]
async fn find_non_terminal_excludes_done() {
    let store = test_store();

    store
        .insert(&backdated("7", "open one", Status::Open, 10))
        .await
        .unwrap();
    store
        .insert(&backdated("7", "testing one", Status::Testing, 10))
        .await
        .unwrap();
    store
        .insert(&backdated("7", "done one", Status::Done, 1000))
        .await
        .unwrap();

    let found = store.find_non_terminal().await.unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|t| t.status != Status::Done));
}

#[tokio::test]
async fn find_non_terminal_orders_by_id() {
    let store = test_store();
    for n in 0..5 {
        store
            .insert(&backdated("7", &format!("ticket {n}"), Status::Open, 10))
            .await
            .unwrap();
    }

    let found = store.find_non_terminal().await.unwrap();
    let ids: Vec<String> = found.iter().map(|t| t.id.0.to_string()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

// ---------------------------------------------------------------------------
// Atomic advance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn advance_appends_exactly_one_history_entry() {
    let store = test_store();
    let ticket = backdated("7", "advancing", Status::Open, 10);
    let previous_updated_at = ticket.updated_at;
    store.insert(&ticket).await.unwrap();

    let now = Utc::now();
    let updated = store
        .advance_status(ticket.id, Status::Open, Status::InProgress, now)
        .await
        .unwrap()
        .expect("advance applies");

    assert_eq!(updated.status, Status::InProgress);
    assert_eq!(updated.status_history.len(), 2);

    let last = updated.status_history.last().unwrap();
    assert_eq!(last.status, Status::InProgress);
    assert!(last.timestamp >= previous_updated_at);
    assert!(updated.updated_at > previous_updated_at);
}

#[tokio::test]
async fn advance_with_stale_from_status_is_a_noop() {
    let store = test_store();
    let ticket = backdated("7", "raced", Status::Open, 10);
    store.insert(&ticket).await.unwrap();

    // A concurrent update already moved it along
    store
        .advance_status(ticket.id, Status::Open, Status::InProgress, Utc::now())
        .await
        .unwrap()
        .expect("first advance applies");

    // The stale advance fails its condition and writes nothing
    let stale = store
        .advance_status(ticket.id, Status::Open, Status::InProgress, Utc::now())
        .await
        .unwrap();
    assert!(stale.is_none());

    let loaded = store.get(ticket.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, Status::InProgress);
    assert_eq!(loaded.status_history.len(), 2);
}

#[tokio::test]
async fn advance_of_deleted_ticket_is_none() {
    let store = test_store();
    let ticket = backdated("7", "deleted", Status::Open, 10);
    store.insert(&ticket).await.unwrap();

    assert!(store.delete(ticket.id).await.unwrap());

    let result = store
        .advance_status(ticket.id, Status::Open, Status::InProgress, Utc::now())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn history_length_tracks_advances() {
    let store = test_store();
    let ticket = backdated("7", "full run", Status::Open, 10);
    store.insert(&ticket).await.unwrap();

    let steps = [
        (Status::Open, Status::InProgress),
        (Status::InProgress, Status::Review),
        (Status::Review, Status::Testing),
        (Status::Testing, Status::Done),
    ];
    for (from, to) in steps {
        store
            .advance_status(ticket.id, from, to, Utc::now())
            .await
            .unwrap()
            .expect("advance applies");
    }

    // N advances plus the creation entry
    let loaded = store.get(ticket.id).await.unwrap().unwrap();
    assert_eq!(loaded.status_history.len(), steps.len() + 1);
    assert_eq!(loaded.status, Status::Done);
    assert_eq!(loaded.status_history.last().unwrap().status, Status::Done);
}

// ---------------------------------------------------------------------------
// Field edits and deletion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_fields_touches_updated_at() {
    let store = test_store();
    let ticket = backdated("7", "old title", Status::Open, 10);
    store.insert(&ticket).await.unwrap();

    let updated = store
        .update_fields(ticket.id, "new title", "new description", Utc::now())
        .await
        .unwrap()
        .expect("ticket exists");

    assert_eq!(updated.title, "new title");
    assert!(updated.updated_at > ticket.updated_at);
    // A field edit is not a transition; history is untouched
    assert_eq!(updated.status_history.len(), 1);
}

#[tokio::test]
async fn delete_removes_ticket_and_history() {
    let store = test_store();
    let ticket = backdated("7", "to delete", Status::Review, 10);
    store.insert(&ticket).await.unwrap();

    assert!(store.delete(ticket.id).await.unwrap());
    assert!(store.get(ticket.id).await.unwrap().is_none());
    // Second delete finds nothing
    assert!(!store.delete(ticket.id).await.unwrap());
}

// ---------------------------------------------------------------------------
// Owner directory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_contact_for_registered_owner() {
    let store = test_store();
    let owner = OwnerId::new("7");
    store
        .register_owner(&owner, "Kay", Some("kay@example.com"))
        .unwrap();

    let contact = store.resolve_contact(&owner).await.unwrap();
    assert_eq!(contact.as_deref(), Some("kay@example.com"));
}

#[tokio::test]
async fn resolve_contact_without_address_is_none() {
    let store = test_store();
    let owner = OwnerId::new("8");
    store.register_owner(&owner, "No Email", None).unwrap();

    assert!(store.resolve_contact(&owner).await.unwrap().is_none());
}

#[tokio::test]
async fn resolve_contact_for_unknown_owner_is_none() {
    let store = test_store();
    let contact = store
        .resolve_contact(&OwnerId::new("nobody"))
        .await
        .unwrap();
    assert!(contact.is_none());
}
