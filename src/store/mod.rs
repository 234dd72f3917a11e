//! Persistence seams.
//!
//! The engine and the manual service both talk to storage through these
//! traits, injected at construction. The engine shares the store with the
//! access-controlled manual path; the only mutual-exclusion requirement is
//! the single-ticket conditional write in [`TicketStore::advance_status`].

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{OwnerId, Status, Ticket, TicketId};

pub use sqlite::SqliteStore;

/// Ticket persistence.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a fully-formed ticket, history included.
    async fn insert(&self, ticket: &Ticket) -> Result<()>;

    /// Fetch one ticket. `None` if it does not exist.
    async fn get(&self, id: TicketId) -> Result<Option<Ticket>>;

    /// Every ticket whose status is not terminal, ordered by id so a cycle
    /// processes tickets in a reproducible order.
    async fn find_non_terminal(&self) -> Result<Vec<Ticket>>;

    /// Advance one ticket's status with a single conditional write: the
    /// update applies only if the ticket still exists and its status still
    /// equals `from`. Sets `status` and `updated_at` and appends one history
    /// entry, atomically. Returns `None` when the condition fails (ticket
    /// deleted, or its status changed underneath us) — callers skip and move
    /// on; the failed condition also makes a duplicate advance harmless.
    async fn advance_status(
        &self,
        id: TicketId,
        from: Status,
        to: Status,
        at: DateTime<Utc>,
    ) -> Result<Option<Ticket>>;

    /// All tickets for one owner, newest first.
    async fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Ticket>>;

    /// All tickets, newest first.
    async fn list_all(&self) -> Result<Vec<Ticket>>;

    /// Edit title/description, touching `updated_at`. `None` if missing.
    async fn update_fields(
        &self,
        id: TicketId,
        title: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Ticket>>;

    /// Delete a ticket and its history. Returns whether anything was deleted.
    async fn delete(&self, id: TicketId) -> Result<bool>;
}

/// Resolves an owner id to a contact address.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    /// `None` when the owner is unknown or has no address on file.
    async fn resolve_contact(&self, owner: &OwnerId) -> Result<Option<String>>;
}
