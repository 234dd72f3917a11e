//! Manual ticket mutation, ownership-scoped.
//!
//! The access-controlled surface behind the user-facing API. Unlike the
//! engine path, which trusts the transition table by construction, this path
//! accepts external input and revalidates it. The scheduler's privileged
//! access is modeled as an explicit [`Actor::System`] rather than a separate
//! code fork.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::model::{OwnerId, Status, Ticket, TicketId};
use crate::store::TicketStore;
use crate::transitions::TransitionTable;

/// Who is asking. `System` is the engine's permission level: unscoped access
/// to every ticket. `Owner` sees and mutates only their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    System,
    Owner(OwnerId),
}

impl Actor {
    fn may_access(&self, ticket: &Ticket) -> bool {
        match self {
            Actor::System => true,
            Actor::Owner(owner) => &ticket.owner == owner,
        }
    }
}

/// Ownership-scoped CRUD and status changes over the same store the engine
/// advances automatically.
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    table: TransitionTable,
}

impl TicketService {
    pub fn new(store: Arc<dyn TicketStore>, table: TransitionTable) -> Self {
        Self { store, table }
    }

    /// Create a ticket for `owner`. Title and description are required.
    pub async fn create(
        &self,
        owner: OwnerId,
        title: &str,
        description: &str,
    ) -> Result<Ticket> {
        if title.trim().is_empty() || description.trim().is_empty() {
            return Err(Error::Other(
                "title and description are required".to_string(),
            ));
        }

        let ticket = Ticket::new(owner, title, description);
        self.store.insert(&ticket).await?;
        Ok(ticket)
    }

    /// Fetch one ticket the actor may access. Missing and forbidden collapse
    /// to the same not-found, so ownership cannot be probed.
    pub async fn get(&self, actor: &Actor, id: TicketId) -> Result<Ticket> {
        match self.store.get(id).await? {
            Some(ticket) if actor.may_access(&ticket) => Ok(ticket),
            _ => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Tickets visible to the actor, newest first.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Ticket>> {
        match actor {
            Actor::System => self.store.list_all().await,
            Actor::Owner(owner) => self.store.list_for_owner(owner).await,
        }
    }

    /// Edit title/description. Touches `updated_at`, which resets the
    /// ticket's dwell clock.
    pub async fn update(
        &self,
        actor: &Actor,
        id: TicketId,
        title: &str,
        description: &str,
    ) -> Result<Ticket> {
        // Ownership check before the write.
        self.get(actor, id).await?;

        self.store
            .update_fields(id, title, description, Utc::now())
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub async fn delete(&self, actor: &Actor, id: TicketId) -> Result<()> {
        self.get(actor, id).await?;

        if self.store.delete(id).await? {
            Ok(())
        } else {
            Err(Error::NotFound(id.to_string()))
        }
    }

    /// Set a ticket's status from external input. Revalidates the status
    /// string, appends history via the same atomic store write the engine
    /// uses, and respects ownership.
    pub async fn set_status(&self, actor: &Actor, id: TicketId, status: &str) -> Result<Ticket> {
        let new_status = Status::from_str(status)?;
        let current = self.get(actor, id).await?;

        self.store
            .advance_status(id, current.status, new_status, Utc::now())
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// The transition the engine would apply from `current`. Exposed so
    /// manual bulk transitions stay consistent with automatic progression.
    pub fn next_status(&self, current: Status) -> Option<Status> {
        self.table.next_status(current)
    }
}
