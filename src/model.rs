//! Core data model.
//!
//! A ticket is a unit of tracked work. It has identity, an owner, a current
//! lifecycle status, and an append-only history of every status it has held.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// A unit of work tracked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identifier.
    pub id: TicketId,

    pub title: String,

    pub description: String,

    /// Current lifecycle status. Mutable only via a transition.
    pub status: Status,

    /// Append-only record of every status the ticket has held, including the
    /// initial one at creation. The last entry always matches `status`.
    pub status_history: Vec<StatusEntry>,

    /// The owning party. Set at creation, immutable thereafter.
    pub owner: OwnerId,

    pub created_at: DateTime<Utc>,

    /// Timestamp of the most recent status transition or field edit.
    /// The dwell-time anchor for automatic progression.
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a new ticket in the initial status, seeding the history with
    /// the creation entry so the history invariant holds from birth.
    pub fn new(
        owner: OwnerId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TicketId::new(),
            title: title.into(),
            description: description.into(),
            status: Status::Open,
            status_history: vec![StatusEntry {
                status: Status::Open,
                timestamp: now,
            }],
            owner,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One status-history record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: Status,
    pub timestamp: DateTime<Utc>,
}

/// Newtype for ticket IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

/// Newtype for owner identifiers. Opaque; the owner directory maps these to
/// contact addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a ticket. The progression is a straight line ending
/// at `Done`; `Done` has no outgoing transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Review,
    Testing,
    /// Terminal.
    Done,
}

impl Status {
    /// Is this the terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done)
    }

    /// All statuses, in progression order.
    pub const ALL: [Status; 5] = [
        Status::Open,
        Status::InProgress,
        Status::Review,
        Status::Testing,
        Status::Done,
    ];
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Open => "Open",
            Status::InProgress => "In Progress",
            Status::Review => "Review",
            Status::Testing => "Testing",
            Status::Done => "Done",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Status {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Status::Open),
            "In Progress" => Ok(Status::InProgress),
            "Review" => Ok(Status::Review),
            "Testing" => Ok(Status::Testing),
            "Done" => Ok(Status::Done),
            other => Err(crate::error::Error::InvalidStatus(other.to_string())),
        }
    }
}
