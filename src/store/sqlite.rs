//! SQLite storage layer.
//!
//! Single source of truth for tickets, their status history, and the owner
//! directory. WAL mode for concurrent read access. The status advance is a
//! conditional UPDATE plus history INSERT inside one transaction, which is
//! what keeps a racing manual update from corrupting the history.

use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{OwnerId, Status, StatusEntry, Ticket, TicketId};
use crate::store::{OwnerDirectory, TicketStore};

/// Storage backend. Owns the SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        let conn = self.lock()?;

        // WAL mode for concurrent readers
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tickets (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                status          TEXT NOT NULL DEFAULT 'Open',
                owner           TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status)
                WHERE status != 'Done';
            CREATE INDEX IF NOT EXISTS idx_tickets_owner ON tickets(owner);

            CREATE TABLE IF NOT EXISTS status_history (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_id   TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                status      TEXT NOT NULL,
                timestamp   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_ticket ON status_history(ticket_id, seq);

            CREATE TABLE IF NOT EXISTS owners (
                owner_id    TEXT PRIMARY KEY,
                name        TEXT NOT NULL DEFAULT '',
                email       TEXT
            );
            ",
        )?;

        Ok(())
    }

    /// Register (or replace) an owner's contact record.
    pub fn register_owner(&self, owner: &OwnerId, name: &str, email: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO owners (owner_id, name, email) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner_id) DO UPDATE SET name = ?2, email = ?3",
            params![owner.0, name, email],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl TicketStore for SqliteStore {
    async fn insert(&self, ticket: &Ticket) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO tickets (id, title, description, status, owner, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                ticket.id.0.to_string(),
                ticket.title,
                ticket.description,
                ticket.status.to_string(),
                ticket.owner.0,
                ticket.created_at.to_rfc3339(),
                ticket.updated_at.to_rfc3339(),
            ],
        )?;

        for entry in &ticket.status_history {
            tx.execute(
                "INSERT INTO status_history (ticket_id, status, timestamp) VALUES (?1, ?2, ?3)",
                params![
                    ticket.id.0.to_string(),
                    entry.status.to_string(),
                    entry.timestamp.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn get(&self, id: TicketId) -> Result<Option<Ticket>> {
        let conn = self.lock()?;
        get_ticket_on(&conn, id)
    }

    async fn find_non_terminal(&self) -> Result<Vec<Ticket>> {
        let conn = self.lock()?;
        let rows = query_rows(
            &conn,
            "SELECT id, title, description, status, owner, created_at, updated_at
             FROM tickets WHERE status != 'Done' ORDER BY id ASC",
        )?;
        hydrate_all(&conn, rows)
    }

    async fn advance_status(
        &self,
        id: TicketId,
        from: Status,
        to: Status,
        at: DateTime<Utc>,
    ) -> Result<Option<Ticket>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        // Conditional write keyed by id + expected current status. Zero rows
        // means the ticket vanished or a concurrent update beat us; either
        // way the advance does not apply and no history entry is written.
        let changed = tx.execute(
            "UPDATE tickets SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![
                to.to_string(),
                at.to_rfc3339(),
                id.0.to_string(),
                from.to_string(),
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO status_history (ticket_id, status, timestamp) VALUES (?1, ?2, ?3)",
            params![id.0.to_string(), to.to_string(), at.to_rfc3339()],
        )?;

        tx.commit()?;
        get_ticket_on(&conn, id)
    }

    async fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Ticket>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, status, owner, created_at, updated_at
             FROM tickets WHERE owner = ?1 ORDER BY created_at DESC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![owner.0], row_to_parts)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        hydrate_all(&conn, rows)
    }

    async fn list_all(&self) -> Result<Vec<Ticket>> {
        let conn = self.lock()?;
        let rows = query_rows(
            &conn,
            "SELECT id, title, description, status, owner, created_at, updated_at
             FROM tickets ORDER BY created_at DESC, id ASC",
        )?;
        hydrate_all(&conn, rows)
    }

    async fn update_fields(
        &self,
        id: TicketId,
        title: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Ticket>> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tickets SET title = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![title, description, at.to_rfc3339(), id.0.to_string()],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        get_ticket_on(&conn, id)
    }

    async fn delete(&self, id: TicketId) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM tickets WHERE id = ?1",
            params![id.0.to_string()],
        )?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl OwnerDirectory for SqliteStore {
    async fn resolve_contact(&self, owner: &OwnerId) -> Result<Option<String>> {
        let conn = self.lock()?;
        let email: Option<Option<String>> = conn
            .query_row(
                "SELECT email FROM owners WHERE owner_id = ?1",
                params![owner.0],
                |row| row.get(0),
            )
            .optional()?;
        // Unknown owner and owner-without-address both resolve to None.
        Ok(email.flatten().filter(|e| !e.trim().is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Row plumbing
// ---------------------------------------------------------------------------

/// Raw column values for one ticket row, before parsing.
type RowParts = (String, String, String, String, String, String, String);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn query_rows(conn: &Connection, sql: &str) -> Result<Vec<RowParts>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], row_to_parts)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn get_ticket_on(conn: &Connection, id: TicketId) -> Result<Option<Ticket>> {
    let parts = conn
        .query_row(
            "SELECT id, title, description, status, owner, created_at, updated_at
             FROM tickets WHERE id = ?1",
            params![id.0.to_string()],
            row_to_parts,
        )
        .optional()?;

    match parts {
        Some(parts) => Ok(Some(hydrate(conn, parts)?)),
        None => Ok(None),
    }
}

fn hydrate_all(conn: &Connection, rows: Vec<RowParts>) -> Result<Vec<Ticket>> {
    rows.into_iter().map(|parts| hydrate(conn, parts)).collect()
}

/// Build a full `Ticket` from its row, loading the history in append order.
fn hydrate(conn: &Connection, parts: RowParts) -> Result<Ticket> {
    let (id, title, description, status, owner, created_at, updated_at) = parts;

    let mut stmt = conn.prepare(
        "SELECT status, timestamp FROM status_history WHERE ticket_id = ?1 ORDER BY seq ASC",
    )?;
    let history = stmt
        .query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let status_history = history
        .into_iter()
        .map(|(status, timestamp)| {
            Ok(StatusEntry {
                status: Status::from_str(&status)?,
                timestamp: parse_timestamp(&timestamp)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Ticket {
        id: TicketId(parse_uuid(&id)?),
        title,
        description,
        status: Status::from_str(&status)?,
        status_history,
        owner: OwnerId(owner),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Other(format!("corrupt ticket id {s:?}: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("corrupt timestamp {s:?}: {e}")))
}
