//! Error types for ticketd.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ticket not found: {0}")]
    NotFound(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
