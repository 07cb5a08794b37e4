//! Storage errors.

use thiserror::Error;

/// Errors surfaced by a [`NoteStore`](crate::storage::NoteStore) backend.
///
/// Absence of a row is never an error; lookups return `Option` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert collided with a live note's uid.
    #[error("a note with uid {0} already exists")]
    DuplicateIdentifier(String),

    /// SQLite failed to execute a statement.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL failed to execute a statement or hand out a connection.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// The PostgreSQL backend was created outside a Tokio runtime.
    #[error("no Tokio runtime to drive the PostgreSQL pool: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    /// No pooled connection could be acquired.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The database file or its directory could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be turned back into a note.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Result type alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
