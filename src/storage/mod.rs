//! Note Storage
//!
//! This module owns the notes table: creation, lookup, deletion and bulk
//! pruning of expired rows. It applies no business policy; deciding *when*
//! a note should disappear is the job of [`NoteService`](crate::notes::NoteService).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           dyn NoteStore                             │
//! │                                                                     │
//! │  ┌───────────────────┐  ┌───────────────────┐  ┌─────────────────┐  │
//! │  │   SqliteStore     │  │  PostgresStore    │  │   MemoryStore   │  │
//! │  │  r2d2 pool        │  │  sqlx pool        │  │  64 RwLock      │  │
//! │  │  one txn per call │  │  one txn per call │  │  shards         │  │
//! │  └───────────────────┘  └───────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every backend makes each mutating call a single atomic unit. In
//! particular [`NoteStore::take_by_uid`] looks a row up and conditionally
//! deletes it without any other caller being able to observe the row in
//! between, which is what makes a consuming read safe under concurrency.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use notesrv::storage::{MemoryStore, NewNote, NoteStore};
//!
//! let store = MemoryStore::new();
//! store.ensure_schema().unwrap();
//!
//! let now = Utc::now();
//! store
//!     .insert(NewNote {
//!         uid: "abc".to_string(),
//!         title: "Untitled".to_string(),
//!         body: "hello".to_string(),
//!         created_at: now,
//!         expires_at: None,
//!     })
//!     .unwrap();
//!
//! let taken = store.take_by_uid("abc", &|_| true).unwrap();
//! assert_eq!(taken.map(|n| n.body), Some("hello".to_string()));
//! assert!(store.lookup_by_uid("abc").unwrap().is_none());
//! ```

pub mod error;
pub mod memory;
pub mod postgres;
pub mod sqlite;

use chrono::{DateTime, Utc};

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, StoreStats};
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// A stored note, as read back from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Surrogate key, assigned by the backend
    pub id: i64,
    /// Externally visible identifier
    pub uid: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the note never expires by time
    pub expires_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Whether the note's expiry time lies strictly before `now`.
    ///
    /// Notes without an expiry time are never expired.
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }
}

/// The fields of a note to be inserted. The surrogate id is assigned by the
/// backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub uid: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Durable CRUD primitives over the notes table.
///
/// Implementations must be safe to share across threads; callers hold an
/// `Arc<dyn NoteStore>` and invoke it from many requests at once. A call
/// never keeps a connection or lock past its own return.
pub trait NoteStore: Send + Sync {
    /// Creates the notes table if it is absent. Calling it again is a no-op.
    fn ensure_schema(&self) -> StoreResult<()>;

    /// Inserts a new note and returns its uid.
    ///
    /// Fails with [`StoreError::DuplicateIdentifier`] if a live note already
    /// uses the uid; the existing row is left untouched.
    fn insert(&self, note: NewNote) -> StoreResult<String>;

    /// Reads a note by uid without mutating anything.
    fn lookup_by_uid(&self, uid: &str) -> StoreResult<Option<Note>>;

    /// Deletes the note with this uid, if any.
    fn delete_by_uid(&self, uid: &str) -> StoreResult<()>;

    /// Deletes the note with this surrogate id, if any.
    fn delete_by_id(&self, id: i64) -> StoreResult<()>;

    /// Deletes every note whose expiry time is strictly before `now`.
    ///
    /// Notes without an expiry time are never touched. Returns the number
    /// of rows removed.
    fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Atomically looks up a note and deletes it if `should_delete` holds.
    ///
    /// Returns the note as it was read, whether or not it was deleted. No
    /// concurrent caller can observe the row once a deleting call has
    /// committed, and two concurrent deleting calls cannot both see it.
    fn take_by_uid(
        &self,
        uid: &str,
        should_delete: &dyn Fn(&Note) -> bool,
    ) -> StoreResult<Option<Note>>;
}
