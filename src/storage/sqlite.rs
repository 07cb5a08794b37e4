//! SQLite Note Store
//!
//! Durable backend using rusqlite with r2d2 connection pooling. Every
//! operation checks a connection out of the pool, runs in its own
//! transaction and returns the connection before the call ends.
//!
//! Timestamps are stored as Unix milliseconds so that `expires < ?` is an
//! exact integer comparison.
//!
//! Consuming reads run in a `BEGIN IMMEDIATE` transaction: SQLite grants
//! the write lock before the `SELECT`, so two concurrent consumers of the
//! same uid are serialized and the second one finds the row already gone.

use crate::storage::{NewNote, Note, NoteStore, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// How long a connection waits for a competing writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uid TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        note TEXT NOT NULL,
        created INTEGER NOT NULL,
        expires INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_notes_expires ON notes(expires);
";

const SELECT_BY_UID: &str =
    "SELECT id, uid, title, note, created, expires FROM notes WHERE uid = ?1";

/// A row as SQLite hands it back, before timestamps are decoded.
struct NoteRow {
    id: i64,
    uid: String,
    title: String,
    body: String,
    created: i64,
    expires: Option<i64>,
}

impl NoteRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            uid: row.get(1)?,
            title: row.get(2)?,
            body: row.get(3)?,
            created: row.get(4)?,
            expires: row.get(5)?,
        })
    }

    fn into_note(self) -> StoreResult<Note> {
        let created_at = decode_timestamp(self.created)?;
        let expires_at = self.expires.map(decode_timestamp).transpose()?;
        Ok(Note {
            id: self.id,
            uid: self.uid,
            title: self.title,
            body: self.body,
            created_at,
            expires_at,
        })
    }
}

fn decode_timestamp(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", millis)))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn delete_by_id_in(conn: &Connection, id: i64) -> StoreResult<()> {
    conn.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
    Ok(())
}

/// The SQLite [`NoteStore`] backend.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("SqliteStore")
            .field("connections", &state.connections)
            .field("idle", &state.idle_connections)
            .finish()
    }
}

impl SqliteStore {
    /// Opens (creating if needed) the database file at `path` with a pool of
    /// up to `pool_size` connections.
    pub fn open(path: impl AsRef<Path>, pool_size: u32) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // WAL is a property of the file, so one connection sets it for all
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        drop(conn);

        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

        debug!(path = %path.display(), pool_size, "Opened SQLite note store");
        Ok(Self { pool })
    }

    /// Creates a private in-memory database.
    ///
    /// Each in-memory SQLite connection is its own database, so the pool is
    /// limited to a single connection that is never recycled.
    pub fn in_memory() -> StoreResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .build(manager)?;
        Ok(Self { pool })
    }
}

impl NoteStore for SqliteStore {
    fn ensure_schema(&self) -> StoreResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA)?;
        tx.commit()?;
        Ok(())
    }

    fn insert(&self, note: NewNote) -> StoreResult<String> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO notes (uid, title, note, created, expires) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                note.uid,
                note.title,
                note.body,
                note.created_at.timestamp_millis(),
                note.expires_at.map(|exp| exp.timestamp_millis()),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::DuplicateIdentifier(note.uid));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(note.uid)
    }

    fn lookup_by_uid(&self, uid: &str) -> StoreResult<Option<Note>> {
        let conn = self.pool.get()?;
        conn.query_row(SELECT_BY_UID, params![uid], NoteRow::from_row)
            .optional()?
            .map(NoteRow::into_note)
            .transpose()
    }

    fn delete_by_uid(&self, uid: &str) -> StoreResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM notes WHERE uid = ?1", params![uid])?;
        tx.commit()?;
        Ok(())
    }

    fn delete_by_id(&self, id: i64) -> StoreResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        delete_by_id_in(&tx, id)?;
        tx.commit()?;
        Ok(())
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let pruned = tx.execute(
            "DELETE FROM notes WHERE expires IS NOT NULL AND expires < ?1",
            params![now.timestamp_millis()],
        )?;
        tx.commit()?;
        Ok(pruned as u64)
    }

    fn take_by_uid(
        &self,
        uid: &str,
        should_delete: &dyn Fn(&Note) -> bool,
    ) -> StoreResult<Option<Note>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(row) = tx
            .query_row(SELECT_BY_UID, params![uid], NoteRow::from_row)
            .optional()?
        else {
            return Ok(None);
        };
        let note = row.into_note()?;

        if should_delete(&note) {
            delete_by_id_in(&tx, note.id)?;
        }

        tx.commit()?;
        Ok(Some(note))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn create_store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    fn new_note(uid: &str, expires_at: Option<DateTime<Utc>>) -> NewNote {
        // Whole milliseconds, so values survive the round trip exactly
        let created_at = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        NewNote {
            uid: uid.to_string(),
            title: "Untitled".to_string(),
            body: format!("body of {}", uid),
            created_at,
            expires_at,
        }
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let store = create_store();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = create_store();
        let expected = new_note("a", None);

        assert_eq!(store.insert(expected.clone()).unwrap(), "a");

        let note = store.lookup_by_uid("a").unwrap().unwrap();
        assert_eq!(note.uid, expected.uid);
        assert_eq!(note.title, expected.title);
        assert_eq!(note.body, expected.body);
        assert_eq!(note.created_at, expected.created_at);
        assert_eq!(note.expires_at, None);
    }

    #[test]
    fn test_expiry_timestamp_round_trips() {
        let store = create_store();
        let expected = new_note("a", None);
        let expires_at = expected.created_at + ChronoDuration::minutes(20);
        store
            .insert(NewNote {
                expires_at: Some(expires_at),
                ..expected
            })
            .unwrap();

        let note = store.lookup_by_uid("a").unwrap().unwrap();
        assert_eq!(note.expires_at, Some(expires_at));
    }

    #[test]
    fn test_lookup_nonexistent() {
        let store = create_store();
        assert!(store.lookup_by_uid("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_uid_rejected() {
        let store = create_store();
        store.insert(new_note("dup", None)).unwrap();

        let mut second = new_note("dup", None);
        second.body = "other".to_string();
        let err = store.insert(second).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateIdentifier(uid) if uid == "dup"));

        let kept = store.lookup_by_uid("dup").unwrap().unwrap();
        assert_eq!(kept.body, "body of dup");
    }

    #[test]
    fn test_delete_by_uid_and_id() {
        let store = create_store();
        store.insert(new_note("a", None)).unwrap();
        store.insert(new_note("b", None)).unwrap();

        store.delete_by_uid("a").unwrap();
        store.delete_by_uid("a").unwrap();
        assert!(store.lookup_by_uid("a").unwrap().is_none());

        let id = store.lookup_by_uid("b").unwrap().unwrap().id;
        store.delete_by_id(id).unwrap();
        store.delete_by_id(id).unwrap();
        assert!(store.lookup_by_uid("b").unwrap().is_none());
    }

    #[test]
    fn test_prune_expired() {
        let store = create_store();
        let now = Utc::now();

        store
            .insert(new_note("past", Some(now - ChronoDuration::minutes(1))))
            .unwrap();
        store
            .insert(new_note("future", Some(now + ChronoDuration::minutes(1))))
            .unwrap();
        store.insert(new_note("forever", None)).unwrap();

        assert_eq!(store.prune_expired(now).unwrap(), 1);
        assert!(store.lookup_by_uid("past").unwrap().is_none());
        assert!(store.lookup_by_uid("future").unwrap().is_some());
        assert!(store.lookup_by_uid("forever").unwrap().is_some());

        assert_eq!(store.prune_expired(now).unwrap(), 0);
    }

    #[test]
    fn test_take_by_uid_respects_predicate() {
        let store = create_store();
        store.insert(new_note("keep", None)).unwrap();
        store.insert(new_note("drop", None)).unwrap();

        assert!(store.take_by_uid("keep", &|_| false).unwrap().is_some());
        assert!(store.lookup_by_uid("keep").unwrap().is_some());

        let dropped = store.take_by_uid("drop", &|_| true).unwrap().unwrap();
        assert_eq!(dropped.body, "body of drop");
        assert!(store.lookup_by_uid("drop").unwrap().is_none());

        assert!(store.take_by_uid("missing", &|_| true).unwrap().is_none());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.db");

        {
            let store = SqliteStore::open(&path, 2).unwrap();
            store.ensure_schema().unwrap();
            store.insert(new_note("durable", None)).unwrap();
        }

        let store = SqliteStore::open(&path, 2).unwrap();
        store.ensure_schema().unwrap();
        assert!(store.lookup_by_uid("durable").unwrap().is_some());
    }

    #[test]
    fn test_concurrent_take_succeeds_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("notes.db"), 8).unwrap());
        store.ensure_schema().unwrap();
        store.insert(new_note("once", None)).unwrap();

        let successes = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let store = Arc::clone(&store);
            let successes = Arc::clone(&successes);
            handles.push(thread::spawn(move || {
                if store.take_by_uid("once", &|_| true).unwrap().is_some() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert!(store.lookup_by_uid("once").unwrap().is_none());
    }
}
