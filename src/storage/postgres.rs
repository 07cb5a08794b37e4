//! PostgreSQL Note Store
//!
//! Backend on an sqlx connection pool. sqlx is async while [`NoteStore`] is
//! synchronous, so each call drives its query on the Tokio runtime the store
//! was created in. Callers must already be off the async executor
//! (`spawn_blocking` or a plain thread), as every caller in this crate is.
//!
//! ```text
//! blocking thread ──> Handle::block_on ──> PgPool ──> BEGIN .. COMMIT
//! ```
//!
//! Consuming reads lock the row with `SELECT ... FOR UPDATE`. A second
//! consumer blocks on that lock and, once the first one commits its
//! `DELETE`, finds no row.

use crate::storage::{NewNote, Note, NoteStore, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::prelude::FromRow;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// How long a call waits for a free pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS notes (
        id BIGSERIAL PRIMARY KEY,
        uid TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        note TEXT NOT NULL,
        created TIMESTAMPTZ NOT NULL,
        expires TIMESTAMPTZ
    )
";

const CREATE_EXPIRES_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_notes_expires ON notes(expires)";

const SELECT_BY_UID: &str =
    "SELECT id, uid, title, note, created, expires FROM notes WHERE uid = $1";

const SELECT_BY_UID_FOR_UPDATE: &str =
    "SELECT id, uid, title, note, created, expires FROM notes WHERE uid = $1 FOR UPDATE";

#[derive(Debug, FromRow)]
struct NoteRow {
    id: i64,
    uid: String,
    title: String,
    note: String,
    created: DateTime<Utc>,
    expires: Option<DateTime<Utc>>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            uid: row.uid,
            title: row.title,
            body: row.note,
            created_at: row.created,
            expires_at: row.expires,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

/// The PostgreSQL [`NoteStore`] backend.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    runtime: Handle,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("connections", &self.pool.size())
            .field("idle", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresStore {
    /// Creates a store on the current Tokio runtime.
    ///
    /// Connections are opened lazily, so an unreachable server surfaces on
    /// the first call rather than here.
    pub fn connect(options: PgConnectOptions, pool_size: u32) -> StoreResult<Self> {
        Self::with_runtime(options, pool_size, Handle::try_current()?)
    }

    /// Creates a store whose queries run on `runtime`.
    pub fn with_runtime(
        options: PgConnectOptions,
        pool_size: u32,
        runtime: Handle,
    ) -> StoreResult<Self> {
        let _guard = runtime.enter();
        let pool = PgPoolOptions::new()
            .max_connections(pool_size.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy_with(options);

        debug!(pool_size, "Created PostgreSQL connection pool");
        Ok(Self { pool, runtime })
    }

    fn block_on<T, F>(&self, future: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        self.runtime.block_on(future)
    }
}

impl NoteStore for PostgresStore {
    fn ensure_schema(&self) -> StoreResult<()> {
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;
            sqlx::query(CREATE_EXPIRES_INDEX).execute(&mut *tx).await?;
            tx.commit().await?;
            Ok(())
        })
    }

    fn insert(&self, note: NewNote) -> StoreResult<String> {
        self.block_on(async {
            let mut tx = self.pool.begin().await?;

            let inserted = sqlx::query(
                "INSERT INTO notes (uid, title, note, created, expires) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&note.uid)
            .bind(&note.title)
            .bind(&note.body)
            .bind(note.created_at)
            .bind(note.expires_at)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::DuplicateIdentifier(note.uid.clone()));
                }
                Err(e) => return Err(e.into()),
            }

            tx.commit().await?;
            Ok(note.uid.clone())
        })
    }

    fn lookup_by_uid(&self, uid: &str) -> StoreResult<Option<Note>> {
        self.block_on(async {
            let row: Option<NoteRow> = sqlx::query_as(SELECT_BY_UID)
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(Note::from))
        })
    }

    fn delete_by_uid(&self, uid: &str) -> StoreResult<()> {
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM notes WHERE uid = $1")
                .bind(uid)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
    }

    fn delete_by_id(&self, id: i64) -> StoreResult<()> {
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM notes WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            let pruned = sqlx::query("DELETE FROM notes WHERE expires IS NOT NULL AND expires < $1")
                .bind(now)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            tx.commit().await?;
            Ok(pruned)
        })
    }

    fn take_by_uid(
        &self,
        uid: &str,
        should_delete: &dyn Fn(&Note) -> bool,
    ) -> StoreResult<Option<Note>> {
        self.block_on(async {
            let mut tx = self.pool.begin().await?;

            let row: Option<NoteRow> = sqlx::query_as(SELECT_BY_UID_FOR_UPDATE)
                .bind(uid)
                .fetch_optional(&mut *tx)
                .await?;
            let Some(note) = row.map(Note::from) else {
                return Ok(None);
            };

            if should_delete(&note) {
                sqlx::query("DELETE FROM notes WHERE id = $1")
                    .bind(note.id)
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok(Some(note))
        })
    }
}
