//! In-Memory Note Store
//!
//! A sharded, thread-safe map from uid to [`Note`]. Nothing survives a
//! restart, which makes it suitable for tests and throwaway deployments.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MemoryStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A uid always hashes to the same shard, so holding that shard's write
//! lock is enough to make a lookup-then-delete atomic for that uid.

use crate::storage::{NewNote, Note, NoteStore, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of shards for the store.
const NUM_SHARDS: usize = 64;

#[derive(Debug, Default)]
struct Shard {
    notes: RwLock<HashMap<String, Note>>,
}

impl Shard {
    // Every critical section leaves the map consistent, so a poisoned lock
    // is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Note>> {
        self.notes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Note>> {
        self.notes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counters describing the work a [`MemoryStore`] has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub notes: u64,
    pub inserts: u64,
    pub lookups: u64,
    pub deletes: u64,
    pub pruned: u64,
}

/// The in-memory [`NoteStore`] backend.
pub struct MemoryStore {
    shards: Vec<Shard>,

    /// Next surrogate id to hand out
    next_id: AtomicI64,

    note_count: AtomicU64,
    insert_count: AtomicU64,
    lookup_count: AtomicU64,
    delete_count: AtomicU64,
    pruned_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("notes", &self.note_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            next_id: AtomicI64::new(1),
            note_count: AtomicU64::new(0),
            insert_count: AtomicU64::new(0),
            lookup_count: AtomicU64::new(0),
            delete_count: AtomicU64::new(0),
            pruned_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_index(&self, uid: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        uid.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn shard(&self, uid: &str) -> &Shard {
        &self.shards[self.shard_index(uid)]
    }

    fn removed(&self, count: u64) {
        if count > 0 {
            self.note_count.fetch_sub(count, Ordering::Relaxed);
        }
    }

    /// Returns the number of live notes.
    pub fn len(&self) -> u64 {
        self.note_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            notes: self.note_count.load(Ordering::Relaxed),
            inserts: self.insert_count.load(Ordering::Relaxed),
            lookups: self.lookup_count.load(Ordering::Relaxed),
            deletes: self.delete_count.load(Ordering::Relaxed),
            pruned: self.pruned_count.load(Ordering::Relaxed),
        }
    }
}

impl NoteStore for MemoryStore {
    fn ensure_schema(&self) -> StoreResult<()> {
        Ok(())
    }

    fn insert(&self, note: NewNote) -> StoreResult<String> {
        self.insert_count.fetch_add(1, Ordering::Relaxed);

        let mut notes = self.shard(&note.uid).write();
        if notes.contains_key(&note.uid) {
            return Err(StoreError::DuplicateIdentifier(note.uid));
        }

        let uid = note.uid.clone();
        let stored = Note {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            uid: note.uid,
            title: note.title,
            body: note.body,
            created_at: note.created_at,
            expires_at: note.expires_at,
        };
        notes.insert(uid.clone(), stored);
        self.note_count.fetch_add(1, Ordering::Relaxed);

        Ok(uid)
    }

    fn lookup_by_uid(&self, uid: &str) -> StoreResult<Option<Note>> {
        self.lookup_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.shard(uid).read().get(uid).cloned())
    }

    fn delete_by_uid(&self, uid: &str) -> StoreResult<()> {
        self.delete_count.fetch_add(1, Ordering::Relaxed);
        if self.shard(uid).write().remove(uid).is_some() {
            self.removed(1);
        }
        Ok(())
    }

    fn delete_by_id(&self, id: i64) -> StoreResult<()> {
        self.delete_count.fetch_add(1, Ordering::Relaxed);

        // The id is not part of the shard key, so every shard is a candidate
        for shard in &self.shards {
            let mut notes = shard.write();
            let uid = notes
                .values()
                .find(|note| note.id == id)
                .map(|note| note.uid.clone());
            if let Some(uid) = uid {
                notes.remove(&uid);
                self.removed(1);
                break;
            }
        }
        Ok(())
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut pruned = 0u64;

        for shard in &self.shards {
            let mut notes = shard.write();
            let before = notes.len();
            notes.retain(|_, note| !note.is_expired_at(now));
            pruned += (before - notes.len()) as u64;
        }

        self.removed(pruned);
        self.pruned_count.fetch_add(pruned, Ordering::Relaxed);
        Ok(pruned)
    }

    fn take_by_uid(
        &self,
        uid: &str,
        should_delete: &dyn Fn(&Note) -> bool,
    ) -> StoreResult<Option<Note>> {
        self.lookup_count.fetch_add(1, Ordering::Relaxed);

        let mut notes = self.shard(uid).write();
        let Some(note) = notes.get(uid) else {
            return Ok(None);
        };

        if should_delete(note) {
            self.delete_count.fetch_add(1, Ordering::Relaxed);
            let taken = notes.remove(uid);
            self.removed(1);
            return Ok(taken);
        }

        Ok(Some(note.clone()))
    }
}
