//! Note Lifecycle
//!
//! [`NoteService`] turns caller intent into store operations: it generates
//! uids, computes expiry times from expiration modes and decides when a
//! read also destroys the note.
//!
//! ## Fetch Semantics
//!
//! ```text
//! take_by_uid(uid) ──> absent ─────────────────────────────> NotFound
//!        │
//!        ▼
//!   expires_at?
//!   ├── None ───────────> delete, return note   (single read)
//!   ├── Some(< now) ────> delete, Expired
//!   └── Some(>= now) ───> keep,   return note   (re-readable until expiry)
//! ```
//!
//! Timed notes stay readable for their whole window while notes without an
//! expiry are consumed by their first read. Both the decision and the delete
//! happen inside one store transaction, so two concurrent reads of a
//! single-read note cannot both succeed.

use crate::clock::{Clock, SystemClock};
use crate::notes::expiration::ExpirationMode;
use crate::notes::uid::generate_uid;
use crate::storage::{NewNote, Note, NoteStore, StoreError};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Title given to notes created without one.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Errors returned by [`NoteService`].
#[derive(Debug, Error)]
pub enum NoteError {
    /// No note has this uid
    #[error("note not found")]
    NotFound,

    /// The note existed but its expiry time has passed; it has been deleted
    #[error("note has expired")]
    Expired,

    /// A note was submitted without a body
    #[error("note body is empty")]
    EmptyBody,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for note lifecycle operations
pub type NoteResult<T> = Result<T, NoteError>;

/// The readable part of a fetched note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedNote {
    pub title: String,
    pub body: String,
}

/// Whether a read at `now` must delete the note.
///
/// Expired notes and notes without an expiry time are deleted; timed notes
/// still inside their window are kept.
fn should_delete(note: &Note, now: DateTime<Utc>) -> bool {
    note.is_expired_at(now) || note.expires_at.is_none()
}

/// Policy layer over a [`NoteStore`].
///
/// Holds no state of its own beyond its handles, so a single instance can
/// be cloned into every request.
#[derive(Clone)]
pub struct NoteService {
    store: Arc<dyn NoteStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for NoteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteService").finish_non_exhaustive()
    }
}

impl NoteService {
    /// Creates a service over `store` using the wall clock.
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn NoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The current time, cut to whole milliseconds so that every backend
    /// stores and compares the same instants.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(3)
    }

    /// Stores a new note and returns its uid.
    ///
    /// An absent or empty `title` becomes [`DEFAULT_TITLE`]. `mode` selects
    /// the lifetime; see [`ExpirationMode::from_mode`].
    pub fn create_note(&self, title: Option<&str>, body: &str, mode: i64) -> NoteResult<String> {
        if body.is_empty() {
            return Err(NoteError::EmptyBody);
        }

        let title = match title {
            Some(title) if !title.is_empty() => title,
            _ => DEFAULT_TITLE,
        };
        let expiration = ExpirationMode::from_mode(mode);
        let created_at = self.now();

        let uid = self.store.insert(NewNote {
            uid: generate_uid(),
            title: title.to_string(),
            body: body.to_string(),
            created_at,
            expires_at: expiration.expires_at(created_at),
        })?;

        debug!(uid = %uid, mode = expiration.code(), "Note created");
        Ok(uid)
    }

    /// Reads a note, deleting it when the read must consume it.
    pub fn fetch_note(&self, uid: &str) -> NoteResult<FetchedNote> {
        let now = self.now();

        let note = self
            .store
            .take_by_uid(uid, &|note| should_delete(note, now))?
            .ok_or(NoteError::NotFound)?;

        if note.is_expired_at(now) {
            debug!(uid = %uid, "Expired note deleted on read");
            return Err(NoteError::Expired);
        }
        if note.expires_at.is_none() {
            debug!(uid = %uid, "Single-read note consumed");
        }

        Ok(FetchedNote {
            title: note.title,
            body: note.body,
        })
    }

    /// Deletes every note whose expiry time has passed. Returns how many
    /// were removed.
    pub fn prune_expired(&self) -> NoteResult<u64> {
        Ok(self.store.prune_expired(self.now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notes::uid::{is_well_formed, UID_LENGTH};
    use crate::storage::MemoryStore;
    use chrono::Duration;

    fn create_service() -> (NoteService, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let service = NoteService::with_clock(store.clone(), clock.clone());
        (service, store, clock)
    }

    #[test]
    fn test_create_returns_well_formed_uid() {
        let (service, _, _) = create_service();

        let uid = service.create_note(Some("title"), "body", 0).unwrap();
        assert_eq!(uid.len(), UID_LENGTH);
        assert!(is_well_formed(&uid));
    }

    #[test]
    fn test_single_read_note_is_consumed() {
        let (service, store, _) = create_service();
        let uid = service.create_note(Some("title"), "body", 0).unwrap();

        let note = service.fetch_note(&uid).unwrap();
        assert_eq!(
            note,
            FetchedNote {
                title: "title".to_string(),
                body: "body".to_string(),
            }
        );

        assert!(matches!(service.fetch_note(&uid), Err(NoteError::NotFound)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_default_title() {
        let (service, store, _) = create_service();

        let uid = service.create_note(None, "body", 0).unwrap();
        assert_eq!(store.lookup_by_uid(&uid).unwrap().unwrap().title, DEFAULT_TITLE);

        let uid = service.create_note(Some(""), "body", 0).unwrap();
        assert_eq!(service.fetch_note(&uid).unwrap().title, DEFAULT_TITLE);
    }

    #[test]
    fn test_empty_body_rejected_before_store() {
        let (service, store, _) = create_service();

        let err = service.create_note(Some("title"), "", 1).unwrap_err();
        assert!(matches!(err, NoteError::EmptyBody));
        assert_eq!(store.stats().inserts, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_mode_never_expires() {
        let (service, store, _) = create_service();

        let uid = service.create_note(None, "body", 99).unwrap();
        let note = store.lookup_by_uid(&uid).unwrap().unwrap();
        assert!(note.expires_at.is_none());
    }

    #[test]
    fn test_expiry_computed_from_creation_time() {
        let (service, store, clock) = create_service();

        let uid = service.create_note(None, "body", 3).unwrap();
        let note = store.lookup_by_uid(&uid).unwrap().unwrap();
        let created_at = clock.now().trunc_subsecs(3);
        assert_eq!(note.created_at, created_at);
        assert_eq!(note.expires_at, Some(created_at + Duration::hours(1)));
    }

    #[test]
    fn test_timed_note_is_rereadable_until_expiry() {
        let (service, store, clock) = create_service();
        let uid = service.create_note(Some("t"), "b", 1).unwrap();

        assert_eq!(service.fetch_note(&uid).unwrap().body, "b");
        assert_eq!(service.fetch_note(&uid).unwrap().body, "b");

        clock.advance(Duration::minutes(4));
        assert_eq!(service.fetch_note(&uid).unwrap().body, "b");

        clock.advance(Duration::minutes(2));
        assert!(matches!(service.fetch_note(&uid), Err(NoteError::Expired)));
        assert!(store.lookup_by_uid(&uid).unwrap().is_none());

        assert!(matches!(service.fetch_note(&uid), Err(NoteError::NotFound)));
    }

    #[test]
    fn test_every_timed_mode_expires() {
        let cases = [
            (1, Duration::minutes(5)),
            (2, Duration::minutes(20)),
            (3, Duration::hours(1)),
            (4, Duration::hours(4)),
            (5, Duration::hours(24)),
        ];

        for (mode, lifetime) in cases {
            let (service, store, clock) = create_service();
            let uid = service.create_note(None, "b", mode).unwrap();

            clock.advance(lifetime);
            assert!(service.fetch_note(&uid).is_ok(), "mode {} at expiry", mode);

            clock.advance(Duration::milliseconds(1));
            assert!(
                matches!(service.fetch_note(&uid), Err(NoteError::Expired)),
                "mode {} after expiry",
                mode
            );
            assert!(store.is_empty());
        }
    }

    #[test]
    fn test_fetch_unknown_uid() {
        let (service, _, _) = create_service();
        assert!(matches!(
            service.fetch_note("doesnotexist"),
            Err(NoteError::NotFound)
        ));
    }

    #[test]
    fn test_prune_removes_only_expired() {
        let (service, store, clock) = create_service();

        let short = service.create_note(None, "short", 1).unwrap();
        let long = service.create_note(None, "long", 5).unwrap();
        let forever = service.create_note(None, "forever", 0).unwrap();

        assert_eq!(service.prune_expired().unwrap(), 0);

        clock.advance(Duration::minutes(6));
        assert_eq!(service.prune_expired().unwrap(), 1);
        assert!(store.lookup_by_uid(&short).unwrap().is_none());
        assert!(store.lookup_by_uid(&long).unwrap().is_some());
        assert!(store.lookup_by_uid(&forever).unwrap().is_some());

        assert_eq!(service.prune_expired().unwrap(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_concurrent_fetch_of_single_read_note() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;

        let (service, _, _) = create_service();
        let uid = service.create_note(None, "secret", 0).unwrap();

        let successes = Arc::new(AtomicUsize::new(0));
        let not_found = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..16 {
            let service = service.clone();
            let uid = uid.clone();
            let successes = Arc::clone(&successes);
            let not_found = Arc::clone(&not_found);
            handles.push(thread::spawn(move || match service.fetch_note(&uid) {
                Ok(_) => {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
                Err(NoteError::NotFound) => {
                    not_found.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => panic!("unexpected error: {}", e),
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(not_found.load(Ordering::SeqCst), 15);
    }
}
