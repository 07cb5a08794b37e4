//! Note Lifecycle Module
//!
//! This module sits between the API layer and the store. It owns everything
//! the store deliberately does not: uid generation, the expiration-mode
//! table, and the rule deciding which reads destroy a note.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ApiHandler    │  (api module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │   NoteService   │<─────│  PruneSweeper   │  (fixed-interval task)
//! │                 │      └─────────────────┘
//! │  - uid          │
//! │  - expiration   │
//! │  - consume rule │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  dyn NoteStore  │  (storage module)
//! └─────────────────┘
//! ```

pub mod expiration;
pub mod service;
pub mod sweeper;
pub mod uid;

pub use expiration::ExpirationMode;
pub use service::{FetchedNote, NoteError, NoteResult, NoteService, DEFAULT_TITLE};
pub use sweeper::{start_prune_sweeper, PruneSweeper, SweeperConfig, DEFAULT_PRUNE_INTERVAL};
pub use uid::{generate_uid, UID_LENGTH};
