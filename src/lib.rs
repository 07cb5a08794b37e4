//! # notesrv - Self-Destructing Note Sharing
//!
//! notesrv stores short text notes behind unguessable identifiers. A note
//! created without an expiration can be read exactly once; a note created
//! with one of the timed modes stays readable until it expires, after which
//! the next read or the periodic prune removes it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               notesrv                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   rocket    │───>│ ApiHandler  │───>│ NoteService │<──┐              │
//! │  │ /api/create │    │  validate   │    │  uid        │   │              │
//! │  │ /api/get    │    │  reply      │    │  expiration │   │              │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘   │              │
//! │                                               │          │              │
//! │                                               ▼          │              │
//! │                     ┌─────────────────────────────────┐  │              │
//! │                     │          dyn NoteStore          │  │              │
//! │                     │ Sqlite | Postgres | Memory      │  │              │
//! │                     └─────────────────────────────────┘  │              │
//! │                                                          │              │
//! │                     ┌────────────────────────────────────┴───────────┐  │
//! │                     │           PruneSweeper                         │  │
//! │                     │      (Background Tokio Task)                   │  │
//! │                     └────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use notesrv::config::AppConfig;
//! use notesrv::notes::{start_prune_sweeper, NoteService};
//! use notesrv::server::{build_rocket, rocket_figment};
//! use notesrv::ApiHandler;
//!
//! #[rocket::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load("notesrv.toml")?;
//!     let database = config.database.clone();
//!     let store = tokio::task::spawn_blocking(move || database.open_store()).await??;
//!     let notes = NoteService::new(store);
//!     let _sweeper = start_prune_sweeper(notes.clone());
//!
//!     build_rocket(rocket_figment(&config), ApiHandler::new(notes), None)
//!         .launch()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the notes table and its three backends
//! - [`notes`]: note lifecycle rules and the prune sweeper
//! - [`api`]: JSON request validation and replies
//! - [`server`]: rocket routes, catchers and static assets
//! - [`config`]: layered configuration
//! - [`clock`]: injectable time source
//!
//! ## Consuming Reads
//!
//! Reading a note and deleting it happen inside one store transaction, so
//! two concurrent readers of a single-read note can never both receive it.

pub mod api;
pub mod clock;
pub mod config;
pub mod notes;
pub mod server;
pub mod storage;

pub use api::{ApiHandler, ApiReply};
pub use notes::{NoteError, NoteService};
pub use storage::{MemoryStore, NoteStore, PostgresStore, SqliteStore, StoreError};

/// Version of notesrv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
