//! API Module
//!
//! This module implements the two JSON request/response contracts of the
//! service, independent of the HTTP server that carries them.
//!
//! | Route          | Request body                           | Success                     |
//! |----------------|----------------------------------------|-----------------------------|
//! | `/api/create`  | `{note, title?, expiration?}`          | `201 {success, message, uid}` |
//! | `/api/get`     | `{uid}`                                | `200 {success, message, title, note}` |
//!
//! Failures: `415` for a body that is not a JSON object, `422` for missing
//! or mistyped required fields, `404` when the note does not exist or has
//! expired (one message for both), `500` for any internal fault.

pub mod handler;
pub mod reply;

pub use handler::{ApiHandler, CreateRequest, GetRequest};
pub use reply::ApiReply;
