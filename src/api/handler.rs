//! API Handler
//!
//! Validates request bodies for the two API operations, runs them against
//! the [`NoteService`] and shapes the replies.
//!
//! ```text
//! JSON body ──> parse ──> spawn_blocking(NoteService) ──> ApiReply
//!                 │                  │
//!                 ▼                  ▼
//!             415 / 422         201 / 200 / 404 / 500
//! ```
//!
//! Store calls are synchronous, so they run on Tokio's blocking pool. If the
//! client goes away mid-request, the blocking call still runs to commit or
//! rollback.

use crate::api::reply::ApiReply;
use crate::notes::{NoteError, NoteService};
use serde_json::Value;
use tracing::{debug, error};

/// A validated `/api/create` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub note: String,
    pub title: Option<String>,
    pub expiration: i64,
}

impl CreateRequest {
    /// Extracts the request from a JSON body.
    ///
    /// `note` must be a non-empty string. A `title` that is not a string is
    /// treated as absent and an `expiration` that is not an integer as 0.
    pub fn from_json(body: &Value) -> Result<Self, ApiReply> {
        let fields = body.as_object().ok_or_else(ApiReply::invalid_json)?;

        let note = fields
            .get("note")
            .and_then(Value::as_str)
            .filter(|note| !note.is_empty())
            .ok_or_else(ApiReply::missing_params)?;

        Ok(Self {
            note: note.to_string(),
            title: fields
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string),
            expiration: fields.get("expiration").map_or(0, expiration_mode),
        })
    }
}

/// Reads an expiration mode the way loosely typed clients send it:
/// integral floats and booleans count as the matching integer, anything
/// else as mode 0.
fn expiration_mode(value: &Value) -> i64 {
    match value {
        Value::Bool(flag) => i64::from(*flag),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|mode| mode.fract() == 0.0 && mode.abs() <= i64::MAX as f64)
                    .map(|mode| mode as i64)
            })
            .unwrap_or(0),
        _ => 0,
    }
}

/// A validated `/api/get` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub uid: String,
}

impl GetRequest {
    pub fn from_json(body: &Value) -> Result<Self, ApiReply> {
        let fields = body.as_object().ok_or_else(ApiReply::invalid_json)?;

        let uid = fields
            .get("uid")
            .and_then(Value::as_str)
            .ok_or_else(ApiReply::missing_params)?;

        Ok(Self {
            uid: uid.to_string(),
        })
    }
}

/// Handles API requests by dispatching them to the note service.
#[derive(Debug, Clone)]
pub struct ApiHandler {
    notes: NoteService,
}

impl ApiHandler {
    pub fn new(notes: NoteService) -> Self {
        Self { notes }
    }

    /// `POST /api/create`. `None` means the body could not be parsed as JSON.
    pub async fn create(&self, body: Option<Value>) -> ApiReply {
        let Some(body) = body else {
            return ApiReply::invalid_json();
        };
        let request = match CreateRequest::from_json(&body) {
            Ok(request) => request,
            Err(reply) => {
                debug!(status = reply.status, "Rejected create request");
                return reply;
            }
        };

        let notes = self.notes.clone();
        let result = tokio::task::spawn_blocking(move || {
            notes.create_note(request.title.as_deref(), &request.note, request.expiration)
        })
        .await;

        match result {
            Ok(Ok(uid)) => ApiReply::success(201, [("uid", Value::from(uid))]),
            Ok(Err(e)) => reply_for_error(e),
            Err(e) => {
                error!(error = %e, "Create task failed");
                ApiReply::internal()
            }
        }
    }

    /// `POST /api/get`. `None` means the body could not be parsed as JSON.
    pub async fn get(&self, body: Option<Value>) -> ApiReply {
        let Some(body) = body else {
            return ApiReply::invalid_json();
        };
        let request = match GetRequest::from_json(&body) {
            Ok(request) => request,
            Err(reply) => {
                debug!(status = reply.status, "Rejected get request");
                return reply;
            }
        };

        let notes = self.notes.clone();
        let result = tokio::task::spawn_blocking(move || notes.fetch_note(&request.uid)).await;

        match result {
            Ok(Ok(note)) => ApiReply::success(
                200,
                [
                    ("title", Value::from(note.title)),
                    ("note", Value::from(note.body)),
                ],
            ),
            Ok(Err(e)) => reply_for_error(e),
            Err(e) => {
                error!(error = %e, "Get task failed");
                ApiReply::internal()
            }
        }
    }
}

fn reply_for_error(err: NoteError) -> ApiReply {
    match err {
        NoteError::NotFound | NoteError::Expired => ApiReply::invalid_note(),
        NoteError::EmptyBody => ApiReply::missing_params(),
        NoteError::Store(e) => {
            error!(error = %e, "Store operation failed");
            ApiReply::internal()
        }
    }
}
