//! API replies.
//!
//! Every reply is a JSON object carrying `success` and `message`, plus
//! operation-specific fields on success.

use serde_json::{Map, Value};

pub const MSG_SUCCESS: &str = "Successful";
pub const MSG_INVALID_JSON: &str = "Invalid JSON";
pub const MSG_MISSING_PARAMS: &str = "Missing Parameters";
pub const MSG_INVALID_NOTE: &str = "The note does not exist or has expired.";
pub const MSG_INTERNAL: &str = "Internal Error";

/// A status code and JSON body, independent of the HTTP server in use.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    /// A successful reply with `fields` merged next to `success` and `message`.
    pub fn success(status: u16, fields: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(true));
        body.insert("message".to_string(), Value::from(MSG_SUCCESS));
        for (key, value) in fields {
            body.insert(key.to_string(), value);
        }
        Self {
            status,
            body: Value::Object(body),
        }
    }

    pub fn failure(status: u16, message: &str) -> Self {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(false));
        body.insert("message".to_string(), Value::from(message));
        Self {
            status,
            body: Value::Object(body),
        }
    }

    /// 415: the body was not a JSON object.
    pub fn invalid_json() -> Self {
        Self::failure(415, MSG_INVALID_JSON)
    }

    /// 422: a required field was missing or had the wrong type.
    pub fn missing_params() -> Self {
        Self::failure(422, MSG_MISSING_PARAMS)
    }

    /// 404: the note is absent or expired. The two cases are indistinguishable
    /// to clients.
    pub fn invalid_note() -> Self {
        Self::failure(404, MSG_INVALID_NOTE)
    }

    /// 500: anything else.
    pub fn internal() -> Self {
        Self::failure(500, MSG_INTERNAL)
    }

    pub fn is_success(&self) -> bool {
        self.body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Looks up a string field of the body.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }
}
