//! HTTP Server
//!
//! Mounts the API handler on rocket. Rocket owns the listener, request
//! parsing and JSON encoding; everything with content is delegated to
//! [`ApiHandler`].
//!
//! ```text
//! POST /api/create ──┐
//!                    ├──> ApiHandler ──> ApiReply ──> (Status, Json)
//! POST /api/get ─────┘
//! GET  /*  ──────────────> FileServer(static_dir)     (optional)
//! anything else ─────────> redirect to `/` if static_dir, else JSON 404
//! ```

use crate::api::{ApiHandler, ApiReply};
use crate::config::AppConfig;
use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::response::{self, Redirect, Responder};
use rocket::serde::json::{self, Json, Value};
use rocket::{catch, catchers, post, routes, Build, Request, Rocket, State};
use std::path::Path;
use tracing::{debug, warn};

impl<'r> Responder<'r, 'static> for ApiReply {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = Status::from_code(self.status).unwrap_or(Status::InternalServerError);
        (status, Json(self.body)).respond_to(request)
    }
}

fn parsed_body(body: Result<Json<Value>, json::Error<'_>>) -> Option<Value> {
    match body {
        Ok(body) => Some(body.into_inner()),
        Err(e) => {
            debug!(error = ?e, "Request body is not valid JSON");
            None
        }
    }
}

#[post("/create", data = "<body>")]
async fn api_create(
    api: &State<ApiHandler>,
    body: Result<Json<Value>, json::Error<'_>>,
) -> ApiReply {
    api.create(parsed_body(body)).await
}

#[post("/get", data = "<body>")]
async fn api_get(api: &State<ApiHandler>, body: Result<Json<Value>, json::Error<'_>>) -> ApiReply {
    api.get(parsed_body(body)).await
}

#[catch(404)]
fn redirect_home() -> Redirect {
    Redirect::to("/")
}

#[catch(404)]
fn not_found() -> ApiReply {
    ApiReply::failure(404, "Not Found")
}

#[catch(default)]
fn default_catcher(status: Status, _request: &Request<'_>) -> ApiReply {
    ApiReply::failure(status.code, status.reason().unwrap_or("Error"))
}

/// Rocket's own configuration with the listen address taken from `config`.
pub fn rocket_figment(config: &AppConfig) -> Figment {
    rocket::Config::figment()
        .merge(("address", config.address.as_str()))
        .merge(("port", config.port))
}

/// Builds the rocket instance serving `api`, plus `static_dir` at `/` if it
/// exists.
pub fn build_rocket(figment: Figment, api: ApiHandler, static_dir: Option<&Path>) -> Rocket<Build> {
    let rocket = rocket::custom(figment)
        .manage(api)
        .mount("/api", routes![api_create, api_get])
        .register("/", catchers![default_catcher]);

    match static_dir {
        Some(dir) if dir.is_dir() => rocket
            .mount("/", FileServer::from(dir))
            .register("/", catchers![redirect_home]),
        Some(dir) => {
            warn!(dir = %dir.display(), "Static directory not found, not serving assets");
            rocket.register("/", catchers![not_found])
        }
        None => rocket.register("/", catchers![not_found]),
    }
}
