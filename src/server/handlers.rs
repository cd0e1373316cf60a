//! Request handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::time::Instant;

use super::ServerState;
use super::error::error_response;

const DESCRIPTION: &str = "\
zipmeta

Gathers meta information about a zip file.

Usage: <host>:<port>/zipmeta/<sampleID>
";

pub async fn handle_root() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        DESCRIPTION,
    )
}

pub async fn handle_zipmeta(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    respond(state, id).await
}

/// `/zipmeta/` with an empty identifier resolves to the staging directory
/// itself, which cannot be mapped.
pub async fn handle_zipmeta_empty(State(state): State<ServerState>) -> Response {
    respond(state, String::new()).await
}

async fn respond(state: ServerState, id: String) -> Response {
    let started = Instant::now();
    let result = state.extract(id.clone()).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(body) => {
            tracing::info!(%id, elapsed_ms, "served metadata");
            Json(body).into_response()
        }
        Err(err) => {
            tracing::info!(%id, elapsed_ms, status = %err.status(), "request failed");
            error_response(err, state.config().expose_diagnostics)
        }
    }
}
