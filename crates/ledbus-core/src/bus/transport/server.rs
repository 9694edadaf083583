//! Endpoint server — axum router over a Unix domain socket.
//!
//! Requests are answered by the owning attachment's shared state; the
//! router only decodes, dispatches, and maps [`BusError`]s to HTTP statuses.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{debug, info};

use super::types::*;
use crate::bus::attachment::Shared;
use crate::bus::status::BusError;

type ErrorReply = (StatusCode, Json<ErrorResponse>);

/// Build the endpoint router.
pub(crate) fn router(state: Arc<Shared>) -> axum::Router {
    axum::Router::new()
        .route("/ping", get(handle_ping))
        .route("/session/join", post(handle_join))
        .route("/session/leave", post(handle_leave))
        .route("/call", post(handle_call))
        .with_state(state)
}

/// Serve the endpoint until `shutdown_rx` flips to `true`.
pub(crate) async fn serve(
    listener: UnixListener,
    state: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let unique_name = state.unique_name.clone();
    info!(unique_name = %unique_name, "endpoint listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
            debug!(unique_name = %unique_name, "endpoint shutting down");
        })
        .await
}

fn http_status(err: &BusError) -> StatusCode {
    match err {
        BusError::JoinSessionRejected(_) => StatusCode::FORBIDDEN,
        BusError::JoinSessionNoSession(_)
        | BusError::NoSession(_)
        | BusError::NoSuchObject(_)
        | BusError::NoSuchInterface(_)
        | BusError::NoSuchMember { .. } => StatusCode::NOT_FOUND,
        BusError::SignatureMismatch { .. } | BusError::Protocol(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: BusError) -> ErrorReply {
    (http_status(&err), Json(ErrorResponse::from(err)))
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_ping(State(state): State<Arc<Shared>>) -> Json<PingResponse> {
    Json(PingResponse {
        unique_name: state.unique_name.clone(),
        version: crate::build_info::VERSION.to_string(),
    })
}

async fn handle_join(
    State(state): State<Arc<Shared>>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ErrorReply> {
    state.accept_join(&req).map(Json).map_err(reject)
}

async fn handle_leave(
    State(state): State<Arc<Shared>>,
    Json(req): Json<LeaveRequest>,
) -> Json<LeaveResponse> {
    Json(LeaveResponse {
        left: state.end_hosted_session(req.session_id, &req.leaver),
    })
}

async fn handle_call(
    State(state): State<Arc<Shared>>,
    Json(req): Json<CallRequest>,
) -> Result<Json<CallResponse>, ErrorReply> {
    state.dispatch_call(req).await.map(Json).map_err(reject)
}
