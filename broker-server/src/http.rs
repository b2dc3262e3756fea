//! Operator-facing long-poll HTTP/JSON API.
//!
//! All four routes are thin wrappers over [`broker_core::OperatorGateway`];
//! the only transport-specific work here is status-code mapping and
//! request/response JSON shapes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use broker_core::{ErrorKind, GatewayError, OperatorGateway, Response as CoreResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct HttpState {
    pub gateway: Arc<OperatorGateway>,
    pub take_poll_window: Duration,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/data.json", get(take_next))
        .route("/submit/:uuid", post(submit))
        .route("/defer/:uuid", post(defer))
        .route("/queue/status", get(queue_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Transport-level error wrapper: maps [`GatewayError`] onto the HTTP
/// status table and `{code, message, details?}` body shape.
struct AppError(GatewayError);

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            // Overload/cancelled never originate from the gateway; map
            // defensively rather than panicking if that ever changes.
            ErrorKind::ResourceExhausted => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = match self.0.kind() {
            ErrorKind::DeadlineExceeded => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidArgument => "malformed_reply",
            ErrorKind::Internal => "internal",
            ErrorKind::ResourceExhausted => "overload",
            ErrorKind::Cancelled => "cancelled",
        };
        let body = Json(json!({
            "code": code,
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

fn take_result_to_json(id: String, request: &broker_core::Request, queue: Value) -> Value {
    json!({
        "uuid": id,
        "proto": request,
        "queue": queue,
    })
}

async fn take_next(State(state): State<HttpState>) -> Result<Json<Value>, AppError> {
    let result = state.gateway.take_next(state.take_poll_window).await?;
    let queue = queue_status_json(&state);
    Ok(Json(take_result_to_json(result.id, &result.request, queue)))
}

async fn defer(
    State(state): State<HttpState>,
    Path(uuid): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.gateway.defer(&uuid)?;
    let result = state.gateway.take_next(state.take_poll_window).await?;
    let queue = queue_status_json(&state);
    Ok(Json(take_result_to_json(result.id, &result.request, queue)))
}

#[derive(Deserialize)]
struct SubmitBody {
    #[serde(flatten)]
    response: CoreResponse,
}

#[derive(Serialize)]
struct SubmitAck {
    status: &'static str,
}

async fn submit(
    State(state): State<HttpState>,
    Path(uuid): Path<String>,
    body: Result<Json<SubmitBody>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<SubmitAck>, AppError> {
    let Json(SubmitBody { response }) = body.map_err(|e| {
        AppError(GatewayError::Malformed(e.to_string()))
    })?;
    state.gateway.submit(&uuid, response)?;
    Ok(Json(SubmitAck { status: "ok" }))
}

async fn queue_status(State(state): State<HttpState>) -> Json<Value> {
    Json(queue_status_json(&state))
}

fn queue_status_json(state: &HttpState) -> Value {
    let status = state.gateway.status();
    json!({
        "total": status.total,
        "active": status.active,
        "deferred": status.deferred,
    })
}
