use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use contracts::{
    ApiError, DriveView, EngineStatus, ErrorCode, StateSnapshot, TickReport, TriggerEvent,
    SCHEMA_VERSION_V1,
};
use drive_core::SatisfactionError;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{EngineApi, EngineError};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 1000;

include!("error.rs");
include!("state.rs");
include!("routes/control.rs");
include!("routes/query.rs");
include!("util.rs");

pub async fn serve(addr: SocketAddr, engine: EngineApi) -> Result<(), ServerError> {
    let state = AppState::new(engine);
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/tick", post(run_tick))
        .route("/api/v1/drives", get(list_drives))
        .route("/api/v1/drives/{name}", get(get_drive))
        .route("/api/v1/drives/{name}/satisfy", post(satisfy_drive))
        .route("/api/v1/triggers", get(list_triggers))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/context", get(get_context))
        .route("/api/v1/snapshot", get(get_snapshot))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests;
