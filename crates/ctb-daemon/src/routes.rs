//! Axum router and HTTP handlers for ctb-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ctb_session::{FailureKind, RawSyncRequest};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    api_types::{HealthResponse, RefusedResponse},
    state::AppState,
};

/// Header carrying the shared secret. A `secret` field in the JSON body is
/// accepted when the header is absent.
pub const SECRET_HEADER: &str = "x-bridge-secret";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/sync", post(sync))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/sync
// ---------------------------------------------------------------------------

pub(crate) async fn sync(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let parsed = serde_json::from_slice::<Value>(&body);

    if !presented_secret(&headers, parsed.as_ref().ok()).is_some_and(|s| st.secret.matches(s)) {
        warn!("sync refused: missing or wrong shared secret");
        return refuse(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let body = match parsed {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => return refuse(StatusCode::BAD_REQUEST, "request body must be a JSON object"),
        Err(e) => return refuse(StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}")),
    };
    let raw: RawSyncRequest = match serde_json::from_value(body) {
        Ok(raw) => raw,
        Err(e) => return refuse(StatusCode::BAD_REQUEST, format!("invalid request: {e}")),
    };

    let resp = st.bridge.sync(&raw).await;
    let status = match resp.failure {
        None => StatusCode::OK,
        Some(FailureKind::Validation) => StatusCode::BAD_REQUEST,
        Some(FailureKind::Upstream) => StatusCode::BAD_GATEWAY,
    };
    info!(status = status.as_u16(), ok = resp.ok, "sync answered");
    (status, Json(resp)).into_response()
}

fn presented_secret<'a>(headers: &'a HeaderMap, body: Option<&'a Value>) -> Option<&'a str> {
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| body.and_then(|b| b.get("secret")).and_then(Value::as_str))
}

fn refuse(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(RefusedResponse::new(error))).into_response()
}
