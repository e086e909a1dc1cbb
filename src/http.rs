//! HTTP API surface for the session manager.
//!
//! Axum-based server exposing the lifecycle operations to the rest of the
//! deployment. Each endpoint has a thin axum handler that delegates to a
//! directly testable inner function.
//!
//! Endpoints:
//! - `GET  /status`             — session status, clock-derived, no side effects
//! - `POST /test-connection`    — live probe with supplied or configured credentials
//! - `POST /token`              — refresh (re-issue, preserve on failure)
//! - `POST /reset-token`        — discard and re-login
//! - `POST /credentials/reveal` — step-up gated reveal of non-secret fields
//!
//! Raw client errors never reach the wire; every failure is folded into a
//! structured body with an optional troubleshooting hint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ServiceLayerConfig;
use crate::manager::SessionTokenManager;
use crate::SlError;

/// Shared state for all HTTP handlers.
pub struct AppState {
    pub manager: SessionTokenManager,
    /// Configured connection settings, used as the base for probe overrides.
    pub config: ServiceLayerConfig,
}

/// Builds the router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/test-connection", post(test_connection_handler))
        .route("/token", post(refresh_handler))
        .route("/reset-token", post(reset_handler))
        .route("/credentials/reveal", post(reveal_handler))
        .with_state(state)
}

/// Starts the HTTP server on the given address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn serve(
    state: Arc<AppState>,
    addr: &str,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("slbridge API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Optional overrides for the connection probe. Omitted fields fall back to
/// the configured values, so the settings page can test edits before saving.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionRequest {
    pub base_url: Option<String>,
    pub company_db: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RevealRequest {
    /// The calling operator's password, not the Service Layer password.
    pub password: String,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner status — always 200; the body carries the session state.
pub async fn status_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    let report = state.manager.status().await;

    let body = serde_json::json!({
        "status": if report.error.is_some() { "error" } else { "ok" },
        "tokenStatus": report.status,
        "expirationTime": report.expires_at,
        "tokenInfo": report.token,
        "issuedAt": report.issued_at,
        "error": report.error,
    });
    (StatusCode::OK, body)
}

/// Inner test-connection — always 200; success lives in the body, matching
/// the probe's report-not-fail contract.
pub async fn test_connection_inner(
    state: &AppState,
    req: TestConnectionRequest,
) -> (StatusCode, serde_json::Value) {
    let mut credentials = state.config.clone();
    if let Some(url) = req.base_url {
        credentials.base_url = url;
    }
    if let Some(db) = req.company_db {
        credentials.company_db = db;
    }
    if let Some(user) = req.username {
        credentials.username = user;
    }
    if let Some(password) = req.password {
        credentials.password = crate::config::Secret::new(password);
    }

    let report = state.manager.test_connection(&credentials).await;
    let body = serde_json::json!({
        "success": report.success,
        "error": report.error,
        "details": report.hint,
    });
    (StatusCode::OK, body)
}

/// Inner refresh — 200 on success; failures map to an error status with a
/// structured body, old session untouched either way.
pub async fn refresh_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    match state.manager.refresh().await {
        Ok(report) => (
            StatusCode::OK,
            serde_json::json!({
                "success": true,
                "tokenStatus": report.status,
                "expirationTime": report.expires_at,
            }),
        ),
        Err(e) => (error_status(&e), failure_body(&e)),
    }
}

/// Inner reset — 200 on success; on failure the manager is in the
/// no-session state and the body says so.
pub async fn reset_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    match state.manager.reset().await {
        Ok(report) => (
            StatusCode::OK,
            serde_json::json!({
                "success": true,
                "tokenStatus": report.status,
                "expirationTime": report.expires_at,
            }),
        ),
        Err(e) => (error_status(&e), failure_body(&e)),
    }
}

/// Inner reveal — step-up gate; 401 on operator password mismatch.
pub fn reveal_inner(state: &AppState, req: RevealRequest) -> (StatusCode, serde_json::Value) {
    match state.manager.reveal_credentials(&req.password) {
        Ok(revealed) => (
            StatusCode::OK,
            serde_json::json!({
                "baseUrl": revealed.base_url,
                "companyDb": revealed.company_db,
                "username": revealed.username,
                "passwordPreview": revealed.password_preview,
            }),
        ),
        Err(e) => (error_status(&e), failure_body(&e)),
    }
}

/// Maps the error taxonomy to HTTP status codes.
fn error_status(e: &SlError) -> StatusCode {
    match e {
        SlError::Authentication(_) => StatusCode::UNAUTHORIZED,
        SlError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SlError::NotAuthenticated | SlError::SessionExpired => StatusCode::CONFLICT,
        SlError::Network(_) | SlError::Timeout(_) | SlError::UnexpectedResponse(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure_body(e: &SlError) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": e.to_string(),
        "details": e.hint(),
    })
}

// ============================================================================
// Axum handler wrappers (thin)
// ============================================================================

pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = status_inner(&state).await;
    (status, Json(body))
}

pub async fn test_connection_handler(
    State(state): State<Arc<AppState>>,
    req: Option<Json<TestConnectionRequest>>,
) -> impl IntoResponse {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let (status, body) = test_connection_inner(&state, req).await;
    (status, Json(body))
}

pub async fn refresh_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = refresh_inner(&state).await;
    (status, Json(body))
}

pub async fn reset_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = reset_inner(&state).await;
    (status, Json(body))
}

pub async fn reveal_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RevealRequest>,
) -> impl IntoResponse {
    let (status, body) = reveal_inner(&state, req);
    (status, Json(body))
}
