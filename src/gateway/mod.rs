//! Axum-based HTTP gateway for user registration and lookup.
//!
//! - Request body size limits (64KB max)
//! - Request timeouts (30s)
//! - Key derivation runs on the blocking pool, bounded by a semaphore so
//!   a burst of registrations cannot starve the async workers

pub mod schemas;

use crate::auth::{CredentialParams, StoreError, UserStore};
use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use schemas::{ErrorBody, UserCreate, UserRead};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s), including time spent waiting for a hash permit
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
    /// Cost applied to newly registered credentials.
    pub credentials: CredentialParams,
    /// Permits for concurrent key derivations.
    pub hash_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        store: Arc<UserStore>,
        credentials: CredentialParams,
        max_concurrent_hashes: usize,
    ) -> Self {
        Self {
            store,
            credentials,
            hash_permits: Arc::new(Semaphore::new(max_concurrent_hashes.max(1))),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────

/// Handler failure, rendered as `{"detail": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Username or email already exists.")]
    Duplicate,
    #[error("User not found.")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    /// Transport-level rejection passed through with its own status.
    #[error("{1}")]
    Rejected(StatusCode, String),
    /// Details are logged where the error is raised, never returned.
    #[error("Internal server error.")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Duplicate => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Rejected(status, _) => *status,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => Self::Duplicate,
            other => {
                tracing::error!("User store failure: {other}");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ── Server ──────────────────────────────────────────────────────

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: &Config) -> Result<()> {
    let store = UserStore::open(&config.database.path)?;
    tracing::info!("User store opened at {}", config.database.path.display());

    let state = AppState::new(
        Arc::new(store),
        config.credentials,
        config.gateway.max_concurrent_hashes,
    );

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr()?;

    tracing::info!(
        iterations = config.credentials.iterations.get(),
        max_concurrent_hashes = config.gateway.max_concurrent_hashes,
        "Secure User API listening on http://{local}"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// Router with all routes and middleware, detached from any socket.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/users", post(handle_create_user))
        .route("/users/", post(handle_create_user))
        .route("/users/{user_id}", get(handle_get_user))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /: liveness banner
async fn handle_root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Secure User API is running" }))
}

/// GET /health
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Map a JSON extraction failure onto an API error.
///
/// Shape errors get a fixed message because serde reports offending
/// values verbatim. Rejections that are not about the JSON itself
/// (oversized or unreadable body) keep the status axum chose.
fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(_) => ApiError::Validation(
            "Request body must contain string fields: username, email, password.".into(),
        ),
        JsonRejection::JsonSyntaxError(e) => ApiError::Validation(e.body_text()),
        JsonRejection::MissingJsonContentType(e) => ApiError::Validation(e.body_text()),
        other => ApiError::Rejected(other.status(), other.body_text()),
    }
}

/// POST /users: register a new user
async fn handle_create_user(
    State(state): State<AppState>,
    body: Result<Json<UserCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<UserRead>), ApiError> {
    let Json(body) = body.map_err(json_rejection)?;

    let problems = body.validate();
    if !problems.is_empty() {
        return Err(ApiError::Validation(problems.join("; ")));
    }
    let new_user = body.into_new_user();

    let permit = state
        .hash_permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            tracing::error!("Hash semaphore closed");
            ApiError::Internal
        })?;

    let store = Arc::clone(&state.store);
    let cost = state.credentials;
    let created = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        store.create_user(&new_user, &cost)
    })
    .await
    .map_err(|e| {
        tracing::error!("Registration task failed: {e}");
        ApiError::Internal
    })?;

    match created {
        Ok(user) => Ok((StatusCode::CREATED, Json(UserRead::from(&user)))),
        Err(StoreError::Duplicate) => {
            tracing::debug!("Registration rejected: duplicate username or email");
            Err(ApiError::Duplicate)
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /users/{user_id}
async fn handle_get_user(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<UserRead>, ApiError> {
    let Path(user_id) = user_id.map_err(|e| ApiError::Validation(e.body_text()))?;

    match state.store.get_user(user_id)? {
        Some(user) => Ok(Json(UserRead::from(&user))),
        None => Err(ApiError::NotFound),
    }
}
