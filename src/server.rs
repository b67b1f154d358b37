//! JSON HTTP API over the session lifecycle.
//!
//! Exposes the five session operations plus a health check. Document bytes
//! cross the boundary base64-encoded inside JSON bodies.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/sessions` | Create a session from uploaded files |
//! | `POST` | `/sessions/{id}/chat` | Ask a question within a session |
//! | `GET`  | `/sessions/{id}` | Fetch a session's documents and transcript |
//! | `GET`  | `/sessions` | List sessions, most recently active first |
//! | `DELETE` | `/sessions/{id}` | Delete a session (idempotent) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "session not found: ..." } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `upstream_unavailable`
//! (502), `storage` (500). The mapping is a total match over the error
//! taxonomy, never message-string inspection.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::error::ChatdocsError;
use crate::models::Turn;
use crate::sessions::{IngestFile, SessionManager};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    manager: Arc<SessionManager>,
}

/// Starts the HTTP server.
///
/// Builds the session manager from configuration (fatal if gateway
/// credentials are missing), binds to `[server].bind`, and serves until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let manager = Arc::new(SessionManager::new(config)?);
    let app = router(manager);

    let bind_addr = config.server.bind.clone();
    info!(bind = %bind_addr, "chatdocs server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the application router around an existing manager.
pub fn router(manager: Arc<SessionManager>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/sessions",
            post(handle_create_session).get(handle_list_sessions),
        )
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/{id}/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { manager })
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Maps every taxonomy kind to its HTTP representation.
impl From<ChatdocsError> for AppError {
    fn from(err: ChatdocsError) -> Self {
        let message = err.to_string();
        match err {
            ChatdocsError::InvalidConfiguration(_)
            | ChatdocsError::EmptyContent
            | ChatdocsError::EmptyQuestion => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "bad_request",
                message,
            },
            ChatdocsError::SessionNotFound(_)
            | ChatdocsError::IndexNotFound(_)
            | ChatdocsError::IndexCorrupt { .. }
            | ChatdocsError::CorruptTranscript(_) => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message,
            },
            ChatdocsError::EmbeddingUnavailable(_) | ChatdocsError::GenerationUnavailable(_) => {
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "upstream_unavailable",
                    message,
                }
            }
            ChatdocsError::Storage(_)
            | ChatdocsError::Io(_)
            | ChatdocsError::Serialization(_) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "storage",
                message,
            },
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /sessions ============

/// One uploaded file: name plus base64-encoded content.
#[derive(Deserialize)]
struct UploadedFile {
    name: String,
    content_base64: String,
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    files: Vec<UploadedFile>,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: String,
    document_names: Vec<String>,
}

async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let mut files = Vec::with_capacity(request.files.len());
    for file in request.files {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&file.content_base64)
            .map_err(|e| bad_request(format!("file {}: invalid base64: {}", file.name, e)))?;
        files.push(IngestFile {
            name: file.name,
            bytes,
        });
    }

    let record = state.manager.create_session(files).await?;

    Ok(Json(CreateSessionResponse {
        session_id: record.id,
        document_names: record.document_names,
    }))
}

// ============ POST /sessions/{id}/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    transcript: Vec<Turn>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let outcome = state.manager.chat(&id, &request.question).await?;

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        transcript: outcome.transcript,
    }))
}

// ============ GET /sessions/{id} ============

#[derive(Serialize)]
struct SessionResponse {
    session_id: String,
    document_names: Vec<String>,
    transcript: Vec<Turn>,
    updated_at: DateTime<Utc>,
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let record = state.manager.get_session(&id).await?;

    Ok(Json(SessionResponse {
        session_id: record.id,
        document_names: record.document_names,
        transcript: record.transcript,
        updated_at: record.updated_at,
    }))
}

// ============ GET /sessions ============

#[derive(Serialize)]
struct SessionSummary {
    session_id: String,
    document_names: Vec<String>,
    turns: usize,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ListSessionsResponse {
    sessions: Vec<SessionSummary>,
}

async fn handle_list_sessions(State(state): State<AppState>) -> Json<ListSessionsResponse> {
    let sessions = state
        .manager
        .list_sessions()
        .await
        .into_iter()
        .map(|record| SessionSummary {
            session_id: record.id,
            document_names: record.document_names,
            turns: record.transcript.len(),
            updated_at: record.updated_at,
        })
        .collect();

    Json(ListSessionsResponse { sessions })
}

// ============ DELETE /sessions/{id} ============

#[derive(Serialize)]
struct DeleteSessionResponse {
    deleted: bool,
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteSessionResponse>, AppError> {
    state.manager.delete_session(&id).await?;
    Ok(Json(DeleteSessionResponse { deleted: true }))
}
