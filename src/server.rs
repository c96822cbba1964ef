//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/question` | Answer a question from the indexed documents |
//! | `GET`  | `/api/settings` | Current runtime settings and collection name |
//! | `POST` | `/api/settings` | Partial settings update |
//! | `POST` | `/api/document-path/add` | Add a document directory |
//! | `POST` | `/api/document-path/remove` | Remove a document directory |
//! | `POST` | `/api/reindex` | Rebuild the collection from the document paths |
//! | `GET`  | `/api/stats` | Collection statistics |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `conflict` (409), `unavailable` (503),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! served from elsewhere can call the API.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::{Settings, SettingsPatch};
use crate::error::RagError;
use crate::models::{Answer, CollectionStats, IngestReport};
use crate::service::RagService;

#[derive(Clone)]
struct AppState {
    service: Arc<RagService>,
}

/// Build the application router.
pub fn router(service: Arc<RagService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/question", post(handle_question))
        .route("/api/settings", get(handle_get_settings).post(handle_update_settings))
        .route("/api/document-path/add", post(handle_add_path))
        .route("/api/document-path/remove", post(handle_remove_path))
        .route("/api/reindex", post(handle_reindex))
        .route("/api/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { service })
}

/// Bind `bind_addr` and serve until the process is stopped.
pub async fn run_server(service: Arc<RagService>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

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

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::Configuration(_) | RagError::InvalidArgument(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            RagError::IngestionInProgress => (StatusCode::CONFLICT, "conflict"),
            RagError::EmbeddingUnavailable { .. }
            | RagError::AnswerUnavailable { .. }
            | RagError::IngestionFailed { .. } => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            RagError::Storage(_) | RagError::Io(_) | RagError::Serialization(_) => {
                tracing::error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

fn task_failed(err: tokio::task::JoinError) -> AppError {
    tracing::error!(error = %err, "background task failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("task failed: {}", err),
    }
}

/// Run a reindex on its own task so a dropped request cannot cut it short.
async fn reindex_detached(service: &Arc<RagService>) -> Result<IngestReport, AppError> {
    let service = Arc::clone(service);
    tokio::spawn(async move { service.reindex().await })
        .await
        .map_err(task_failed)?
        .map_err(AppError::from)
}

/// Settings changes write the settings file under a lock; keep them off the
/// async workers.
async fn settings_io<T, F>(service: &Arc<RagService>, f: F) -> Result<T, AppError>
where
    F: FnOnce(&RagService) -> Result<T, RagError> + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(service);
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(task_failed)?
        .map_err(AppError::from)
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
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

// ============ POST /api/question ============

#[derive(Deserialize)]
struct QuestionRequest {
    question: Option<String>,
    n_results: Option<i64>,
    use_augmentation: Option<bool>,
}

async fn handle_question(
    State(state): State<AppState>,
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(req) = body?;
    let question = req
        .question
        .ok_or_else(|| bad_request("question is required"))?;
    let n_results = match req.n_results {
        Some(n) if n <= 0 => return Err(bad_request("n_results must be > 0")),
        Some(n) => Some(n as usize),
        None => None,
    };

    let answer = state
        .service
        .ask(&question, n_results, req.use_augmentation)
        .await?;
    Ok(Json(answer))
}

// ============ /api/settings ============

#[derive(Serialize)]
struct SettingsView {
    #[serde(flatten)]
    settings: Settings,
    collection_name: String,
}

async fn handle_get_settings(State(state): State<AppState>) -> Json<SettingsView> {
    Json(SettingsView {
        settings: state.service.settings(),
        collection_name: state.service.collection_name().to_string(),
    })
}

#[derive(Serialize)]
struct SettingsUpdated {
    message: String,
    settings: Settings,
}

async fn handle_update_settings(
    State(state): State<AppState>,
    body: Result<Json<SettingsPatch>, JsonRejection>,
) -> Result<Json<SettingsUpdated>, AppError> {
    let Json(patch) = body?;
    let settings = settings_io(&state.service, move |s| s.update_settings(&patch)).await?;
    Ok(Json(SettingsUpdated {
        message: "Settings updated successfully".to_string(),
        settings,
    }))
}

// ============ /api/document-path ============

#[derive(Deserialize)]
struct PathRequest {
    path: Option<String>,
    /// Rebuild the collection right after the change.
    #[serde(default)]
    reindex: bool,
}

#[derive(Serialize)]
struct PathResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<IngestReport>,
}

async fn handle_add_path(
    State(state): State<AppState>,
    body: Result<Json<PathRequest>, JsonRejection>,
) -> Result<Json<PathResponse>, AppError> {
    let Json(req) = body?;
    let path = req.path.ok_or_else(|| bad_request("path is required"))?;
    let added = path.clone();
    settings_io(&state.service, move |s| s.add_document_path(&added)).await?;

    let report = if req.reindex {
        Some(reindex_detached(&state.service).await?)
    } else {
        None
    };
    Ok(Json(PathResponse {
        message: format!("Added document path: {}", path.trim()),
        report,
    }))
}

async fn handle_remove_path(
    State(state): State<AppState>,
    body: Result<Json<PathRequest>, JsonRejection>,
) -> Result<Json<PathResponse>, AppError> {
    let Json(req) = body?;
    let path = req.path.ok_or_else(|| bad_request("path is required"))?;
    let target = path.clone();
    let removed = settings_io(&state.service, move |s| s.remove_document_path(&target)).await?;

    let message = if removed {
        format!("Removed document path: {}", path.trim())
    } else {
        format!("Document path not configured: {}", path.trim())
    };
    let report = if req.reindex && removed {
        Some(reindex_detached(&state.service).await?)
    } else {
        None
    };
    Ok(Json(PathResponse { message, report }))
}

// ============ POST /api/reindex ============

#[derive(Serialize)]
struct ReindexResponse {
    message: String,
    report: IngestReport,
    stats: CollectionStats,
}

async fn handle_reindex(State(state): State<AppState>) -> Result<Json<ReindexResponse>, AppError> {
    let report = reindex_detached(&state.service).await?;
    let stats = state.service.stats().await?;
    Ok(Json(ReindexResponse {
        message: format!(
            "Reindexed {} document(s) into {} chunk(s)",
            report.documents_processed, report.chunks_written
        ),
        report,
        stats,
    }))
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<CollectionStats>, AppError> {
    Ok(Json(state.service.stats().await?))
}
