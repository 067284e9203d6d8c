//! HTTP API over the pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Version and corpus state |
//! | `POST` | `/ingest` | Replace the corpus with the posted documents |
//! | `POST` | `/ask` | Answer a question; the client carries the chat history |
//! | `GET`  | `/documents` | Documents of the live corpus |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Codes: `bad_request` (400), `nothing_indexed` (422), `ingest_failed` (500),
//! `internal` (500). Failed ingestion also carries the per-document `report`.
//!
//! # CORS
//!
//! All origins, methods and headers are permitted so browser front ends can
//! call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use askdocs_core::models::{ChatTurn, DocumentRecord};

use crate::app::open_pipeline;
use crate::config::Config;
use crate::pipeline::{CorpusState, IngestError, IngestItem, IngestReport, Pipeline};

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Open the configured pipeline and serve until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(open_pipeline(config).await?);
    let app = router(pipeline);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "server listening");
    println!("askdocs listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Routes over an existing pipeline.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/ask", post(handle_ask))
        .route("/documents", get(handle_documents))
        .layer(cors)
        .with_state(AppState { pipeline })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<IngestReport>,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    report: Option<IngestReport>,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            report: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
            report: self.report,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let (status, code) = match &err {
            IngestError::NothingIndexed { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "nothing_indexed")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "ingest_failed"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
            report: err.report().cloned(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    corpus: CorpusState,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        corpus: state.pipeline.state(),
    })
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    documents: Vec<IngestDocument>,
}

#[derive(Deserialize)]
struct IngestDocument {
    name: String,
    source_url: String,
    text: String,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestReport>, AppError> {
    if let Some(doc) = req.documents.iter().find(|d| d.name.trim().is_empty()) {
        return Err(bad_request(format!(
            "document name must not be empty (source_url: {})",
            doc.source_url
        )));
    }

    let items: Vec<IngestItem> = req
        .documents
        .into_iter()
        .map(|d| IngestItem::from_url(d.name, d.source_url, d.text))
        .collect();

    // Detached: a dropped connection must not cancel a batch mid-write.
    let pipeline = Arc::clone(&state.pipeline);
    let batch = tokio::spawn(async move { pipeline.ingest(items).await });

    match batch.await {
        Ok(Ok(report)) => Ok(Json(report)),
        Ok(Err(e)) => Err(e.into()),
        Err(e) => {
            error!(error = %e, "ingestion task failed");
            Err(internal(format!("ingestion task failed: {e}")))
        }
    }
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    history: Vec<ChatTurn>,
}

#[derive(Serialize)]
struct AskResponse {
    turn: ChatTurn,
    history: Vec<ChatTurn>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let mut history = req.history;
    let turn = state.pipeline.ask(&req.question, &mut history).await;
    Ok(Json(AskResponse { turn, history }))
}

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentRecord>,
}

async fn handle_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = state
        .pipeline
        .documents()
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(DocumentsResponse { documents }))
}
