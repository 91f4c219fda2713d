// HTTP-facing API
// Thin axum layer over the ingestion and retrieval pipeline; every error
// kind maps to a distinct, stable response body


use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::documents::{DocumentIntake, DocumentStatus, PlainTextExtractor, StatusRegistry};
use crate::embeddings::embedder_from_config;
use crate::indexer::Indexer;
use crate::store::VectorStore;
use crate::workflow::{WorkflowEngine, WorkflowSpec};
use crate::{RagError, Result};

/// Shared service state, assembled once at startup.
pub struct AppState {
    pub intake: Arc<DocumentIntake>,
    pub store: Arc<VectorStore>,
    pub indexer: Indexer,
    pub workflows: WorkflowEngine,
    pub statuses: Arc<StatusRegistry>,
}

impl AppState {
    /// Build every component from configuration and seed the status
    /// registry from the on-disk roots.
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Arc<Self>> {
        let intake = Arc::new(DocumentIntake::open(config.documents_dir()).await?);
        let store = Arc::new(VectorStore::open(config.vectors_dir()).await?);
        let statuses = Arc::new(StatusRegistry::seed(&intake, &store).await?);
        let embedder = embedder_from_config(config)?;

        let indexer = Indexer::new(
            Arc::clone(&intake),
            Arc::new(PlainTextExtractor),
            Arc::clone(&embedder),
            Arc::clone(&store),
            config.chunking.clone(),
            Arc::clone(&statuses),
        );

        let workflows = WorkflowEngine::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            config.retrieval.top_k,
        );

        Ok(Arc::new(Self {
            intake,
            store,
            indexer,
            workflows,
            statuses,
        }))
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct UploadDocResponse {
    message: String,
    filename: String,
    document_id: String,
}

#[derive(Debug, Deserialize)]
struct IndexDocRequest {
    document_id: String,
}

#[derive(Debug, Serialize)]
struct IndexDocResponse {
    message: String,
    document_id: String,
    chunks_indexed: usize,
}

#[derive(Debug, Deserialize)]
struct WorkflowRequest {
    workflow: Value,
    query: String,
}

#[derive(Debug, Serialize)]
struct WorkflowResponse {
    response: String,
    workflow_executed: Value,
}

/// Handler-level error: request-shape problems plus everything the pipeline
/// can surface.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Rag(RagError),
}

impl From<RagError> for ApiError {
    #[inline]
    fn from(err: RagError) -> Self {
        Self::Rag(err)
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            Self::Rag(err) => {
                let message = err.to_string();
                let (status, code) = match err {
                    RagError::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "invalid_config"),
                    RagError::UnreadableDocument(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "unreadable_document")
                    }
                    RagError::EmbeddingBackend(_) => {
                        (StatusCode::BAD_GATEWAY, "embedding_backend_error")
                    }
                    RagError::DimensionMismatch { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch")
                    }
                    RagError::CorruptRecord { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "corrupt_record")
                    }
                    RagError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                    RagError::Io(_) | RagError::Other(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                    }
                };
                (status, code, message)
            }
        };

        (
            status,
            Json(json!({ "error": code, "message": message })),
        )
            .into_response()
    }
}

#[inline]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/upload-doc", post(upload_doc))
        .route("/api/index-doc", post(index_doc))
        .route("/api/run-workflow", post(run_workflow))
        .route("/api/documents/:document_id/status", get(document_status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind-and-serve entry point. Takes the listener so callers (and tests)
/// control the bind address.
#[inline]
pub async fn serve(state: Arc<AppState>, listener: TcpListener) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn upload_doc(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> std::result::Result<Json<UploadDocResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .ok_or_else(|| ApiError::BadRequest("Missing filename".to_string()))?
            .to_string();
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(ApiError::BadRequest(
                "Only PDF files are allowed".to_string(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;

        let document_id = state.intake.save(&bytes).await?;
        state
            .statuses
            .set(&document_id, DocumentStatus::Uploaded)
            .await;

        return Ok(Json(UploadDocResponse {
            message: "Document uploaded successfully".to_string(),
            filename,
            document_id,
        }));
    }

    Err(ApiError::BadRequest(
        "Missing 'file' multipart field".to_string(),
    ))
}

async fn index_doc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IndexDocRequest>,
) -> std::result::Result<Json<IndexDocResponse>, ApiError> {
    let chunks_indexed = state.indexer.index_document(&request.document_id).await?;

    Ok(Json(IndexDocResponse {
        message: "Document indexed successfully".to_string(),
        document_id: request.document_id,
        chunks_indexed,
    }))
}

async fn run_workflow(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WorkflowRequest>,
) -> std::result::Result<Json<WorkflowResponse>, ApiError> {
    let spec: WorkflowSpec = serde_json::from_value(request.workflow.clone())
        .map_err(|e| ApiError::BadRequest(format!("Malformed workflow: {e}")))?;

    let response = state.workflows.execute(&spec, &request.query).await?;

    Ok(Json(WorkflowResponse {
        response,
        workflow_executed: request.workflow,
    }))
}

async fn document_status(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> std::result::Result<Json<DocumentStatus>, ApiError> {
    let status = state
        .statuses
        .get(&document_id)
        .await
        .ok_or(RagError::NotFound(document_id))?;
    Ok(Json(status))
}
