use annotation_flow::record::normalize_key;
use annotation_flow::{
    AnnotationError, AnnotationRunner, AnnotationView, CommitOutcome, DiseaseRepository,
    InMemoryDiseaseRepository, InMemorySessionStorage, InMemoryUserRepository, UserRepository,
};
use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::models::{
    ConfirmRequest, DiseaseDocument, DiseaseResponse, NavigateRequest, StartSessionRequest,
    SubmitRequest,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

const CORRELATION_HEADER: &str = "x-correlation-id";

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Maps library errors onto HTTP statuses
fn annotation_error(err: AnnotationError) -> ApiError {
    let status = match &err {
        AnnotationError::DiseaseNotFound(_)
        | AnnotationError::UserNotFound(_)
        | AnnotationError::DrugNotFound { .. }
        | AnnotationError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AnnotationError::SessionComplete(_) | AnnotationError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        AnnotationError::InvalidAnswer { .. } | AnnotationError::InvalidPath(_) => {
            StatusCode::BAD_REQUEST
        }
        AnnotationError::StorageError(_) | AnnotationError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        error!(error = %err, "Request failed");
        (
            status,
            Json(json!({
                "error": "Internal error",
                "details": err.to_string()
            })),
        )
    } else {
        warn!(status = status.as_u16(), error = %err, "Request rejected");
        (status, Json(json!({ "error": err.to_string() })))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub runner: AnnotationRunner,
}

pub async fn create_app(config: &ServiceConfig) -> Router {
    let app_state = create_app_state(config).await;
    build_router(app_state)
}

async fn create_app_state(config: &ServiceConfig) -> AppState {
    let (diseases, users) = create_repositories(config).await;
    let runner = AnnotationRunner::new(
        diseases,
        users,
        Arc::new(InMemorySessionStorage::new()),
        config.annotation,
    );
    AppState { runner }
}

async fn create_repositories(
    config: &ServiceConfig,
) -> (Arc<dyn DiseaseRepository>, Arc<dyn UserRepository>) {
    if let Some(database_url) = &config.database_url {
        info!("Using PostgreSQL document storage");
        match annotation_flow::PostgresAnnotationStore::connect(database_url).await {
            Ok(store) => {
                let store = Arc::new(store);
                return (store.clone(), store);
            }
            Err(e) => {
                error!(
                    "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                    e
                );
            }
        }
    } else {
        info!("Using in-memory document storage (set DATABASE_URL to use PostgreSQL)");
    }

    (
        Arc::new(InMemoryDiseaseRepository::new()),
        Arc::new(InMemoryUserRepository::new()),
    )
}

/// Tags every request with a correlation id and runs it inside a span
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header = HeaderValue::from_str(&correlation_id).ok();
    if let Some(value) = &header {
        request.headers_mut().insert(CORRELATION_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/diseases/{disease}", put(upsert_disease))
        .route("/sessions", post(start_session))
        .route("/sessions/{session_id}", get(get_session).delete(end_session))
        .route("/sessions/{session_id}/navigate", post(navigate))
        .route("/sessions/{session_id}/back", post(go_back))
        .route("/sessions/{session_id}/submit", post(submit_answers))
        .route("/sessions/{session_id}/confirm", post(confirm_advance))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Drug Annotation Service",
        "version": "1.0.0",
        "description": "Per-drug questionnaire annotation with resumable sessions",
        "endpoints": {
            "PUT /diseases/{disease}": "Create or replace a disease document",
            "POST /sessions": "Start an annotation session",
            "GET /sessions/{session_id}": "Current drug, answers and progress",
            "POST /sessions/{session_id}/navigate": "Jump to a drug",
            "POST /sessions/{session_id}/back": "Go to the previous drug",
            "POST /sessions/{session_id}/submit": "Submit answers for confirmation",
            "POST /sessions/{session_id}/confirm": "Save and advance, or keep editing",
            "DELETE /sessions/{session_id}": "End the session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn upsert_disease(
    State(state): State<AppState>,
    Path(disease): Path<String>,
    Json(document): Json<DiseaseDocument>,
) -> ApiResult<DiseaseResponse> {
    let disease_key = normalize_key(&disease);
    if disease_key.is_empty() {
        return Err(bad_request_error("Disease name is required"));
    }

    let record = document.into_record(disease_key.clone());
    let drugs = record.drug_map.len();
    info!(disease = %disease_key, drugs, "Upserting disease document");

    state
        .runner
        .diseases()
        .upsert(record)
        .await
        .map_err(annotation_error)?;

    Ok(Json(DiseaseResponse {
        disease: disease_key,
        drugs,
        status: "stored".to_string(),
    }))
}

async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<AnnotationView> {
    if request.email.trim().is_empty() {
        return Err(bad_request_error("Email is required"));
    }
    if request.disease.trim().is_empty() {
        return Err(bad_request_error("Disease is required"));
    }

    info!(email = %request.email, disease = %request.disease, "Starting annotation session");
    state
        .runner
        .start_session(&request.email, &request.disease)
        .await
        .map(Json)
        .map_err(annotation_error)
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<AnnotationView> {
    state
        .runner
        .render(&session_id)
        .await
        .map(Json)
        .map_err(annotation_error)
}

async fn navigate(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<NavigateRequest>,
) -> ApiResult<AnnotationView> {
    if request.drug.trim().is_empty() {
        return Err(bad_request_error("Drug is required"));
    }

    state
        .runner
        .navigate_to(&session_id, &request.drug)
        .await
        .map(Json)
        .map_err(annotation_error)
}

async fn go_back(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<AnnotationView> {
    state
        .runner
        .go_back(&session_id)
        .await
        .map(Json)
        .map_err(annotation_error)
}

async fn submit_answers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<AnnotationView> {
    state
        .runner
        .submit(&session_id, request.answers)
        .await
        .map(Json)
        .map_err(annotation_error)
}

async fn confirm_advance(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult<CommitOutcome> {
    state
        .runner
        .confirm(&session_id, request.confirm)
        .await
        .map(Json)
        .map_err(annotation_error)
}

async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .runner
        .end_session(&session_id)
        .await
        .map_err(annotation_error)?;
    Ok(StatusCode::NO_CONTENT)
}
