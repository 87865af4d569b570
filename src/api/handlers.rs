//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::types::{
    CreateSessionRequest, ErrorResponse, FactResponse, ModelsResponse, PersonaInfo,
    PersonaListResponse, SessionResponse, SubmitRequest, SuccessResponse,
};
use super::AppState;
use crate::runtime::{RuntimeError, SessionView};
use crate::session::SessionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the chat page
        .route("/", get(serve_index))
        .route("/assets/*path", get(serve_static))
        // Personas
        .route("/api/personas", get(list_personas))
        .route("/api/personas/:id/fact", get(random_fact))
        // Sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(end_session))
        .route("/api/sessions/:id/submit", post(submit))
        .route("/api/sessions/:id/stop", post(stop_session))
        .route("/api/sessions/:id/reset", post(reset_session))
        // Model info
        .route("/api/models", get(list_models))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Page
// ============================================================

async fn serve_index() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - UI not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Personas
// ============================================================

async fn list_personas(State(state): State<AppState>) -> Json<PersonaListResponse> {
    let catalog = state.sessions.personas();
    Json(PersonaListResponse {
        personas: catalog.all().iter().map(PersonaInfo::from).collect(),
        default: catalog.default_persona().map(|p| p.id().to_string()),
    })
}

/// Topical fact shown while a reply is pending
async fn random_fact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FactResponse>, AppError> {
    let persona = state
        .sessions
        .personas()
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown persona: {id}")))?;

    let fact = persona
        .random_fact(&mut rand::thread_rng())
        .map(str::to_string);
    Ok(Json(FactResponse { fact }))
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .sessions
        .create(&req.persona, req.model.as_deref())
        .await?;
    Ok(session_response(session))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(session_response(state.sessions.get(&id).await?))
}

/// Runs the whole turn; the response carries the updated log
async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(session_response(state.sessions.submit(&id, req.text).await?))
}

async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(session_response(state.sessions.stop(&id).await?))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(session_response(state.sessions.reset(&id).await?))
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.end(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

fn session_response(session: SessionView) -> Json<SessionResponse> {
    Json(SessionResponse { session })
}

// ============================================================
// Model Info
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_model_info(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("persona-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        let message = e.to_string();
        match e {
            RuntimeError::UnknownPersona(_) | RuntimeError::SessionNotFound(_) => {
                AppError::NotFound(message)
            }
            RuntimeError::UnknownModel(_) | RuntimeError::Session(SessionError::Validation(_)) => {
                AppError::BadRequest(message)
            }
            RuntimeError::Session(
                SessionError::Busy | SessionError::Terminated | SessionError::InvalidTransition(_),
            ) => AppError::Conflict(message),
            RuntimeError::TaskFailed(_) => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
