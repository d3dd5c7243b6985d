//! Tutor HTTP server.
//!
//! Exposes sessions over a JSON API so a browser chat page (or any other
//! client) can drive the tutor. Each session has its own selection and
//! transcripts; all sessions share one knowledge base cache.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/catalog` | Classes and the subjects offered in each |
//! | `POST`   | `/sessions` | Create a session |
//! | `DELETE` | `/sessions/{id}` | Drop a session and its transcripts |
//! | `POST`   | `/sessions/{id}/select` | Select `{class, subject}`; loads or builds its knowledge base |
//! | `POST`   | `/sessions/{id}/ask` | Ask `{question}` about the current selection |
//! | `GET`    | `/sessions/{id}/messages` | Transcript for the current selection |
//! | `DELETE` | `/sessions/{id}/messages` | Clear the transcript for the current selection |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "unknown_selection", "message": "Chemistry is not offered for Class 5th" } }
//! ```
//!
//! Knowledge base failures use the snake_case error kind as `code`.
//! Answer failures are not HTTP errors: like every other surface, `/ask`
//! returns the error text as the assistant's reply.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use subject_tutor_core::catalog::{Catalog, ClassEntry};
use subject_tutor_core::conversation::Message;

use crate::answer::AnswerService;
use crate::cache::ResolveStatus;
use crate::error::{ErrorKind, KbError};
use crate::session::Session;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<Catalog>,
    service: Arc<AnswerService>,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>>,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>, service: Arc<AnswerService>) -> Self {
        Self {
            catalog,
            service,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn session(&self, id: &str) -> Result<Arc<Mutex<Session>>, AppError> {
        let id = Uuid::parse_str(id).map_err(|_| not_found(format!("no session: {}", id)))?;
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("no session: {}", id)))
    }

    fn remove_session(&self, id: &str) -> Result<(), AppError> {
        let id = Uuid::parse_str(id).map_err(|_| not_found(format!("no session: {}", id)))?;
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("no session: {}", id)))
    }
}

/// The API routes with permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/catalog", get(handle_catalog))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", delete(handle_delete_session))
        .route("/sessions/{id}/select", post(handle_select))
        .route("/sessions/{id}/ask", post(handle_ask))
        .route(
            "/sessions/{id}/messages",
            get(handle_messages).delete(handle_clear),
        )
        .layer(cors)
        .with_state(state)
}

/// Bind to `bind` and serve until the process is terminated.
pub async fn run_server(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind, "tutor server listening");
    println!("Tutor server listening on http://{}", bind);

    axum::serve(listener, router(state)).await?;
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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn no_selection() -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "no_selection".to_string(),
        message: "Please select a class and subject to start asking questions.".to_string(),
    }
}

impl From<KbError> for AppError {
    fn from(err: KbError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::InvalidKey | ErrorKind::UnknownSelection => StatusCode::BAD_REQUEST,
            ErrorKind::Lookup => StatusCode::NOT_FOUND,
            ErrorKind::DocumentRead | ErrorKind::EmptyDocument => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Build | ErrorKind::Load => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Answer => StatusCode::BAD_GATEWAY,
        };
        let code = serde_json::to_value(kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "internal".to_string());
        AppError {
            status,
            code,
            message: err.to_string(),
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

// ============ GET /catalog ============

#[derive(Serialize)]
struct CatalogResponse {
    classes: Vec<ClassEntry>,
}

async fn handle_catalog(State(state): State<AppState>) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        classes: state.catalog.entries().to_vec(),
    })
}

// ============ POST /sessions ============

#[derive(Serialize)]
struct SessionCreated {
    session_id: Uuid,
}

async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionCreated>) {
    let id = Uuid::new_v4();
    let session = Session::new(state.catalog.clone(), state.service.clone());
    state
        .sessions
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(id, Arc::new(Mutex::new(session)));
    tracing::debug!(session = %id, "session created");
    (StatusCode::CREATED, Json(SessionCreated { session_id: id }))
}

// ============ DELETE /sessions/{id} ============

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.remove_session(&id)?;
    tracing::debug!(session = %id, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /sessions/{id}/select ============

#[derive(Deserialize)]
struct SelectRequest {
    class: String,
    subject: String,
}

#[derive(Serialize)]
struct SelectResponse {
    class: String,
    subject: String,
    /// `"loaded"` or `"created"`; absent when the knowledge base was already in memory.
    status: Option<ResolveStatus>,
    message: Option<String>,
}

async fn handle_select(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, AppError> {
    let session = state.session(&id)?;
    let mut session = session.lock().await;

    let status = session.select(&req.class, &req.subject).await?;
    let message = match (status, session.current()) {
        (Some(status), Some(key)) => Some(status.message(key)),
        _ => None,
    };
    Ok(Json(SelectResponse {
        class: req.class,
        subject: req.subject,
        status,
        message,
    }))
}

// ============ POST /sessions/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let session = state.session(&id)?;
    let mut session = session.lock().await;
    let answer = session.ask(question).await.ok_or_else(no_selection)?;
    Ok(Json(AskResponse { answer }))
}

// ============ GET/DELETE /sessions/{id}/messages ============

#[derive(Serialize)]
struct MessagesResponse {
    class: Option<String>,
    subject: Option<String>,
    messages: Vec<Message>,
}

async fn handle_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let session = state.session(&id)?;
    let session = session.lock().await;
    let current = session.current();
    Ok(Json(MessagesResponse {
        class: current.map(|k| k.class().to_string()),
        subject: current.map(|k| k.subject().to_string()),
        messages: session.messages().to_vec(),
    }))
}

async fn handle_clear(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let session = state.session(&id)?;
    session.lock().await.clear();
    Ok(StatusCode::NO_CONTENT)
}
