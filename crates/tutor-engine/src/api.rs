//! HTTP API endpoints for a browser quiz client.
//!
//! # Endpoints
//!
//! - `GET /api/state` - Current learning state
//! - `GET /api/question` - Question awaiting an answer, if any
//! - `POST /api/question/next` - Select a target and fetch a new question
//! - `POST /api/answer` - Submit an answer to the current question
//! - `POST /api/focus` - Replace the focus override
//! - `POST /api/reset` - Discard all progress
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tutor_engine::{create_router, AppState, Config, MemoryStore, OfflineGenerator, Session, ThreadRandom};
//!
//! # async fn example() -> tutor_engine::Result<()> {
//! let session = Session::bootstrap(&Config::default(), Box::new(MemoryStore::new()), Box::new(ThreadRandom))?;
//! let router = create_router(AppState::new(session, Arc::new(OfflineGenerator)));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::generator::{QuestionGenerator, QuestionSource};
use crate::learning_state::LearningState;
use crate::question::Question;
use crate::session::Session;
use crate::skill::Skill;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for `GET /api/question`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentQuestionResponse {
    /// The question awaiting an answer, or `null`.
    pub question: Option<Question>,
}

/// Response body for `POST /api/question/next`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionResponse {
    /// Id of the request that produced the question.
    pub request_id: u64,
    /// Whether the question was generated or synthesised locally.
    pub source: QuestionSource,
    /// The new current question.
    pub question: Question,
}

/// Request body for `POST /api/answer`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    /// The learner's raw answer text.
    pub answer: String,
}

/// Response body for `POST /api/answer`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    /// Whether the answer matched.
    pub correct: bool,
    /// Explanation to show the learner.
    pub explanation: String,
    /// The expected answer.
    pub correct_answer: String,
    /// Learning state after the transition.
    pub state: LearningState,
}

/// Request body for `POST /api/focus`.
#[derive(Debug, Clone, Deserialize)]
pub struct FocusRequest {
    /// Skill names to focus on; empty clears the override.
    pub skills: Vec<String>,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
///
/// The session is behind a mutex so only one request mutates it at a time.
#[derive(Clone)]
pub struct AppState {
    /// The learner's session.
    pub session: Arc<Mutex<Session>>,
    /// Where new questions come from.
    pub generator: Arc<dyn QuestionGenerator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates a new `AppState` around `session`.
    #[must_use]
    pub fn new(session: Session, generator: Arc<dyn QuestionGenerator>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            generator,
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// There is no question awaiting an answer.
    NoCurrentQuestion,
    /// A newer question request superseded this one.
    Superseded(u64),
    /// The request named a skill outside the curriculum.
    UnknownSkill(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NoCurrentQuestion => (
                StatusCode::CONFLICT,
                "No question is awaiting an answer; request one with POST /api/question/next"
                    .to_string(),
            ),
            Self::Superseded(id) => (
                StatusCode::CONFLICT,
                format!("Question request {id} was superseded by a newer request"),
            ),
            Self::UnknownSkill(name) => (
                StatusCode::BAD_REQUEST,
                format!("Unknown skill '{name}'"),
            ),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// The router has all API routes under `/api`, CORS middleware for
/// development, and tracing middleware for request logging.
pub fn create_router(state: AppState) -> Router {
    // Configure CORS for development (allow all origins)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/state", get(handle_state))
        .route("/question", get(handle_current_question))
        .route("/question/next", post(handle_next_question))
        .route("/answer", post(handle_answer))
        .route("/focus", post(handle_focus))
        .route("/reset", post(handle_reset));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/state`.
async fn handle_state(State(state): State<Arc<AppState>>) -> Json<LearningState> {
    let session = state.session.lock().await;
    Json(session.state().clone())
}

/// Handler for `GET /api/question`.
async fn handle_current_question(
    State(state): State<Arc<AppState>>,
) -> Json<CurrentQuestionResponse> {
    let session = state.session.lock().await;
    Json(CurrentQuestionResponse {
        question: session.current_question().cloned(),
    })
}

/// Handler for `POST /api/question/next`.
///
/// The generator is called without holding the session lock; if another
/// request is issued meanwhile, this one's result is discarded.
async fn handle_next_question(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NextQuestionResponse>, ApiError> {
    let (request, snapshot) = {
        let mut session = state.session.lock().await;
        let request = session.prepare_request();
        (request, session.state().clone())
    };

    let response = state.generator.generate(&snapshot, &request).await;

    let mut session = state.session.lock().await;
    let Some(source) = session.accept_question(&request, response) else {
        warn!(request_id = request.request_id, "Question request superseded");
        return Err(ApiError::Superseded(request.request_id));
    };
    let Some(question) = session.current_question().cloned() else {
        return Err(ApiError::NoCurrentQuestion);
    };

    info!(
        request_id = request.request_id,
        question_id = %question.id,
        source = ?source,
        "Question served"
    );

    Ok(Json(NextQuestionResponse {
        request_id: request.request_id,
        source,
        question,
    }))
}

/// Handler for `POST /api/answer`.
async fn handle_answer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let mut session = state.session.lock().await;
    let feedback = session
        .submit_answer(&request.answer)
        .ok_or(ApiError::NoCurrentQuestion)?;

    Ok(Json(AnswerResponse {
        correct: feedback.correct,
        explanation: feedback.explanation,
        correct_answer: feedback.correct_answer,
        state: session.state().clone(),
    }))
}

/// Handler for `POST /api/focus`.
async fn handle_focus(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FocusRequest>,
) -> Result<Json<LearningState>, ApiError> {
    let skills = request
        .skills
        .iter()
        .map(|name| Skill::from_name(name).ok_or_else(|| ApiError::UnknownSkill(name.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let mut session = state.session.lock().await;
    session.set_focus(skills);
    Ok(Json(session.state().clone()))
}

/// Handler for `POST /api/reset`.
async fn handle_reset(State(state): State<Arc<AppState>>) -> Json<LearningState> {
    let mut session = state.session.lock().await;
    session.reset();
    Json(session.state().clone())
}

// ============================================================================
// Tests
// ============================================================================
