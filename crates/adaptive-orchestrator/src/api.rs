//! HTTP API endpoints for the diagnostic orchestrator.
//!
//! # Endpoints
//!
//! - `POST /api/diagnostic/questions` - Generate follow-up questions
//! - `POST /api/diagnostic` - Diagnose a finished interview and build courses
//! - `POST /api/personalize-lesson` - Rewrite one module from learner feedback
//! - `GET /api/courses?userId=...` - List a learner's courses
//! - `GET /api/courses/{id}` - Fetch one course
//! - `POST /api/sessions` - Start a server-driven interview
//! - `GET /api/sessions/{id}` - Current session snapshot
//! - `PUT /api/sessions/{id}/answer` - Edit the current answer
//! - `POST /api/sessions/{id}/next` - Advance
//! - `POST /api/sessions/{id}/previous` - Go back
//! - `GET /api/health` - Liveness check
//! - `GET /ws/sessions/{id}` - Session event stream
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use adaptive_orchestrator::{create_router, AppState, Config, DiagnosticService, ScriptedReasoning};
//!
//! # async fn example() {
//! let config = Config::default();
//! let service = DiagnosticService::from_config(&config, Arc::new(ScriptedReasoning::new()), None);
//! let router = create_router(AppState::new(config, service));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use adaptive_store::CourseRecord;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::DiagnosticBackend;
use crate::diagnostic::{FollowUpRequest, PersonalizeRequest, SubmissionOutcome, SubmissionRequest};
use crate::error::AdaptiveError;
use crate::interview::{InterviewSession, SessionSnapshot};
use crate::interviewer::{Interviewer, SessionRegistry};
use crate::questions::is_supported;
use crate::service::DiagnosticService;
use crate::websocket::ws_handler;
use crate::Config;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for `POST /api/diagnostic/questions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsResponse {
    /// Always `true`.
    pub success: bool,
    /// Generated follow-up questions; may be empty.
    pub questions: Vec<String>,
}

/// Response body for `POST /api/diagnostic`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticResponse {
    /// Always `true`.
    pub success: bool,
    /// Diagnosis and generated courses.
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
}

/// Response body for `POST /api/personalize-lesson`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizeResponse {
    /// Always `true`.
    pub success: bool,
    /// The course after the module was rewritten.
    pub updated_course: CourseRecord,
}

/// Response body for `GET /api/courses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoursesResponse {
    /// Always `true`.
    pub success: bool,
    /// Courses, newest first.
    pub courses: Vec<CourseRecord>,
}

/// Response body for `GET /api/courses/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseResponse {
    /// Always `true`.
    pub success: bool,
    /// The course.
    pub course: CourseRecord,
}

/// Response body for the session endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Always `true`.
    pub success: bool,
    /// The session after the request was applied.
    pub session: SessionSnapshot,
}

/// Query string for `GET /api/courses`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursesQuery {
    /// The learner whose courses to list.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Request body for `POST /api/sessions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// The learner taking the interview; anonymous if absent.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Interview language; the configured default if absent.
    #[serde(default)]
    pub language: Option<String>,
}

/// Request body for `PUT /api/sessions/{id}/answer`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    /// The answer text for the current question.
    pub answer: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Short human-readable message.
    pub error: String,
    /// Extra diagnostic detail, when there is any worth showing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Orchestrator configuration.
    pub config: Config,
    /// The diagnostic service behind every endpoint.
    pub service: Arc<DiagnosticService>,
    /// Live server-driven interviews.
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Creates application state around a diagnostic service.
    #[must_use]
    pub fn new(config: Config, service: DiagnosticService) -> Self {
        Self {
            config,
            service: Arc::new(service),
            sessions: SessionRegistry::new(),
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The request body was not valid JSON for the endpoint.
    MalformedBody(String),
    /// A path parameter could not be parsed.
    MalformedPath(String),
    /// The operation failed.
    Adaptive(AdaptiveError),
}

impl From<AdaptiveError> for ApiError {
    fn from(error: AdaptiveError) -> Self {
        Self::Adaptive(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::MalformedPath(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::MalformedBody(details) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    success: false,
                    error: "Invalid request body".to_string(),
                    details: Some(details),
                },
            ),
            Self::MalformedPath(details) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    success: false,
                    error: "Invalid path parameter".to_string(),
                    details: Some(details),
                },
            ),
            Self::Adaptive(err) => {
                let status = err.status_code();
                if status.is_server_error() {
                    error!(status = status.as_u16(), error = %err, "Request failed");
                } else {
                    warn!(status = status.as_u16(), error = %err, "Request rejected");
                }
                let details = match &err {
                    AdaptiveError::InvalidAiResponse { detail } => Some(detail.clone()),
                    AdaptiveError::Timeout { .. } => Some(err.to_string()),
                    _ => None,
                };
                (
                    status,
                    ErrorResponse {
                        success: false,
                        error: err.user_message(),
                        details,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// The router carries:
/// - All API routes under `/api`
/// - The session event stream under `/ws`
/// - CORS middleware allowing any origin
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/diagnostic/questions", post(handle_questions))
        .route("/diagnostic", post(handle_diagnostic))
        .route("/personalize-lesson", post(handle_personalize))
        .route("/courses", get(handle_list_courses))
        .route("/courses/:id", get(handle_get_course))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/:id", get(handle_get_session))
        .route("/sessions/:id/answer", put(handle_answer))
        .route("/sessions/:id/next", post(handle_next))
        .route("/sessions/:id/previous", post(handle_previous));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws/sessions/:id", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Diagnostic Handlers
// ============================================================================

/// Handler for `GET /api/health`.
async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Handler for `POST /api/diagnostic/questions`.
async fn handle_questions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FollowUpRequest>, JsonRejection>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    let Json(request) = payload?;
    let questions = state.service.follow_up_questions(&request).await?;
    info!(count = questions.len(), "Follow-up questions generated");
    Ok(Json(QuestionsResponse {
        success: true,
        questions,
    }))
}

/// Handler for `POST /api/diagnostic`.
async fn handle_diagnostic(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> Result<Json<DiagnosticResponse>, ApiError> {
    let Json(request) = payload?;
    let outcome = state.service.submit(&request).await?;
    info!(
        skill_level = %outcome.diagnostic.skill_level,
        courses = outcome.courses.len(),
        "Diagnosis complete"
    );
    Ok(Json(DiagnosticResponse {
        success: true,
        outcome,
    }))
}

/// Handler for `POST /api/personalize-lesson`.
async fn handle_personalize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PersonalizeRequest>, JsonRejection>,
) -> Result<Json<PersonalizeResponse>, ApiError> {
    let Json(request) = payload?;
    let feedback = request.validated()?;
    let updated_course = state.service.personalize(&feedback).await?;
    Ok(Json(PersonalizeResponse {
        success: true,
        updated_course,
    }))
}

/// Handler for `GET /api/courses`.
async fn handle_list_courses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CoursesQuery>,
) -> Result<Json<CoursesResponse>, ApiError> {
    let user_id = query.user_id.unwrap_or_default();
    let courses = state.service.courses_for(&user_id).await?;
    Ok(Json(CoursesResponse {
        success: true,
        courses,
    }))
}

/// Handler for `GET /api/courses/{id}`.
async fn handle_get_course(
    State(state): State<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CourseResponse>, ApiError> {
    let Path(id) = path?;
    let course = state.service.course(id).await?;
    Ok(Json(CourseResponse {
        success: true,
        course,
    }))
}

// ============================================================================
// Session Handlers
// ============================================================================

fn session_response(session: SessionSnapshot) -> Json<SessionResponse> {
    Json(SessionResponse {
        success: true,
        session,
    })
}

/// Handler for `POST /api/sessions`.
async fn handle_create_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let Json(request) = payload?;
    let language = request
        .language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| state.config.language.clone());
    let user_id = request.user_id.filter(|u| !u.trim().is_empty());
    if !is_supported(&language) {
        warn!(%language, "No translated questions for language, asking in English");
    }

    let backend: Arc<dyn DiagnosticBackend> = state.service.clone();
    let interviewer = state
        .sessions
        .insert(Interviewer::new(
            InterviewSession::new(user_id, language),
            backend,
            state.config.interview.followup_fallback,
        ))
        .await;
    info!(session_id = %interviewer.id(), "Interview session started");

    Ok((StatusCode::CREATED, session_response(interviewer.snapshot().await)))
}

/// Handler for `GET /api/sessions/{id}`.
async fn handle_get_session(
    State(state): State<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Path(id) = path?;
    let interviewer = state.sessions.get(id).await?;
    Ok(session_response(interviewer.snapshot().await))
}

/// Handler for `PUT /api/sessions/{id}/answer`.
async fn handle_answer(
    State(state): State<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Path(id) = path?;
    let Json(request) = payload?;
    let interviewer = state.sessions.get(id).await?;
    Ok(session_response(interviewer.set_answer(request.answer).await?))
}

/// Handler for `POST /api/sessions/{id}/next`.
async fn handle_next(
    State(state): State<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Path(id) = path?;
    let interviewer = state.sessions.get(id).await?;
    Ok(session_response(interviewer.next().await?))
}

/// Handler for `POST /api/sessions/{id}/previous`.
async fn handle_previous(
    State(state): State<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Path(id) = path?;
    let interviewer = state.sessions.get(id).await?;
    Ok(session_response(interviewer.previous().await?))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use adaptive_store::{
        ContentStore, CourseContent, CourseModule, MemoryStore, NewCourse, SkillLevel,
        StylePreference,
    };

    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use super::*;
    use crate::reasoning::{PromptKind, ScriptedReasoning};
    use crate::retry::RetryPolicy;

    const DIAGNOSIS: &str = r#"{"skillLevel": "Intermediate", "stylePreference": "PDF", "recommendedTopics": ["Ownership", "Traits"]}"#;
    const SYLLABUS: &str = r#"{"title": "Rust", "modules": [{"title": "Intro", "content": "Start."}]}"#;

    fn test_state(reasoning: ScriptedReasoning, store: Option<Arc<MemoryStore>>) -> AppState {
        let service = DiagnosticService::new(
            Arc::new(reasoning),
            store.map(|s| s as Arc<dyn ContentStore>),
            RetryPolicy::single_attempt(Duration::from_secs(5)),
            5,
        );
        AppState::new(Config::default(), service)
    }

    async fn send(state: AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let app = create_router(state);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn stored_course(store: &MemoryStore) -> CourseRecord {
        store
            .insert_course(NewCourse::new(
                "u1",
                SkillLevel::Beginner,
                StylePreference::Video,
                CourseContent::new(
                    "Rust",
                    vec![
                        CourseModule::new("Basics", "Variables."),
                        CourseModule::new("Ownership", "Moves."),
                    ],
                ),
            ))
            .await
            .unwrap()
    }

    // ------------------------------------------------------------------------
    // Diagnostic endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_health() {
        let state = test_state(ScriptedReasoning::new(), None);
        let (status, body) = send(state, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_questions_success() {
        let reasoning =
            ScriptedReasoning::new().reply(PromptKind::FollowUpQuestions, r#"["Q6", "Q7"]"#);
        let state = test_state(reasoning, None);

        let (status, body) = send(
            state,
            Method::POST,
            "/api/diagnostic/questions",
            Some(json!({"topic": "Rust", "skillLevel": "Beginner"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["questions"], json!(["Q6", "Q7"]));
    }

    #[tokio::test]
    async fn test_questions_missing_topic_returns_400() {
        let state = test_state(ScriptedReasoning::new(), None);
        let (status, body) = send(
            state,
            Method::POST,
            "/api/diagnostic/questions",
            Some(json!({"skillLevel": "Beginner"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing topic or skillLevel");
    }

    #[tokio::test]
    async fn test_questions_unparseable_reply_returns_502() {
        let reasoning = ScriptedReasoning::new().reply(PromptKind::FollowUpQuestions, "no json here");
        let state = test_state(reasoning, None);

        let (status, body) = send(
            state,
            Method::POST,
            "/api/diagnostic/questions",
            Some(json!({"topic": "Rust", "skillLevel": "Beginner"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Invalid AI response format");
    }

    #[tokio::test]
    async fn test_invalid_json_returns_400() {
        let app = create_router(test_state(ScriptedReasoning::new(), None));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/diagnostic")
                    .header("Content-Type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!body.success);
        assert!(body.details.is_some());
    }

    #[tokio::test]
    async fn test_diagnostic_saves_courses_for_user() {
        let store = Arc::new(MemoryStore::new());
        let reasoning = ScriptedReasoning::new()
            .reply(PromptKind::Diagnosis, DIAGNOSIS)
            .reply(PromptKind::Syllabus, SYLLABUS)
            .reply(PromptKind::Syllabus, SYLLABUS);
        let state = test_state(reasoning, Some(Arc::clone(&store)));

        let (status, body) = send(
            state,
            Method::POST,
            "/api/diagnostic",
            Some(json!({
                "responses": ["Beginner", "Text", "Rust", "work", "3 hrs"],
                "userId": "u1"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["diagnostic"]["skillLevel"], "Intermediate");
        assert_eq!(body["courses"].as_array().unwrap().len(), 2);
        assert!(body["courses"][0]["id"].is_string());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_diagnostic_blank_general_answer_returns_400() {
        let state = test_state(ScriptedReasoning::new(), None);
        let (status, body) = send(
            state,
            Method::POST,
            "/api/diagnostic",
            Some(json!({"responses": ["Beginner", "  ", "Rust", "work", "3 hrs"]})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Answer to question 2 must not be empty");
    }

    // ------------------------------------------------------------------------
    // Personalization endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_personalize_success() {
        let store = Arc::new(MemoryStore::new());
        let course = stored_course(&store).await;
        let reasoning =
            ScriptedReasoning::new().reply(PromptKind::Personalization, "Ownership, with pictures.");
        let state = test_state(reasoning, Some(Arc::clone(&store)));

        let (status, body) = send(
            state,
            Method::POST,
            "/api/personalize-lesson",
            Some(json!({"courseId": course.id, "moduleIndex": 1, "feedback": "More visuals"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let modules = &body["updatedCourse"]["content"]["modules"];
        assert_eq!(modules[0]["content"], "Variables.");
        assert_eq!(modules[1]["content"], "Ownership, with pictures.");
    }

    #[tokio::test]
    async fn test_personalize_missing_fields_returns_400() {
        let state = test_state(ScriptedReasoning::new(), Some(Arc::new(MemoryStore::new())));
        let (status, body) = send(
            state,
            Method::POST,
            "/api/personalize-lesson",
            Some(json!({"moduleIndex": 0, "feedback": "x"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn test_personalize_out_of_bounds_returns_400() {
        let store = Arc::new(MemoryStore::new());
        let course = stored_course(&store).await;
        let state = test_state(ScriptedReasoning::new(), Some(Arc::clone(&store)));

        let (status, _) = send(
            state,
            Method::POST,
            "/api/personalize-lesson",
            Some(json!({"courseId": course.id, "moduleIndex": 9, "feedback": "x"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(store.get_course(course.id).await.unwrap(), course);
    }

    #[tokio::test]
    async fn test_personalize_unknown_course_returns_404() {
        let state = test_state(ScriptedReasoning::new(), Some(Arc::new(MemoryStore::new())));
        let (status, _) = send(
            state,
            Method::POST,
            "/api/personalize-lesson",
            Some(json!({"courseId": Uuid::new_v4(), "moduleIndex": 0, "feedback": "x"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_personalize_without_store_returns_503() {
        let state = test_state(ScriptedReasoning::new(), None);
        let (status, _) = send(
            state,
            Method::POST,
            "/api/personalize-lesson",
            Some(json!({"courseId": Uuid::new_v4(), "moduleIndex": 0, "feedback": "x"})),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    // ------------------------------------------------------------------------
    // Course endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_list_and_get_courses() {
        let store = Arc::new(MemoryStore::new());
        let course = stored_course(&store).await;
        let state = test_state(ScriptedReasoning::new(), Some(store));

        let (status, body) = send(state.clone(), Method::GET, "/api/courses?userId=u1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["courses"].as_array().unwrap().len(), 1);

        let uri = format!("/api/courses/{}", course.id);
        let (status, body) = send(state.clone(), Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["course"]["title"], "Rust");

        let (status, body) = send(state, Method::GET, "/api/courses", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing userId");
    }

    // ------------------------------------------------------------------------
    // Session endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_session_flow() {
        let reasoning = ScriptedReasoning::new()
            .reply(PromptKind::FollowUpQuestions, r#"["Q6"]"#)
            .reply(PromptKind::Diagnosis, DIAGNOSIS);
        let state = test_state(reasoning, None);

        let (status, body) = send(
            state.clone(),
            Method::POST,
            "/api/sessions",
            Some(json!({"language": "Spanish"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["session"]["phase"], "asking_general");
        assert_eq!(body["session"]["language"], "Spanish");
        let id = body["session"]["id"].as_str().unwrap().to_string();

        let (status, body) =
            send(state.clone(), Method::POST, &format!("/api/sessions/{id}/next"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Answer to question 1 must not be empty");

        let mut body = Value::Null;
        for i in 0..6 {
            let (status, _) = send(
                state.clone(),
                Method::PUT,
                &format!("/api/sessions/{id}/answer"),
                Some(json!({"answer": format!("answer {i}")})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            let (status, next) =
                send(state.clone(), Method::POST, &format!("/api/sessions/{id}/next"), None).await;
            assert_eq!(status, StatusCode::OK);
            body = next;
        }

        assert_eq!(body["session"]["phase"], "complete");
        assert_eq!(body["session"]["progress"]["total"], 6);
        assert_eq!(body["session"]["result"]["diagnostic"]["stylePreference"], "PDF");

        // Completed sessions are dropped from the registry.
        tokio::time::timeout(Duration::from_secs(2), async {
            while !state.sessions.is_empty().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        let (status, _) = send(state, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_id_returns_json_error() {
        let state = test_state(ScriptedReasoning::new(), None);

        for (method, uri) in [
            (Method::GET, "/api/sessions/not-a-uuid"),
            (Method::POST, "/api/sessions/not-a-uuid/next"),
            (Method::GET, "/api/courses/42"),
        ] {
            let (status, body) = send(state.clone(), method, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["success"], false, "{uri}");
            assert_eq!(body["error"], "Invalid path parameter", "{uri}");
            assert!(body["details"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_session_previous_at_first_question_returns_409() {
        let state = test_state(ScriptedReasoning::new(), None);
        let (_, body) = send(state.clone(), Method::POST, "/api/sessions", Some(json!({}))).await;
        let id = body["session"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["session"]["language"], "English");

        let (status, _) =
            send(state, Method::POST, &format!("/api/sessions/{id}/previous"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_session_returns_404() {
        let state = test_state(ScriptedReasoning::new(), None);
        let uri = format!("/api/sessions/{}", Uuid::new_v4());
        let (status, body) = send(state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }
}
