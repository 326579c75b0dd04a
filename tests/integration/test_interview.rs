//! Integration tests for the diagnostic interview over HTTP.
//!
//! These tests run the real router on an ephemeral port with a scripted
//! reasoning service and an in-memory course store, then drive it the way a
//! frontend would.

use std::sync::Arc;
use std::time::Duration;

use adaptive_orchestrator::{
    create_router, AppState, Config, DiagnosticService, FollowupFallback, HttpBackend,
    InterviewPhase, InterviewSession, Interviewer, PromptKind, ReasoningErrorKind, RetryPolicy,
    ScriptedReasoning,
};
use adaptive_store::{
    ContentStore, CourseContent, CourseModule, CourseRecord, MemoryStore, NewCourse, SkillLevel,
    StylePreference,
};
use axum::routing::post;
use axum::{Json, Router};
use reqwest::StatusCode;
use serde_json::{json, Value};

const GENERAL_ANSWERS: [&str; 5] = ["Beginner", "Video", "Rust", "career change", "5 hrs"];

const SYLLABUS: &str = r#"{
    "title": "Rust Foundations",
    "modules": [{"title": "Setup", "content": "Install rustup."}],
    "estimatedHours": 6
}"#;

/// A running test server.
struct TestServer {
    base_url: String,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Spawns `router` on an ephemeral port.
async fn spawn_router(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        _handle: handle,
    }
}

/// Spawns the orchestrator around a scripted reasoning service.
async fn spawn_server(
    reasoning: Arc<ScriptedReasoning>,
    store: Option<Arc<MemoryStore>>,
    retry: RetryPolicy,
) -> TestServer {
    let service = DiagnosticService::new(
        reasoning,
        store.map(|s| s as Arc<dyn ContentStore>),
        retry,
        5,
    );
    spawn_router(create_router(AppState::new(Config::default(), service))).await
}

fn single_attempt() -> RetryPolicy {
    RetryPolicy::single_attempt(Duration::from_secs(5))
}

fn diagnosis(skill: &str, topics: &[&str]) -> String {
    json!({
        "skillLevel": skill,
        "stylePreference": "Video",
        "recommendedTopics": topics,
    })
    .to_string()
}

async fn post_json(client: &reqwest::Client, url: &str, body: &Value) -> (StatusCode, Value) {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .expect("Request failed");
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

async fn create_session(client: &reqwest::Client, server: &TestServer) -> String {
    let (status, body) = post_json(client, &server.url("/api/sessions"), &json!({"userId": "u1"})).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session"]["id"]
        .as_str()
        .expect("session id")
        .to_string()
}

async fn answer(client: &reqwest::Client, server: &TestServer, id: &str, text: &str) {
    let status = client
        .put(server.url(&format!("/api/sessions/{id}/answer")))
        .json(&json!({ "answer": text }))
        .send()
        .await
        .expect("Request failed")
        .status();
    assert_eq!(status, StatusCode::OK);
}

async fn next(client: &reqwest::Client, server: &TestServer, id: &str) -> (StatusCode, Value) {
    post_json(client, &server.url(&format!("/api/sessions/{id}/next")), &json!({})).await
}

/// Answers the general questions, leaving the cursor on the fifth one.
async fn answer_general_questions(client: &reqwest::Client, server: &TestServer, id: &str) {
    for (i, text) in GENERAL_ANSWERS.iter().enumerate() {
        answer(client, server, id, text).await;
        if i + 1 < GENERAL_ANSWERS.len() {
            let (status, _) = next(client, server, id).await;
            assert_eq!(status, StatusCode::OK);
        }
    }
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
                    CourseModule::new("Basics", "Variables and types."),
                    CourseModule::new("Ownership", "Moves, borrows, and lifetimes."),
                ],
            ),
        ))
        .await
        .expect("insert course")
}

// ============================================================================
// Follow-up Generation Tests
// ============================================================================

/// Double-clicking Next past the fifth question issues one generation call.
#[tokio::test]
async fn test_concurrent_next_issues_one_followup_call() {
    let reasoning = Arc::new(
        ScriptedReasoning::new()
            .reply(PromptKind::FollowUpQuestions, r#"["F1", "F2", "F3"]"#)
            .with_delay(Duration::from_millis(300)),
    );
    let server = spawn_server(Arc::clone(&reasoning), None, single_attempt()).await;
    let client = reqwest::Client::new();

    let id = create_session(&client, &server).await;
    answer_general_questions(&client, &server, &id).await;

    let (first, second, third) = tokio::join!(
        next(&client, &server, &id),
        next(&client, &server, &id),
        next(&client, &server, &id),
    );
    let statuses = [first.0, second.0, third.0];

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 2);
    assert_eq!(reasoning.calls(PromptKind::FollowUpQuestions).await, 1);
}

/// Three generated follow-ups grow the interview from five to eight questions.
#[tokio::test]
async fn test_followups_extend_progress_denominator() {
    let reasoning = Arc::new(
        ScriptedReasoning::new().reply(PromptKind::FollowUpQuestions, r#"["F1", "F2", "F3"]"#),
    );
    let server = spawn_server(Arc::clone(&reasoning), None, single_attempt()).await;
    let client = reqwest::Client::new();

    let id = create_session(&client, &server).await;
    let (_, body) = post_json(&client, &server.url("/api/sessions"), &json!({})).await;
    assert_eq!(body["session"]["progress"]["total"], 5);

    answer_general_questions(&client, &server, &id).await;
    let (status, body) = next(&client, &server, &id).await;

    assert_eq!(status, StatusCode::OK);
    let session = &body["session"];
    assert_eq!(session["phase"], "asking_followup");
    assert_eq!(session["question"], "F1");
    assert_eq!(session["progress"]["current"], 6);
    assert_eq!(session["progress"]["total"], 8);

    let requests = reasoning.requests().await;
    assert!(requests[0].prompt.contains("\"Rust\""));
    assert!(requests[0].prompt.contains("\"Beginner\""));
}

/// Failed generation falls back to submitting the five general answers.
#[tokio::test]
async fn test_failed_followups_submit_general_answers() {
    let store = Arc::new(MemoryStore::new());
    let reasoning = Arc::new(
        ScriptedReasoning::new()
            .fail(PromptKind::FollowUpQuestions, ReasoningErrorKind::Authentication)
            .reply(PromptKind::Diagnosis, diagnosis("Beginner", &["Rust"]))
            .reply(PromptKind::Syllabus, SYLLABUS),
    );
    let server = spawn_server(Arc::clone(&reasoning), Some(Arc::clone(&store)), single_attempt()).await;
    let client = reqwest::Client::new();

    let id = create_session(&client, &server).await;
    answer_general_questions(&client, &server, &id).await;
    let (status, body) = next(&client, &server, &id).await;

    assert_eq!(status, StatusCode::OK);
    let session = &body["session"];
    assert_eq!(session["phase"], "complete");
    assert!(session["notice"].is_string());
    assert_eq!(session["responses"].as_array().map(Vec::len), Some(5));
    assert_eq!(store.len().await, 1);
}

// ============================================================================
// Submission Tests
// ============================================================================

/// A rejected submission surfaces its message and keeps every answer.
#[tokio::test]
async fn test_rejected_submission_keeps_answers() {
    let stub = Router::new()
        .route(
            "/api/diagnostic/questions",
            post(|| async { Json(json!({"success": true, "questions": ["F1"]})) }),
        )
        .route(
            "/api/diagnostic",
            post(|| async { Json(json!({"success": false, "error": "x"})) }),
        );
    let server = spawn_router(stub).await;

    let interviewer = Interviewer::new(
        InterviewSession::new(Some("u1".to_string()), "English"),
        Arc::new(HttpBackend::new(server.url("/"))),
        FollowupFallback::SubmitGeneral,
    );

    for text in GENERAL_ANSWERS {
        interviewer.set_answer(text).await.expect("set answer");
        interviewer.next().await.expect("next");
    }
    let snapshot = interviewer.snapshot().await;
    assert_eq!(snapshot.phase, InterviewPhase::AskingFollowup);
    assert_eq!(snapshot.question, "F1");

    interviewer.set_answer("lifetimes confuse me").await.expect("set answer");
    let snapshot = interviewer.next().await.expect("next");

    assert_eq!(snapshot.phase, InterviewPhase::Failed);
    assert_eq!(snapshot.error.as_deref(), Some("x"));
    assert_eq!(snapshot.responses[..5], GENERAL_ANSWERS.map(String::from));
    assert_eq!(snapshot.responses[5], "lifetimes confuse me");
    assert!(snapshot.result.is_none());
}

/// An out-of-range skill level from the model is stored as Beginner.
#[tokio::test]
async fn test_unknown_skill_level_coerces_to_beginner() {
    let store = Arc::new(MemoryStore::new());
    let reasoning = Arc::new(
        ScriptedReasoning::new()
            .reply(PromptKind::Diagnosis, diagnosis("Expert", &["Rust"]))
            .reply(PromptKind::Syllabus, SYLLABUS),
    );
    let server = spawn_server(reasoning, Some(Arc::clone(&store)), single_attempt()).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        &server.url("/api/diagnostic"),
        &json!({"responses": GENERAL_ANSWERS, "userId": "u1"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["diagnostic"]["skillLevel"], "Beginner");

    let courses = store.courses_for_user("u1").await.expect("list courses");
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].skill_level, SkillLevel::Beginner);
}

/// Eight answers and three recommended topics produce three stored courses.
#[tokio::test]
async fn test_full_interview_creates_course_per_topic() {
    let store = Arc::new(MemoryStore::new());
    let reasoning = Arc::new(
        ScriptedReasoning::new()
            .reply(PromptKind::FollowUpQuestions, r#"["F1", "F2", "F3"]"#)
            .reply(
                PromptKind::Diagnosis,
                diagnosis("Beginner", &["Ownership", "Traits", "Async"]),
            )
            .reply(PromptKind::Syllabus, SYLLABUS)
            .reply(PromptKind::Syllabus, SYLLABUS)
            .reply(PromptKind::Syllabus, SYLLABUS),
    );
    let server = spawn_server(Arc::clone(&reasoning), Some(Arc::clone(&store)), single_attempt()).await;
    let client = reqwest::Client::new();

    let id = create_session(&client, &server).await;
    answer_general_questions(&client, &server, &id).await;
    next(&client, &server, &id).await;
    let mut body = Value::Null;
    for text in ["borrowing", "cargo", "tokio"] {
        answer(&client, &server, &id, text).await;
        let (status, next_body) = next(&client, &server, &id).await;
        assert_eq!(status, StatusCode::OK);
        body = next_body;
    }

    assert_eq!(body["session"]["phase"], "complete");
    assert_eq!(body["session"]["responses"].as_array().map(Vec::len), Some(8));
    assert_eq!(reasoning.calls(PromptKind::Syllabus).await, 3);

    let body: Value = client
        .get(server.url("/api/courses?userId=u1"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    let courses = body["courses"].as_array().expect("courses array");
    assert_eq!(courses.len(), 3);
    for course in courses {
        assert!(!course["title"].as_str().unwrap_or_default().is_empty());
        assert!(!course["content"]["modules"]
            .as_array()
            .expect("modules array")
            .is_empty());
    }
}

/// Transient reasoning failures are retried within the policy.
#[tokio::test]
async fn test_transient_failure_is_retried() {
    let reasoning = Arc::new(
        ScriptedReasoning::new()
            .fail(PromptKind::FollowUpQuestions, ReasoningErrorKind::Server)
            .reply(PromptKind::FollowUpQuestions, r#"["F1"]"#),
    );
    let retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(20),
        timeout: Duration::from_secs(5),
    };
    let server = spawn_server(Arc::clone(&reasoning), None, retry).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        &server.url("/api/diagnostic/questions"),
        &json!({"topic": "Rust", "skillLevel": "Beginner"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["questions"], json!(["F1"]));
    assert_eq!(reasoning.calls(PromptKind::FollowUpQuestions).await, 2);
}

// ============================================================================
// Personalization Tests
// ============================================================================

/// Personalizing one module leaves the others untouched.
#[tokio::test]
async fn test_personalize_replaces_only_target_module() {
    let store = Arc::new(MemoryStore::new());
    let course = stored_course(&store).await;
    let reasoning = Arc::new(
        ScriptedReasoning::new().reply(PromptKind::Personalization, "Values have one owner."),
    );
    let server = spawn_server(reasoning, Some(Arc::clone(&store)), single_attempt()).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        &server.url("/api/personalize-lesson"),
        &json!({"courseId": course.id, "moduleIndex": 1, "feedback": "simpler please"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let updated = store.get_course(course.id).await.expect("get course");
    assert_eq!(updated.content.modules[0], course.content.modules[0]);
    assert_eq!(updated.content.modules[1].title, "Ownership");
    assert_eq!(updated.content.modules[1].content, "Values have one owner.");
    assert_eq!(updated.content.title, course.content.title);
}

/// An out-of-range module index is rejected and nothing changes.
#[tokio::test]
async fn test_personalize_out_of_bounds_leaves_course_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let course = stored_course(&store).await;
    let reasoning = Arc::new(ScriptedReasoning::new());
    let server = spawn_server(Arc::clone(&reasoning), Some(Arc::clone(&store)), single_attempt()).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        &server.url("/api/personalize-lesson"),
        &json!({"courseId": course.id, "moduleIndex": 5, "feedback": "simpler please"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(reasoning.calls(PromptKind::Personalization).await, 0);
    assert_eq!(store.get_course(course.id).await.expect("get course"), course);
}
