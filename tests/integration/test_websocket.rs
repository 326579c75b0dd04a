//! Integration tests for WebSocket session observation.
//!
//! These tests validate that clients watching an interview receive its
//! snapshot on connect and every change driven through the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use adaptive_orchestrator::{
    create_router, AppState, Config, DiagnosticService, InterviewPhase, PromptKind,
    ReasoningErrorKind, RetryPolicy, ScriptedReasoning, SessionEvent,
};
use futures::SinkExt;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

const DIAGNOSIS: &str =
    r#"{"skillLevel": "Intermediate", "stylePreference": "Flashcards", "recommendedTopics": []}"#;

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spawns the test server and returns its address.
async fn spawn_test_server(reasoning: ScriptedReasoning) -> (String, tokio::task::JoinHandle<()>) {
    let service = DiagnosticService::new(
        Arc::new(reasoning),
        None,
        RetryPolicy::single_attempt(Duration::from_secs(5)),
        5,
    );
    let router = create_router(AppState::new(Config::default(), service));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr").to_string();

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    (addr, handle)
}

async fn create_session(addr: &str) -> String {
    let body: Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/sessions"))
        .json(&json!({}))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    body["session"]["id"].as_str().expect("session id").to_string()
}

/// Sets the current answer and advances.
async fn answer_and_next(addr: &str, id: &str, answer: &str) -> reqwest::StatusCode {
    let client = reqwest::Client::new();
    client
        .put(format!("http://{addr}/api/sessions/{id}/answer"))
        .json(&json!({ "answer": answer }))
        .send()
        .await
        .expect("Request failed");
    client
        .post(format!("http://{addr}/api/sessions/{id}/next"))
        .send()
        .await
        .expect("Request failed")
        .status()
}

/// Connects a WebSocket client to a session.
async fn connect_client(addr: &str, id: &str) -> WsClient {
    let (ws_stream, _) = connect_async(format!("ws://{addr}/ws/sessions/{id}"))
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next text message from the WebSocket and parses it as a
/// `SessionEvent`. Ping frames are answered with pong.
async fn receive_event(client: &mut WsClient) -> SessionEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => unreachable!("Expected text message, got: {other:?}"),
        }
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

/// Tests that a client receives the session snapshot on connect.
#[tokio::test]
async fn test_client_receives_snapshot_on_connect() {
    let (addr, _handle) = spawn_test_server(ScriptedReasoning::new()).await;
    let id = create_session(&addr).await;

    let mut client = connect_client(&addr, &id).await;
    let event = receive_event(&mut client).await;

    assert_eq!(event.event_name(), "connected");
    let session = event.session();
    assert_eq!(session.id.to_string(), id);
    assert_eq!(session.phase, InterviewPhase::AskingGeneral);
    assert_eq!(session.progress.current, 1);
    assert_eq!(session.progress.total, 5);
}

/// Tests that connecting to an unknown session is refused.
#[tokio::test]
async fn test_unknown_session_is_refused() {
    let (addr, _handle) = spawn_test_server(ScriptedReasoning::new()).await;

    let result = connect_async(format!("ws://{addr}/ws/sessions/{}", uuid::Uuid::new_v4())).await;

    assert!(result.is_err());
}

// ============================================================================
// Event Broadcast Tests
// ============================================================================

/// Tests that every watcher sees question changes.
#[tokio::test]
async fn test_question_changes_broadcast_to_all_clients() {
    let (addr, _handle) = spawn_test_server(ScriptedReasoning::new()).await;
    let id = create_session(&addr).await;

    let mut client1 = connect_client(&addr, &id).await;
    let mut client2 = connect_client(&addr, &id).await;
    receive_event(&mut client1).await;
    receive_event(&mut client2).await;

    assert_eq!(answer_and_next(&addr, &id, "Beginner").await, reqwest::StatusCode::OK);

    for client in [&mut client1, &mut client2] {
        let event = receive_event(client).await;
        assert_eq!(event.event_name(), "question_changed");
        assert_eq!(event.session().progress.current, 2);
        assert_eq!(event.session().responses[0], "Beginner");
    }
}

/// Tests the full event sequence from the fifth question to completion.
#[tokio::test]
async fn test_interview_event_sequence() {
    let reasoning = ScriptedReasoning::new()
        .reply(PromptKind::FollowUpQuestions, r#"["F1", "F2"]"#)
        .reply(PromptKind::Diagnosis, DIAGNOSIS);
    let (addr, _handle) = spawn_test_server(reasoning).await;
    let id = create_session(&addr).await;

    for answer in ["Beginner", "Video", "Rust", "career change"] {
        answer_and_next(&addr, &id, answer).await;
    }

    let mut client = connect_client(&addr, &id).await;
    let connected = receive_event(&mut client).await;
    assert_eq!(connected.session().progress.current, 5);

    answer_and_next(&addr, &id, "5 hrs").await;

    let event = receive_event(&mut client).await;
    assert_eq!(event.event_name(), "question_changed");
    assert_eq!(event.session().phase, InterviewPhase::FetchingFollowups);

    let event = receive_event(&mut client).await;
    match &event {
        SessionEvent::FollowupsLoaded(payload) => {
            assert_eq!(payload.count, 2);
            assert_eq!(payload.session.progress.total, 7);
            assert_eq!(payload.session.question, "F1");
        }
        other => unreachable!("Expected followups_loaded, got: {other:?}"),
    }

    answer_and_next(&addr, &id, "borrowing").await;
    let event = receive_event(&mut client).await;
    assert_eq!(event.event_name(), "question_changed");
    assert!(event.session().is_followup);

    answer_and_next(&addr, &id, "cargo").await;
    assert_eq!(receive_event(&mut client).await.event_name(), "submitting");

    let event = receive_event(&mut client).await;
    assert_eq!(event.event_name(), "interview_complete");
    let result = event.session().result.clone().expect("result");
    assert_eq!(result.diagnostic.recommended_topics.len(), 0);
    assert_eq!(result.diagnostic.style_preference.to_string(), "Flashcards");
}

/// Tests that a failed call is reported and the session stays resumable.
#[tokio::test]
async fn test_failed_submission_emits_error_event() {
    let reasoning = ScriptedReasoning::new()
        .reply(PromptKind::FollowUpQuestions, r#"["F1"]"#)
        .fail(PromptKind::Diagnosis, ReasoningErrorKind::Authentication)
        .reply(PromptKind::Diagnosis, DIAGNOSIS);
    let (addr, _handle) = spawn_test_server(reasoning).await;
    let id = create_session(&addr).await;

    for answer in ["Beginner", "Video", "Rust", "career change", "5 hrs"] {
        answer_and_next(&addr, &id, answer).await;
    }

    let mut client = connect_client(&addr, &id).await;
    receive_event(&mut client).await;

    answer_and_next(&addr, &id, "borrowing").await;
    assert_eq!(receive_event(&mut client).await.event_name(), "submitting");

    let event = receive_event(&mut client).await;
    match &event {
        SessionEvent::Error(payload) => {
            assert!(payload.message.contains("credentials"));
            assert_eq!(payload.session.phase, InterviewPhase::Failed);
            assert_eq!(payload.session.responses.len(), 6);
        }
        other => unreachable!("Expected error, got: {other:?}"),
    }

    let status = reqwest::Client::new()
        .post(format!("http://{addr}/api/sessions/{id}/next"))
        .send()
        .await
        .expect("Request failed")
        .status();
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(receive_event(&mut client).await.event_name(), "submitting");
    assert_eq!(
        receive_event(&mut client).await.event_name(),
        "interview_complete"
    );
}
