//! WebSocket event types and broadcasting for live interview observation.
//!
//! Every interview session owns an [`EventBroadcaster`]. Clients connected to
//! `/ws/sessions/{id}` receive the session's events as they happen.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes the current snapshot
//! - `question_changed` - The cursor or phase moved
//! - `followups_loaded` - Follow-up questions were appended
//! - `submitting` - The answers were sent for diagnosis
//! - `interview_complete` - The diagnosis arrived
//! - `error` - An outbound call failed; the session stays resumable
//!
//! # Example
//!
//! ```no_run
//! use adaptive_orchestrator::websocket::{EventBroadcaster, SessionEvent};
//! use adaptive_orchestrator::InterviewSession;
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! let session = InterviewSession::new(None, "English");
//! broadcaster.send(SessionEvent::question_changed(session.snapshot()));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::PathRejection,
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiError, AppState};
use crate::interview::SessionSnapshot;
use crate::interviewer::Interviewer;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload carrying only the session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// The session after the change.
    pub session: SessionSnapshot,
}

/// Payload for the `followups_loaded` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowupsLoadedPayload {
    /// Number of follow-up questions appended.
    pub count: usize,
    /// The session after the change.
    pub session: SessionSnapshot,
}

/// Payload for the `error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable error message.
    pub message: String,
    /// The session after the failure.
    pub session: SessionSnapshot,
}

// ============================================================================
// Event Enum
// ============================================================================

/// WebSocket event types for interview observation.
///
/// All events are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent when a client connects.
    Connected(SnapshotPayload),
    /// Sent when the cursor or phase moves.
    QuestionChanged(SnapshotPayload),
    /// Sent when follow-up questions are appended.
    FollowupsLoaded(FollowupsLoadedPayload),
    /// Sent when the answers are submitted.
    Submitting(SnapshotPayload),
    /// Sent when the interview completes.
    InterviewComplete(SnapshotPayload),
    /// Sent when an outbound call fails.
    Error(ErrorPayload),
}

impl SessionEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(session: SessionSnapshot) -> Self {
        Self::Connected(SnapshotPayload { session })
    }

    /// Creates a `QuestionChanged` event.
    #[must_use]
    pub const fn question_changed(session: SessionSnapshot) -> Self {
        Self::QuestionChanged(SnapshotPayload { session })
    }

    /// Creates a `FollowupsLoaded` event.
    #[must_use]
    pub const fn followups_loaded(count: usize, session: SessionSnapshot) -> Self {
        Self::FollowupsLoaded(FollowupsLoadedPayload { count, session })
    }

    /// Creates a `Submitting` event.
    #[must_use]
    pub const fn submitting(session: SessionSnapshot) -> Self {
        Self::Submitting(SnapshotPayload { session })
    }

    /// Creates an `InterviewComplete` event.
    #[must_use]
    pub const fn interview_complete(session: SessionSnapshot) -> Self {
        Self::InterviewComplete(SnapshotPayload { session })
    }

    /// Creates an `Error` event.
    #[must_use]
    pub fn error(message: impl Into<String>, session: SessionSnapshot) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
            session,
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::QuestionChanged(_) => "question_changed",
            Self::FollowupsLoaded(_) => "followups_loaded",
            Self::Submitting(_) => "submitting",
            Self::InterviewComplete(_) => "interview_complete",
            Self::Error(_) => "error",
        }
    }

    /// Returns the snapshot carried by the event.
    #[must_use]
    pub const fn session(&self) -> &SessionSnapshot {
        match self {
            Self::Connected(p)
            | Self::QuestionChanged(p)
            | Self::Submitting(p)
            | Self::InterviewComplete(p) => &p.session,
            Self::FollowupsLoaded(p) => &p.session,
            Self::Error(p) => &p.session,
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts session events to all connected WebSocket clients.
///
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster with the given per-subscriber buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives a `Lagged` error and misses
    /// some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event, returning the number of receivers.
    pub fn send(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// WebSocket upgrade handler for `/ws/sessions/{id}`.
///
/// Unknown sessions are answered with 404 before upgrading.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    path: Result<Path<Uuid>, PathRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let id = match path {
        Ok(Path(id)) => id,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    let interviewer = match state.sessions.get(id).await {
        Ok(interviewer) => interviewer,
        Err(e) => return ApiError::from(e).into_response(),
    };
    info!(session_id = %id, "New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, interviewer))
}

/// Handles a single WebSocket connection.
///
/// - Sends `connected` with the current snapshot immediately
/// - Forwards every session event to the client
/// - Sends heartbeat pings every 30 seconds
/// - Closes the connection after 3 missed pongs
async fn handle_socket(socket: WebSocket, interviewer: Arc<Interviewer>) {
    let (mut sender, mut receiver) = socket.split();
    let session_id = interviewer.id();

    // Subscribe before taking the snapshot so no event falls in between.
    let mut event_receiver = interviewer.events().subscribe();

    let connected_event = SessionEvent::connected(interviewer.snapshot().await);
    let connected_json = match serde_json::to_string(&connected_event) {
        Ok(json) => json,
        Err(e) => {
            warn!(%session_id, "Failed to serialize connected event: {}", e);
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!(%session_id, "Client disconnected before receiving connected event");
        return;
    }

    info!(%session_id, "WebSocket client connected, sent initial snapshot");

    let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
    heartbeat_interval.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!(%session_id, "Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(%session_id, "Client requested close");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!(%session_id, "Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        debug!(%session_id, "Ignoring data message from client");
                    }
                    Some(Err(e)) => {
                        debug!(%session_id, "WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!(%session_id, "WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(session_event) => {
                        debug!(
                            %session_id,
                            event = session_event.event_name(),
                            phase = ?session_event.session().phase,
                            "Forwarding session event"
                        );
                        let json = match serde_json::to_string(&session_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!(%session_id, "Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!(%session_id, "Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%session_id, "Client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(%session_id, "Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!(%session_id, "Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!(%session_id, "Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    drop(event_receiver);
    info!(
        %session_id,
        subscribers = interviewer.events().receiver_count(),
        "WebSocket client disconnected"
    );
}

// ============================================================================
// Tests
// ============================================================================
