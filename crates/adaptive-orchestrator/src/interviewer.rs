//! Drives interview sessions against a [`DiagnosticBackend`].
//!
//! An [`Interviewer`] owns one [`InterviewSession`] behind a mutex. Edits and
//! navigation are applied directly; an advance that needs an outbound call
//! runs that call in its own task, so a caller that goes away mid-call never
//! leaves the session stuck busy. Every change is broadcast as a
//! [`SessionEvent`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::backend::DiagnosticBackend;
use crate::config::FollowupFallback;
use crate::diagnostic::SubmissionOutcome;
use crate::error::{AdaptiveError, Result};
use crate::interview::{Advance, InterviewSession, SessionSnapshot};
use crate::websocket::{EventBroadcaster, SessionEvent};

/// Notice recorded when the interview continues without follow-ups.
const SKIPPED_FOLLOWUPS_NOTICE: &str =
    "Follow-up questions could not be generated; submitting your general answers.";

/// Message used when follow-up generation yields nothing and the fallback aborts.
const NO_FOLLOWUPS_MESSAGE: &str = "No follow-up questions were generated. Please try again.";

/// Longest pause between two sweeps for expired sessions.
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

// ============================================================================
// Interviewer
// ============================================================================

/// One interview session plus the backend it talks to.
pub struct Interviewer {
    id: Uuid,
    session: Arc<Mutex<InterviewSession>>,
    backend: Arc<dyn DiagnosticBackend>,
    fallback: FollowupFallback,
    events: EventBroadcaster,
}

impl std::fmt::Debug for Interviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interviewer")
            .field("id", &self.id)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl Interviewer {
    /// Starts a new interview.
    #[must_use]
    pub fn new(
        session: InterviewSession,
        backend: Arc<dyn DiagnosticBackend>,
        fallback: FollowupFallback,
    ) -> Self {
        Self {
            id: session.id,
            session: Arc::new(Mutex::new(session)),
            backend,
            fallback,
            events: EventBroadcaster::default(),
        }
    }

    /// Returns the session id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the event broadcaster for this session.
    #[must_use]
    pub const fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Returns the current snapshot.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    /// Returns `true` if the session has sat idle for at least `ttl`.
    ///
    /// A session with an outstanding call never expires.
    pub async fn is_expired(&self, ttl: Duration) -> bool {
        let session = self.session.lock().await;
        if session.phase.is_busy() {
            return false;
        }
        let idle = (Utc::now() - session.updated_at)
            .to_std()
            .unwrap_or_default();
        idle >= ttl
    }

    /// Replaces the answer at the cursor.
    pub async fn set_answer(&self, answer: impl Into<String> + Send) -> Result<SessionSnapshot> {
        let mut session = self.session.lock().await;
        session.set_answer(answer)?;
        Ok(session.snapshot())
    }

    /// Moves back one question.
    pub async fn previous(&self) -> Result<SessionSnapshot> {
        let snapshot = {
            let mut session = self.session.lock().await;
            session.previous()?;
            session.snapshot()
        };
        self.events.send(SessionEvent::question_changed(snapshot.clone()));
        Ok(snapshot)
    }

    /// Accepts the current answer and moves forward, waiting for any
    /// outbound call to settle.
    ///
    /// A failed outbound call is not an error here: the session moves to
    /// `Failed` and the returned snapshot carries the message.
    ///
    /// # Errors
    ///
    /// Returns the rejection from [`InterviewSession::advance`] (blank answer,
    /// busy, complete) without issuing any call.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn next(&self) -> Result<SessionSnapshot> {
        let (advance, snapshot) = {
            let mut session = self.session.lock().await;
            let advance = session.advance()?;
            (advance, session.snapshot())
        };

        let operation = match &advance {
            Advance::Moved => {
                self.events.send(SessionEvent::question_changed(snapshot.clone()));
                return Ok(snapshot);
            }
            Advance::FetchFollowups(_) => {
                self.events.send(SessionEvent::question_changed(snapshot));
                "Follow-up generation"
            }
            Advance::Submit(_) => {
                self.events.send(SessionEvent::submitting(snapshot));
                "Submission"
            }
        };

        let call = CallDriver {
            session: Arc::clone(&self.session),
            backend: Arc::clone(&self.backend),
            fallback: self.fallback,
            events: self.events.clone(),
        };
        match tokio::spawn(call.run(advance)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(session_id = %self.id, operation, error = %e, "Outbound call task failed");
                self.recover(operation).await;
                Err(AdaptiveError::TaskFailed {
                    operation: operation.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Moves a session left busy by a crashed call task to `Failed`.
    async fn recover(&self, operation: &str) {
        let mut session = self.session.lock().await;
        if !session.phase.is_busy() {
            return;
        }
        let message = format!("{operation} was interrupted. Please try again.");
        if session.fail(message.clone()).is_ok() {
            self.events.send(SessionEvent::error(message, session.snapshot()));
        }
    }
}

// ============================================================================
// Outbound call driver
// ============================================================================

/// Owned handles moved into the spawned call task.
struct CallDriver {
    session: Arc<Mutex<InterviewSession>>,
    backend: Arc<dyn DiagnosticBackend>,
    fallback: FollowupFallback,
    events: EventBroadcaster,
}

impl CallDriver {
    async fn run(self, mut advance: Advance) -> Result<SessionSnapshot> {
        loop {
            advance = match advance {
                Advance::Moved => return Ok(self.session.lock().await.snapshot()),
                Advance::FetchFollowups(request) => {
                    let outcome = self.backend.follow_up_questions(&request).await;
                    match self.apply_followups(outcome).await? {
                        Some(next) => next,
                        None => return Ok(self.session.lock().await.snapshot()),
                    }
                }
                Advance::Submit(request) => {
                    let outcome = self.backend.submit(&request).await;
                    return self.apply_submission(outcome).await;
                }
            };
        }
    }

    /// Applies the follow-up outcome. Returns the submission to run next when
    /// the fallback skips straight to it.
    async fn apply_followups(&self, outcome: Result<Vec<String>>) -> Result<Option<Advance>> {
        let mut session = self.session.lock().await;
        let reason = match outcome {
            Ok(questions) if !questions.is_empty() => {
                let count = questions.len();
                session.followups_loaded(questions)?;
                info!(session_id = %session.id, count, "Follow-up questions loaded");
                self.events
                    .send(SessionEvent::followups_loaded(count, session.snapshot()));
                return Ok(None);
            }
            Ok(_) => NO_FOLLOWUPS_MESSAGE.to_string(),
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Follow-up generation failed");
                e.user_message()
            }
        };

        match self.fallback {
            FollowupFallback::SubmitGeneral => {
                debug!(session_id = %session.id, %reason, "Submitting without follow-ups");
                let request = session.skip_followups(SKIPPED_FOLLOWUPS_NOTICE)?;
                self.events.send(SessionEvent::submitting(session.snapshot()));
                Ok(Some(Advance::Submit(request)))
            }
            FollowupFallback::Abort => {
                session.fail(reason.clone())?;
                self.events.send(SessionEvent::error(reason, session.snapshot()));
                Ok(None)
            }
        }
    }

    async fn apply_submission(&self, outcome: Result<SubmissionOutcome>) -> Result<SessionSnapshot> {
        let mut session = self.session.lock().await;
        match outcome {
            Ok(outcome) => {
                let courses = outcome.courses.len();
                session.complete(outcome)?;
                info!(session_id = %session.id, courses, "Interview complete");
                let snapshot = session.snapshot();
                self.events
                    .send(SessionEvent::interview_complete(snapshot.clone()));
                Ok(snapshot)
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Submission failed");
                let message = e.user_message();
                session.fail(message.clone())?;
                let snapshot = session.snapshot();
                self.events.send(SessionEvent::error(message, snapshot.clone()));
                Ok(snapshot)
            }
        }
    }
}

// ============================================================================
// Session Registry
// ============================================================================

/// In-memory index of live interviews.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Interviewer>>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an interviewer and returns the shared handle.
    ///
    /// The session is removed once it completes, after the completion event
    /// has gone out to watchers.
    pub async fn insert(&self, interviewer: Interviewer) -> Arc<Interviewer> {
        let interviewer = Arc::new(interviewer);
        let id = interviewer.id();
        let events = interviewer.events().subscribe();
        self.sessions
            .write()
            .await
            .insert(id, Arc::clone(&interviewer));
        tokio::spawn(self.clone().remove_on_completion(id, events));
        interviewer
    }

    async fn remove_on_completion(self, id: Uuid, mut events: broadcast::Receiver<SessionEvent>) {
        loop {
            match events.recv().await {
                Ok(SessionEvent::InterviewComplete(_)) => {
                    self.remove(id).await;
                    debug!(session_id = %id, "Completed session removed");
                    return;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Looks up a session.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::SessionNotFound`] for unknown ids.
    pub async fn get(&self, id: Uuid) -> Result<Arc<Interviewer>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AdaptiveError::SessionNotFound { id })
    }

    /// Drops a session. Returns the interviewer if it was registered.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<Interviewer>> {
        self.sessions.write().await.remove(&id)
    }

    /// Drops every session idle for at least `ttl` and returns how many
    /// were removed.
    pub async fn evict_expired(&self, ttl: Duration) -> usize {
        let candidates: Vec<Arc<Interviewer>> =
            self.sessions.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for interviewer in candidates {
            if interviewer.is_expired(ttl).await {
                expired.push(interviewer.id());
            }
        }

        if !expired.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &expired {
                sessions.remove(id);
            }
            info!(count = expired.len(), remaining = sessions.len(), "Expired sessions evicted");
        }
        expired.len()
    }

    /// Starts a background task that evicts expired sessions.
    ///
    /// Sweeps run every `ttl`, or every minute for longer lifetimes.
    pub fn spawn_sweeper(&self, ttl: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let period = ttl.clamp(Duration::from_secs(1), MAX_SWEEP_PERIOD);
            let mut sweep_interval = interval(period);
            sweep_interval.tick().await;
            loop {
                sweep_interval.tick().await;
                registry.evict_expired(ttl).await;
            }
        })
    }

    /// Returns the number of sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
