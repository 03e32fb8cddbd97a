//! Session orchestrator: drives one evaluation chat from intake profile to
//! closed session.
//!
//! Flow:
//! - `initialize`: profile from the mirror → create session → attach
//!   profile → welcome turn → `Ready`
//! - `send_message`: optimistic user turn → post → assistant turn, or
//!   rollback of the optimistic turn on failure
//! - `finish`: close session → completion record → navigate to summary.
//!   Once the service has closed the session, a retry only rewrites the
//!   record and sending is refused.
//!
//! Every step asks `state::transition` first, so requests that are not
//! legal in the current state never reach the service.

pub mod events;
pub mod state;

pub use events::{ChatEvent, ChatEventSink, ChatView, Destination, NoopSink, RecordingSink};
pub use state::{transition, OrchestratorState, SessionEvent, TransitionError, MIN_TURNS_TO_FINISH};

use chrono::Utc;
use thiserror::Error;

use crate::mirror::{LocalStateMirror, MirrorError, MirrorStore};
use crate::models::{
    CompletionRecord, IntakeProfile, LocalIdSequence, SessionId, Turn, TurnId, UrgencyTier,
};
use crate::remote::{RemoteError, RemoteErrorKind, SessionApi};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Local state error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Not allowed while {state}")]
    NotReady { state: OrchestratorState },

    #[error("Session has {turn_count} turns, {required} required to finish")]
    TooFewTurns { turn_count: usize, required: usize },
}

impl From<TransitionError> for OrchestratorError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::NotAllowed { state, .. } => Self::NotReady { state },
            TransitionError::TooFewTurns {
                turn_count,
                required,
            } => Self::TooFewTurns {
                turn_count,
                required,
            },
        }
    }
}

impl OrchestratorError {
    /// Whether the user can simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_retryable(),
            Self::Mirror(MirrorError::Decode { .. }) => false,
            Self::Mirror(_) => true,
            Self::NotReady { .. } | Self::TooFewTurns { .. } => false,
        }
    }

    /// Short notice suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Remote(e) => match e.kind() {
                RemoteErrorKind::Network => {
                    "Unable to reach the assessment service. Check your connection and try again."
                        .into()
                }
                RemoteErrorKind::Service => {
                    "The assessment service could not process the request. Please try again."
                        .into()
                }
                RemoteErrorKind::Precondition => "The request was incomplete.".into(),
            },
            Self::Mirror(_) => "Local data could not be saved. Please try again.".into(),
            Self::NotReady { .. } => "Please wait for the current step to finish.".into(),
            Self::TooFewTurns { .. } => {
                "Answer a few more questions before finishing the evaluation.".into()
            }
        }
    }
}

/// Result of `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Session open, welcome turn shown.
    Ready { session_id: SessionId },
    /// No usable intake profile; nothing was sent to the service.
    NoProfile,
}

/// Result of `send_message` when no error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The assistant's reply, already appended to the turn list.
    Replied(Turn),
    /// Nothing was sent.
    Ignored(IgnoreReason),
}

/// Result of `finish` when no error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// Session closed and completion recorded.
    Closed(CompletionRecord),
    /// Nothing was sent.
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyText,
    NotReady,
    NoSession,
    TooFewTurns,
    /// The service already closed the session; only finishing remains.
    SessionClosed,
}

/// Drives one evaluation session against `A`, mirroring durable state into `S`.
pub struct SessionOrchestrator<A: SessionApi, S: MirrorStore> {
    api: A,
    mirror: LocalStateMirror<S>,
    sink: Box<dyn ChatEventSink + Send>,
    state: OrchestratorState,
    session_id: Option<SessionId>,
    remote_closed: bool,
    turns: Vec<Turn>,
    local_ids: LocalIdSequence,
    typing: bool,
    pending_input: String,
    notice: Option<String>,
}

impl<A: SessionApi, S: MirrorStore> SessionOrchestrator<A, S> {
    pub fn new(api: A, mirror: LocalStateMirror<S>) -> Self {
        Self {
            api,
            mirror,
            sink: Box::new(NoopSink),
            state: OrchestratorState::Uninitialized,
            session_id: None,
            remote_closed: false,
            turns: Vec::new(),
            local_ids: LocalIdSequence::new(),
            typing: false,
            pending_input: String::new(),
            notice: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn ChatEventSink + Send>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_local_ids(mut self, ids: LocalIdSequence) -> Self {
        self.local_ids = ids;
        self
    }

    // ── Accessors ───────────────────────────────────────

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn mirror(&self) -> &LocalStateMirror<S> {
        &self.mirror
    }

    /// Give back the service client and mirror, e.g. to load results.
    pub fn into_parts(self) -> (A, LocalStateMirror<S>) {
        (self.api, self.mirror)
    }

    pub fn can_send(&self) -> bool {
        self.state.is_ready() && self.session_id.is_some() && !self.remote_closed
    }

    pub fn can_finish(&self) -> bool {
        self.state.is_ready() && self.turns.len() >= MIN_TURNS_TO_FINISH
    }

    pub fn view(&self) -> ChatView {
        let last_assistant = self.turns.iter().rev().find(|t| t.is_assistant());
        ChatView {
            state: self.state.clone(),
            session_id: self.session_id.clone(),
            turns: self.turns.clone(),
            typing: self.typing,
            can_send: self.can_send(),
            can_finish: self.can_finish(),
            latest_urgency: last_assistant.and_then(|t| t.urgency),
            suggestions: last_assistant
                .map(|t| t.next_questions.clone())
                .unwrap_or_default(),
            pending_input: self.pending_input.clone(),
            notice: self.notice.clone(),
        }
    }

    /// Highest urgency seen so far in this session.
    pub fn max_urgency(&self) -> UrgencyTier {
        UrgencyTier::max_of(self.turns.iter().filter_map(|t| t.urgency))
    }

    // ═══════════════════════════════════════════
    // Initialize
    // ═══════════════════════════════════════════

    /// Open a session for the stored intake profile.
    ///
    /// Allowed from `Uninitialized` and `Failed`. A missing or unusable
    /// profile yields `NoProfile` and a navigation to intake, without any
    /// remote call. Any failure after that leaves `Failed` with no session
    /// and no turns.
    pub fn initialize(&mut self) -> Result<InitOutcome, OrchestratorError> {
        let initializing = transition(&self.state, &SessionEvent::InitRequested)?;

        let Some(profile) = self.stored_profile() else {
            tracing::info!("No intake profile stored, redirecting to intake");
            self.sink.emit(ChatEvent::Navigate {
                to: Destination::Intake,
            });
            return Ok(InitOutcome::NoProfile);
        };

        self.set_state(initializing);
        self.notice = None;

        match self.open_session(&profile) {
            Ok((session_id, welcome)) => {
                tracing::info!(session_id = %session_id, "Assessment session ready");
                self.session_id = Some(session_id.clone());
                self.remote_closed = false;
                self.push_turn(welcome);
                let ready = transition(&self.state, &SessionEvent::InitSucceeded)?;
                self.set_state(ready);
                Ok(InitOutcome::Ready { session_id })
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to open assessment session");
                if let Err(clear_err) = self.mirror.clear_active_session_id() {
                    tracing::warn!(error = %clear_err, "Could not clear active session id");
                }
                self.session_id = None;
                self.turns.clear();
                let failed = transition(
                    &self.state,
                    &SessionEvent::InitFailed {
                        reason: e.to_string(),
                    },
                )?;
                self.set_state(failed);
                self.set_notice(e.user_message());
                Err(e)
            }
        }
    }

    /// Profile from the mirror, or `None` when absent, unreadable or invalid.
    fn stored_profile(&self) -> Option<IntakeProfile> {
        match self.mirror.load_profile() {
            Ok(Some(profile)) => match profile.validate() {
                Ok(()) => Some(profile),
                Err(e) => {
                    tracing::warn!(error = %e, "Stored intake profile is invalid");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Stored intake profile is unreadable");
                None
            }
        }
    }

    /// Create, attach, welcome, then record the session as active.
    /// Nothing is kept in `self` until every step has succeeded.
    fn open_session(
        &self,
        profile: &IntakeProfile,
    ) -> Result<(SessionId, Turn), OrchestratorError> {
        let session_id = self.api.create_session(None)?;
        tracing::debug!(session_id = %session_id, "Session created");
        self.api.attach_profile(&session_id, profile)?;
        let welcome = self.api.fetch_welcome(&session_id)?;
        self.mirror.set_active_session_id(&session_id)?;
        Ok((session_id, welcome))
    }

    // ═══════════════════════════════════════════
    // Send
    // ═══════════════════════════════════════════

    /// Send `text` as the next user turn.
    ///
    /// Blank text, a state other than `Ready`, a missing session or one the
    /// service already closed make this a no-op. On failure the optimistic turn is removed again, the
    /// text is put back into the pending input and the error is returned.
    pub fn send_message(&mut self, text: &str) -> Result<SendOutcome, OrchestratorError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored(IgnoreReason::EmptyText));
        }
        let Ok(sending) = transition(&self.state, &SessionEvent::SendRequested) else {
            tracing::debug!(state = %self.state, "Send ignored, not ready");
            return Ok(SendOutcome::Ignored(IgnoreReason::NotReady));
        };
        let Some(session_id) = self.session_id.clone() else {
            return Ok(SendOutcome::Ignored(IgnoreReason::NoSession));
        };
        if self.remote_closed {
            tracing::debug!(session_id = %session_id, "Send ignored, session closed remotely");
            return Ok(SendOutcome::Ignored(IgnoreReason::SessionClosed));
        }

        let optimistic = Turn::optimistic_user(self.local_ids.next_id(), text);
        let local_id = optimistic.id.clone();
        self.push_turn(optimistic);
        self.set_pending_input("");
        self.notice = None;
        self.set_state(sending);
        self.set_typing(true);

        tracing::debug!(session_id = %session_id, chars = text.chars().count(), "Posting message");
        let result = self.api.post_message(&session_id, text);

        self.set_typing(false);
        let ready = transition(&self.state, &SessionEvent::SendSettled)?;

        match result {
            Ok(reply) => {
                tracing::info!(
                    session_id = %session_id,
                    turns = self.turns.len() + 1,
                    urgency = %reply.urgency.unwrap_or_default(),
                    "Assistant replied"
                );
                self.push_turn(reply.clone());
                self.set_state(ready);
                Ok(SendOutcome::Replied(reply))
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Message not delivered, rolling back");
                self.remove_turn(&local_id);
                self.set_pending_input(text);
                self.set_state(ready);
                let err = OrchestratorError::from(e);
                self.set_notice(err.user_message());
                Err(err)
            }
        }
    }

    /// Send whatever is in the pending input.
    pub fn send_pending(&mut self) -> Result<SendOutcome, OrchestratorError> {
        let text = self.pending_input.clone();
        self.send_message(&text)
    }

    // ── Pending input ───────────────────────────────────

    /// Put a suggested follow-up question into the input. Nothing is sent.
    pub fn select_suggestion(&mut self, suggestion: &str) {
        self.set_pending_input(suggestion);
    }

    pub fn set_pending_input(&mut self, text: &str) {
        if self.pending_input != text {
            self.pending_input = text.to_string();
            self.sink.emit(ChatEvent::PendingInput {
                text: self.pending_input.clone(),
            });
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    // ═══════════════════════════════════════════
    // Finish
    // ═══════════════════════════════════════════

    /// Close the session and record its completion.
    ///
    /// Needs `Ready` and at least `MIN_TURNS_TO_FINISH` turns; otherwise
    /// nothing happens and the reason is returned as `Ignored`. Any failure
    /// returns to `Ready` so the user can retry. A retry after the service
    /// already closed the session skips the close and only writes the record.
    pub fn finish(&mut self) -> Result<FinishOutcome, OrchestratorError> {
        let closing = match transition(
            &self.state,
            &SessionEvent::FinishRequested {
                turn_count: self.turns.len(),
            },
        ) {
            Ok(next) => next,
            Err(TransitionError::TooFewTurns { turn_count, .. }) => {
                tracing::debug!(turn_count, "Finish ignored, too few turns");
                return Ok(FinishOutcome::Ignored(IgnoreReason::TooFewTurns));
            }
            Err(TransitionError::NotAllowed { .. }) => {
                tracing::debug!(state = %self.state, "Finish ignored, not ready");
                return Ok(FinishOutcome::Ignored(IgnoreReason::NotReady));
            }
        };
        let Some(session_id) = self.session_id.clone() else {
            return Ok(FinishOutcome::Ignored(IgnoreReason::NoSession));
        };

        self.notice = None;
        self.set_state(closing);

        match self.close_and_record(&session_id) {
            Ok(record) => {
                tracing::info!(
                    session_id = %session_id,
                    turn_count = record.turn_count,
                    "Assessment session closed"
                );
                let closed = transition(&self.state, &SessionEvent::CloseSucceeded)?;
                self.set_state(closed);
                self.sink.emit(ChatEvent::Navigate {
                    to: Destination::Summary,
                });
                Ok(FinishOutcome::Closed(record))
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    remote_closed = self.remote_closed,
                    error = %e,
                    "Failed to finish session"
                );
                let ready = transition(&self.state, &SessionEvent::CloseFailed)?;
                self.set_state(ready);
                self.set_notice(e.user_message());
                Err(e)
            }
        }
    }

    fn close_and_record(
        &mut self,
        session_id: &SessionId,
    ) -> Result<CompletionRecord, OrchestratorError> {
        if !self.remote_closed {
            self.api.close_session(session_id)?;
            self.remote_closed = true;
        }

        let record = CompletionRecord {
            session_id: session_id.clone(),
            completed_at: Utc::now().naive_utc(),
            turn_count: self.turns.len(),
        };
        self.mirror.store_completion(&record)?;

        // Legacy copy and resume hint; the completion record is what matters.
        if let Err(e) = self.mirror.store_message_log(&self.turns) {
            tracing::warn!(error = %e, "Could not write message log");
        }
        if let Err(e) = self.mirror.clear_active_session_id() {
            tracing::warn!(error = %e, "Could not clear active session id");
        }
        Ok(record)
    }

    // ═══════════════════════════════════════════
    // Reset
    // ═══════════════════════════════════════════

    /// Forget the profile, session and completion record locally.
    /// The service is not contacted.
    pub fn reset(&mut self) -> Result<(), OrchestratorError> {
        let uninitialized = transition(&self.state, &SessionEvent::Reset)?;
        self.mirror.clear_all()?;
        self.session_id = None;
        self.remote_closed = false;
        self.turns.clear();
        self.pending_input.clear();
        self.notice = None;
        self.set_state(uninitialized);
        tracing::info!("Local evaluation state reset");
        Ok(())
    }

    // ── Internal ────────────────────────────────────────

    fn set_state(&mut self, next: OrchestratorState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "State change");
            self.state = next;
            self.sink.emit(ChatEvent::StateChanged {
                state: self.state.clone(),
            });
        }
    }

    fn set_typing(&mut self, active: bool) {
        self.typing = active;
        self.sink.emit(ChatEvent::Typing { active });
    }

    fn set_notice(&mut self, message: String) {
        self.notice = Some(message.clone());
        self.sink.emit(ChatEvent::Notice { message });
    }

    fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn.clone());
        self.sink.emit(ChatEvent::TurnAppended { turn });
    }

    /// Remove exactly the turn with `id`; other turns keep their order.
    fn remove_turn(&mut self, id: &TurnId) {
        let before = self.turns.len();
        self.turns.retain(|t| &t.id != id);
        if self.turns.len() != before {
            self.sink.emit(ChatEvent::TurnRemoved { id: id.clone() });
        }
    }
}
