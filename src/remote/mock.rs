use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDateTime, Utc};
use uuid::Uuid;

use super::{
    require_message_text, require_session_id, require_valid_profile, RemoteError, SessionApi,
    HISTORY_LIMIT,
};
use crate::models::{
    dedupe_preserving_order, IntakeProfile, Role, SessionId, SessionInfo, SessionStatus,
    SessionSummary, Turn, TurnId, UrgencyTier,
};

/// One `SessionApi` operation, as recorded in the mock's call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    CreateSession,
    AttachProfile,
    FetchWelcome,
    PostMessage,
    CloseSession,
    FetchSummary,
    FetchHistory,
    FetchSession,
    HealthCheck,
}

#[derive(Debug)]
struct MockSession {
    profile: Option<IntakeProfile>,
    turns: Vec<Turn>,
    start_time: NaiveDateTime,
    end_time: Option<NaiveDateTime>,
}

impl MockSession {
    fn max_urgency(&self) -> UrgencyTier {
        UrgencyTier::max_of(self.turns.iter().filter_map(|t| t.urgency))
    }
}

#[derive(Debug, Default)]
struct MockState {
    sessions: HashMap<String, MockSession>,
    calls: Vec<ApiOp>,
    fail_once: HashMap<ApiOp, RemoteError>,
    fail_always: HashMap<ApiOp, RemoteError>,
    reply_urgencies: VecDeque<UrgencyTier>,
}

/// In-process assessment service for tests.
///
/// Keeps sessions and turns in memory the way the real service stores
/// them, records every operation that reaches it, and can be told to fail
/// an operation once or persistently. Requests refused by a local
/// precondition never reach the log, matching the HTTP client.
#[derive(Debug, Default)]
pub struct MockSessionApi {
    state: Mutex<MockState>,
}

impl MockSessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Urgency tiers assigned to successive assistant replies. Once the
    /// queue runs dry, replies are `Low`.
    pub fn with_reply_urgencies(self, tiers: Vec<UrgencyTier>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.reply_urgencies = tiers.into();
        }
        self
    }

    /// Fail the next call of `op` with `error`.
    pub fn fail_next(&self, op: ApiOp, error: RemoteError) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_once.insert(op, error);
        }
    }

    /// Fail every call of `op` with `error` until `clear_failures`.
    pub fn fail_always(&self, op: ApiOp, error: RemoteError) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_always.insert(op, error);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_once.clear();
            state.fail_always.clear();
        }
    }

    /// Every operation that reached the service, in call order.
    pub fn calls(&self) -> Vec<ApiOp> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, op: ApiOp) -> usize {
        self.calls().into_iter().filter(|c| *c == op).count()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().map(|s| s.sessions.len()).unwrap_or(0)
    }

    /// Stored turns of a session, oldest first.
    pub fn stored_turns(&self, session_id: &SessionId) -> Vec<Turn> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.sessions.get(session_id.as_str()).map(|m| m.turns.clone()))
            .unwrap_or_default()
    }

    pub fn is_closed(&self, session_id: &SessionId) -> bool {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.sessions.get(session_id.as_str()).map(|m| m.end_time.is_some()))
            .unwrap_or(false)
    }

    // ── Internal ────────────────────────────────────────

    /// Log `op`, then apply any injected failure.
    fn begin(&self, op: ApiOp) -> Result<MutexGuard<'_, MockState>, RemoteError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RemoteError::Http("mock service state poisoned".into()))?;
        state.calls.push(op);
        if let Some(err) = state.fail_once.remove(&op) {
            return Err(err);
        }
        if let Some(err) = state.fail_always.get(&op) {
            return Err(err.clone());
        }
        Ok(state)
    }
}

fn not_found() -> RemoteError {
    RemoteError::Service {
        status: 404,
        message: "Session not found".into(),
    }
}

fn session_mut<'a>(
    state: &'a mut MockState,
    session_id: &SessionId,
) -> Result<&'a mut MockSession, RemoteError> {
    state
        .sessions
        .get_mut(session_id.as_str())
        .ok_or_else(not_found)
}

fn server_turn(role: Role, content: String, urgency: Option<UrgencyTier>) -> Turn {
    Turn {
        id: TurnId::Server(Uuid::new_v4().to_string()),
        role,
        content,
        timestamp: Utc::now().naive_utc(),
        urgency,
        next_questions: Vec::new(),
    }
}

impl SessionApi for MockSessionApi {
    fn create_session(&self, _profile_ref: Option<&str>) -> Result<SessionId, RemoteError> {
        let mut state = self.begin(ApiOp::CreateSession)?;
        let raw = Uuid::new_v4().to_string();
        state.sessions.insert(
            raw.clone(),
            MockSession {
                profile: None,
                turns: Vec::new(),
                start_time: Utc::now().naive_utc(),
                end_time: None,
            },
        );
        SessionId::parse(&raw)
            .ok_or_else(|| RemoteError::ResponseParsing("empty session id".into()))
    }

    fn attach_profile(
        &self,
        session_id: &SessionId,
        profile: &IntakeProfile,
    ) -> Result<(), RemoteError> {
        require_session_id(session_id)?;
        require_valid_profile(profile)?;
        let mut state = self.begin(ApiOp::AttachProfile)?;
        session_mut(&mut state, session_id)?.profile = Some(profile.clone());
        Ok(())
    }

    fn fetch_welcome(&self, session_id: &SessionId) -> Result<Turn, RemoteError> {
        require_session_id(session_id)?;
        let mut state = self.begin(ApiOp::FetchWelcome)?;
        let session = session_mut(&mut state, session_id)?;
        let profile = session.profile.as_ref().ok_or_else(|| RemoteError::Service {
            status: 400,
            message: "Profile not attached".into(),
        })?;

        let mut turn = server_turn(
            Role::Assistant,
            format!(
                "Hello. You reported {} with intensity {}/10. When did it start?",
                profile.primary_symptom, profile.intensity
            ),
            Some(UrgencyTier::Low),
        );
        turn.next_questions = vec![
            "It started today".to_string(),
            "A few days ago".to_string(),
        ];
        session.turns.push(turn.clone());
        Ok(turn)
    }

    fn post_message(&self, session_id: &SessionId, text: &str) -> Result<Turn, RemoteError> {
        require_session_id(session_id)?;
        require_message_text(text)?;
        let mut state = self.begin(ApiOp::PostMessage)?;
        let urgency = state.reply_urgencies.pop_front().unwrap_or(UrgencyTier::Low);
        let session = session_mut(&mut state, session_id)?;
        if session.end_time.is_some() {
            return Err(RemoteError::Service {
                status: 400,
                message: "Session is closed".into(),
            });
        }

        session
            .turns
            .push(server_turn(Role::User, text.to_string(), None));
        let mut reply = server_turn(
            Role::Assistant,
            "Thank you. Do you have any other symptoms?".to_string(),
            Some(urgency),
        );
        reply.next_questions = vec!["No other symptoms".to_string()];
        session.turns.push(reply.clone());
        Ok(reply)
    }

    fn close_session(&self, session_id: &SessionId) -> Result<(), RemoteError> {
        require_session_id(session_id)?;
        let mut state = self.begin(ApiOp::CloseSession)?;
        let session = session_mut(&mut state, session_id)?;
        if session.end_time.is_none() {
            session.end_time = Some(Utc::now().naive_utc());
        }
        Ok(())
    }

    fn fetch_summary(&self, session_id: &SessionId) -> Result<SessionSummary, RemoteError> {
        require_session_id(session_id)?;
        let mut state = self.begin(ApiOp::FetchSummary)?;
        let session = session_mut(&mut state, session_id)?;

        let symptoms = session
            .profile
            .as_ref()
            .map(|p| {
                let mut all = vec![p.primary_symptom.clone()];
                all.extend(p.associated_symptoms.iter().cloned());
                dedupe_preserving_order(all)
            })
            .unwrap_or_default();

        Ok(SessionSummary {
            session_id: session_id.clone(),
            start_time: session.start_time,
            end_time: session.end_time.unwrap_or_else(|| Utc::now().naive_utc()),
            message_count: u32::try_from(session.turns.len()).unwrap_or(u32::MAX),
            max_urgency: session.max_urgency(),
            symptoms_mentioned: symptoms,
            user_message_count: u32::try_from(
                session.turns.iter().filter(|t| t.is_user()).count(),
            )
            .ok(),
            known_conditions: session
                .profile
                .as_ref()
                .map(|p| p.known_conditions.clone())
                .unwrap_or_default(),
            profile_snapshot: session.profile.clone(),
        })
    }

    fn fetch_history(&self, session_id: &SessionId) -> Result<Vec<Turn>, RemoteError> {
        require_session_id(session_id)?;
        let mut state = self.begin(ApiOp::FetchHistory)?;
        let session = session_mut(&mut state, session_id)?;
        let limit = HISTORY_LIMIT as usize;
        let skip = session.turns.len().saturating_sub(limit);
        Ok(session.turns[skip..].to_vec())
    }

    fn fetch_session(&self, session_id: &SessionId) -> Result<SessionInfo, RemoteError> {
        require_session_id(session_id)?;
        let mut state = self.begin(ApiOp::FetchSession)?;
        let session = session_mut(&mut state, session_id)?;
        Ok(SessionInfo {
            session_id: session_id.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            message_count: u32::try_from(session.turns.len()).unwrap_or(u32::MAX),
            current_urgency: session.max_urgency(),
            status: if session.end_time.is_some() {
                SessionStatus::Completed
            } else {
                SessionStatus::Active
            },
        })
    }

    fn health_check(&self) -> Result<(), RemoteError> {
        let _state = self.begin(ApiOp::HealthCheck)?;
        Ok(())
    }
}
