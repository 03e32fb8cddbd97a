//! Remote session client: the request/response contract with the
//! assessment service.
//!
//! `SessionApi` is the seam the orchestrator and results loader depend on.
//! `HttpSessionClient` speaks the service's JSON over HTTP; `MockSessionApi`
//! is a scripted in-process stand-in used by tests. Neither retries nor
//! caches: every call is one request, and failures are normalized into
//! `RemoteError`.

pub mod http;
pub mod mock;
pub mod wire;

pub use http::HttpSessionClient;
pub use mock::{ApiOp, MockSessionApi};

use thiserror::Error;

use crate::models::{IntakeProfile, SessionId, SessionInfo, SessionSummary, Turn};

/// Default number of turns requested from the history endpoint.
pub const HISTORY_LIMIT: u32 = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Assessment service is not reachable at {0}")]
    Unreachable(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Assessment service returned error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Coarse failure class, used by callers to pick a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Refused locally before any request was issued.
    Precondition,
    /// Timeout, connection refused, DNS, TLS.
    Network,
    /// The service answered, but not with a usable success.
    Service,
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            Self::Precondition(_) => RemoteErrorKind::Precondition,
            Self::Unreachable(_) | Self::Timeout(_) | Self::Http(_) => RemoteErrorKind::Network,
            Self::Service { .. } | Self::ResponseParsing(_) => RemoteErrorKind::Service,
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), RemoteErrorKind::Precondition)
    }
}

/// Operations the assessment service exposes for one evaluation session.
pub trait SessionApi {
    /// Create a session, optionally linked to an existing profile reference.
    fn create_session(&self, profile_ref: Option<&str>) -> Result<SessionId, RemoteError>;

    fn attach_profile(
        &self,
        session_id: &SessionId,
        profile: &IntakeProfile,
    ) -> Result<(), RemoteError>;

    /// Personalized first assistant turn for a freshly profiled session.
    fn fetch_welcome(&self, session_id: &SessionId) -> Result<Turn, RemoteError>;

    /// Post a user message; returns only the assistant's reply turn.
    fn post_message(&self, session_id: &SessionId, text: &str) -> Result<Turn, RemoteError>;

    fn close_session(&self, session_id: &SessionId) -> Result<(), RemoteError>;

    fn fetch_summary(&self, session_id: &SessionId) -> Result<SessionSummary, RemoteError>;

    /// Ordered turns of the session, oldest first.
    fn fetch_history(&self, session_id: &SessionId) -> Result<Vec<Turn>, RemoteError>;

    fn fetch_session(&self, session_id: &SessionId) -> Result<SessionInfo, RemoteError>;

    fn health_check(&self) -> Result<(), RemoteError>;
}

/// Fail fast on ids that would produce a malformed request path.
pub(crate) fn require_session_id(session_id: &SessionId) -> Result<(), RemoteError> {
    if session_id.as_str().trim().is_empty() {
        return Err(RemoteError::Precondition("session id is empty".into()));
    }
    Ok(())
}

pub(crate) fn require_message_text(text: &str) -> Result<(), RemoteError> {
    if text.trim().is_empty() {
        return Err(RemoteError::Precondition("message text is empty".into()));
    }
    Ok(())
}

pub(crate) fn require_valid_profile(profile: &IntakeProfile) -> Result<(), RemoteError> {
    profile
        .validate()
        .map_err(|e| RemoteError::Precondition(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(
            RemoteError::Precondition("x".into()).kind(),
            RemoteErrorKind::Precondition
        );
        assert_eq!(RemoteError::Timeout(30).kind(), RemoteErrorKind::Network);
        assert_eq!(
            RemoteError::Unreachable("http://h".into()).kind(),
            RemoteErrorKind::Network
        );
        assert_eq!(
            RemoteError::Service {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            RemoteErrorKind::Service
        );
        assert_eq!(
            RemoteError::ResponseParsing("bad".into()).kind(),
            RemoteErrorKind::Service
        );
    }

    #[test]
    fn precondition_is_not_retryable() {
        assert!(!RemoteError::Precondition("x".into()).is_retryable());
        assert!(RemoteError::Timeout(5).is_retryable());
    }

    #[test]
    fn blank_session_id_rejected() {
        let blank: SessionId = serde_json::from_str("\"\"").unwrap();
        assert!(matches!(
            require_session_id(&blank),
            Err(RemoteError::Precondition(_))
        ));
        assert!(require_session_id(&SessionId::parse("s").unwrap()).is_ok());
    }

    #[test]
    fn blank_message_rejected() {
        assert!(require_message_text(" \n ").is_err());
        assert!(require_message_text("ok").is_ok());
    }
}
