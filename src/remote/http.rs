use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde::de::DeserializeOwned;

use super::wire::{
    self, ChatRequest, ChatResponse, CreateSessionRequest, MessageResponse, ProfileRequest,
    SessionResponse, SummaryResponse,
};
use super::{
    require_message_text, require_session_id, require_valid_profile, RemoteError, SessionApi,
    HISTORY_LIMIT,
};
use crate::config::ServiceConfig;
use crate::models::{IntakeProfile, SessionId, SessionInfo, SessionSummary, Turn};

/// Connection establishment is bounded separately from the full request.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP client for the assessment service.
pub struct HttpSessionClient {
    base_url: Url,
    client: Client,
    timeout_secs: u64,
}

impl HttpSessionClient {
    /// Create a client for the service at `config.base_url`.
    pub fn new(config: &ServiceConfig) -> Result<Self, RemoteError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            RemoteError::Precondition(format!("invalid service URL {}: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Precondition(format!(
                "service URL cannot carry paths: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS.min(config.timeout_secs)))
            .build()
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Client configured from `MEDAGENT_API_URL` / `MEDAGENT_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, RemoteError> {
        Self::new(&ServiceConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    // ── Internal ────────────────────────────────────────────

    /// Base URL with `segments` appended as individually escaped path segments.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn execute(&self, op: &'static str, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().map_err(|e| {
            tracing::debug!(op, error = %e, "Assessment service request failed");
            if e.is_timeout() {
                RemoteError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                RemoteError::Unreachable(self.base_url.to_string())
            } else {
                RemoteError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = wire::error_message(&body);
            tracing::debug!(op, status = status.as_u16(), %message, "Assessment service error");
            return Err(RemoteError::Service {
                status: status.as_u16(),
                message,
            });
        }
        tracing::debug!(op, status = status.as_u16(), "Assessment service ok");
        Ok(response)
    }

    fn execute_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        self.execute(op, request)?
            .json::<T>()
            .map_err(|e| RemoteError::ResponseParsing(format!("{op}: {e}")))
    }
}

impl SessionApi for HttpSessionClient {
    fn create_session(&self, profile_ref: Option<&str>) -> Result<SessionId, RemoteError> {
        let url = self.endpoint(&["chat", "session"]);
        let body = CreateSessionRequest {
            user_profile_id: profile_ref.filter(|r| !r.trim().is_empty()),
        };
        let response: SessionResponse =
            self.execute_json("create_session", self.client.post(url).json(&body))?;
        response.session_id()
    }

    fn attach_profile(
        &self,
        session_id: &SessionId,
        profile: &IntakeProfile,
    ) -> Result<(), RemoteError> {
        require_session_id(session_id)?;
        require_valid_profile(profile)?;
        let url = self.endpoint(&["chat", "profile", session_id.as_str()]);
        let body = ProfileRequest::from(profile);
        self.execute("attach_profile", self.client.post(url).json(&body))?;
        Ok(())
    }

    fn fetch_welcome(&self, session_id: &SessionId) -> Result<Turn, RemoteError> {
        require_session_id(session_id)?;
        let url = self.endpoint(&["chat", "welcome", session_id.as_str()]);
        let message: MessageResponse = self.execute_json("fetch_welcome", self.client.post(url))?;
        message.into_assistant_turn()
    }

    fn post_message(&self, session_id: &SessionId, text: &str) -> Result<Turn, RemoteError> {
        require_session_id(session_id)?;
        require_message_text(text)?;
        let url = self.endpoint(&["chat", "message"]);
        let body = ChatRequest {
            session_id: session_id.as_str(),
            message: text,
        };
        let response: ChatResponse =
            self.execute_json("post_message", self.client.post(url).json(&body))?;
        response.assistant_message.into_assistant_turn()
    }

    fn close_session(&self, session_id: &SessionId) -> Result<(), RemoteError> {
        require_session_id(session_id)?;
        let url = self.endpoint(&["chat", "close", session_id.as_str()]);
        self.execute("close_session", self.client.post(url))?;
        Ok(())
    }

    fn fetch_summary(&self, session_id: &SessionId) -> Result<SessionSummary, RemoteError> {
        require_session_id(session_id)?;
        let url = self.endpoint(&["chat", "summary", session_id.as_str()]);
        let summary: SummaryResponse = self.execute_json("fetch_summary", self.client.get(url))?;
        summary.into_summary()
    }

    fn fetch_history(&self, session_id: &SessionId) -> Result<Vec<Turn>, RemoteError> {
        require_session_id(session_id)?;
        let mut url = self.endpoint(&["chat", "history", session_id.as_str()]);
        url.query_pairs_mut()
            .append_pair("limit", &HISTORY_LIMIT.to_string());
        let messages: Vec<MessageResponse> =
            self.execute_json("fetch_history", self.client.get(url))?;
        messages.into_iter().map(MessageResponse::into_turn).collect()
    }

    fn fetch_session(&self, session_id: &SessionId) -> Result<SessionInfo, RemoteError> {
        require_session_id(session_id)?;
        let url = self.endpoint(&["chat", "session", session_id.as_str()]);
        let response: SessionResponse = self.execute_json("fetch_session", self.client.get(url))?;
        response.into_info()
    }

    fn health_check(&self) -> Result<(), RemoteError> {
        let url = self.endpoint(&["health"]);
        self.execute("health_check", self.client.get(url))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TurnId, UrgencyTier};

    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    /// Serve `app` on an ephemeral port and return its `/api` base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    /// Run blocking client calls off the async runtime.
    async fn with_client<T, F>(base: String, f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce(HttpSessionClient) -> T + Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let client = HttpSessionClient::new(&ServiceConfig::new(&base, 5)).unwrap();
            f(client)
        })
        .await
        .unwrap()
    }

    fn message_json(id: &str, role: &str, content: &str, urgency: Option<&str>) -> Value {
        json!({
            "id": id,
            "session_id": "s-1",
            "message_type": role,
            "content": content,
            "urgency_level": urgency,
            "next_questions": ["Did you measure it?"],
            "metadata": {},
            "timestamp": "2026-03-01T10:00:00.000001"
        })
    }

    fn session_json(id: &str) -> Value {
        json!({
            "id": "row",
            "session_id": id,
            "user_profile_id": null,
            "start_time": "2026-03-01T10:00:00",
            "end_time": null,
            "message_count": 0,
            "current_urgency_level": "low",
            "status": "active",
            "context_summary": null
        })
    }

    fn sid(raw: &str) -> SessionId {
        SessionId::parse(raw).unwrap()
    }

    #[test]
    fn invalid_base_url_rejected() {
        let err = HttpSessionClient::new(&ServiceConfig::new("not a url", 5))
            .err()
            .unwrap();
        assert!(matches!(err, RemoteError::Precondition(_)));
    }

    #[test]
    fn endpoint_appends_escaped_segments() {
        let client =
            HttpSessionClient::new(&ServiceConfig::new("http://localhost:8001/api/", 5)).unwrap();
        let url = client.endpoint(&["chat", "close", "a/b c"]);
        assert_eq!(url.as_str(), "http://localhost:8001/api/chat/close/a%2Fb%20c");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_session_returns_id() {
        let app = Router::new().route(
            "/api/chat/session",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["user_profile_id"], Value::Null);
                Json(session_json("s-new"))
            }),
        );
        let base = serve(app).await;
        let id = with_client(base, |c| c.create_session(None)).await.unwrap();
        assert_eq!(id.as_str(), "s-new");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_session_id_in_response_is_parsing_error() {
        let app = Router::new().route(
            "/api/chat/session",
            post(|| async { Json(session_json("")) }),
        );
        let base = serve(app).await;
        let err = with_client(base, |c| c.create_session(None)).await.unwrap_err();
        assert!(matches!(err, RemoteError::ResponseParsing(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn attach_profile_posts_service_shape() {
        let app = Router::new().route(
            "/api/chat/profile/:id",
            post(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                assert_eq!(id, "s-1");
                assert_eq!(body["sintomo_principale"], "fever");
                assert_eq!(body["intensita"], json!([6]));
                Json(json!({"id": "p-1", "session_id": id}))
            }),
        );
        let base = serve(app).await;
        let profile = IntakeProfile::new("fever", 6).unwrap();
        with_client(base, move |c| c.attach_profile(&sid("s-1"), &profile))
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn welcome_returns_assistant_turn() {
        let app = Router::new().route(
            "/api/chat/welcome/:id",
            post(|| async { Json(message_json("w-1", "assistant", "Welcome", Some("low"))) }),
        );
        let base = serve(app).await;
        let turn = with_client(base, |c| c.fetch_welcome(&sid("s-1"))).await.unwrap();
        assert_eq!(turn.id, TurnId::Server("w-1".into()));
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.urgency, Some(UrgencyTier::Low));
        assert_eq!(turn.next_questions.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn post_message_returns_only_assistant_turn() {
        let app = Router::new().route(
            "/api/chat/message",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["session_id"], "s-1");
                assert_eq!(body["message"], "38.5 this morning");
                Json(json!({
                    "session_id": "s-1",
                    "user_message": message_json("u-1", "user", "38.5 this morning", None),
                    "assistant_message": message_json("a-1", "assistant", "Any chills?", Some("medium")),
                    "session_status": "active"
                }))
            }),
        );
        let base = serve(app).await;
        let turn = with_client(base, |c| c.post_message(&sid("s-1"), "38.5 this morning"))
            .await
            .unwrap();
        assert_eq!(turn.id, TurnId::Server("a-1".into()));
        assert_eq!(turn.urgency, Some(UrgencyTier::Medium));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn service_error_carries_detail() {
        let app = Router::new().route(
            "/api/chat/close/:id",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"detail": "Sessione non trovata"})),
                )
            }),
        );
        let base = serve(app).await;
        let err = with_client(base, |c| c.close_session(&sid("missing")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RemoteError::Service {
                status: 404,
                message: "Sessione non trovata".into()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn history_sends_limit_and_keeps_order() {
        let app = Router::new().route(
            "/api/chat/history/:id",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("limit").map(String::as_str), Some("50"));
                Json(json!([
                    message_json("w-1", "assistant", "Welcome", Some("low")),
                    message_json("u-1", "user", "hi", None),
                    message_json("a-1", "assistant", "ok", Some("high")),
                ]))
            }),
        );
        let base = serve(app).await;
        let turns = with_client(base, |c| c.fetch_history(&sid("s-1"))).await.unwrap();
        let ids: Vec<String> = turns.iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids, vec!["w-1", "u-1", "a-1"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn summary_parses() {
        let app = Router::new().route(
            "/api/chat/summary/:id",
            get(|| async {
                Json(json!({
                    "session_id": "s-1",
                    "start_time": "2026-03-01T10:00:00",
                    "end_time": "2026-03-01T10:05:00",
                    "message_count": 3,
                    "user_profile": null,
                    "symptoms_mentioned": ["fever"],
                    "max_urgency_level": "high",
                    "conversation_length": 1,
                    "last_message_time": "2026-03-01T10:04:00"
                }))
            }),
        );
        let base = serve(app).await;
        let summary = with_client(base, |c| c.fetch_summary(&sid("s-1"))).await.unwrap();
        assert_eq!(summary.max_urgency, UrgencyTier::High);
        assert_eq!(summary.message_count, 3);
        assert!(summary.profile_snapshot.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_body_is_parsing_error() {
        let app = Router::new().route(
            "/api/chat/welcome/:id",
            post(|| async { "not json" }),
        );
        let base = serve(app).await;
        let err = with_client(base, |c| c.fetch_welcome(&sid("s-1"))).await.unwrap_err();
        assert!(matches!(err, RemoteError::ResponseParsing(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn health_check_ok() {
        let app = Router::new().route(
            "/api/health",
            get(|| async { Json(json!({"status": "healthy"})) }),
        );
        let base = serve(app).await;
        with_client(base, |c| c.health_check()).await.unwrap();
    }

    #[test]
    fn unreachable_service_is_network_error() {
        // Port 9 (discard) is closed on test hosts; connection is refused.
        let client =
            HttpSessionClient::new(&ServiceConfig::new("http://127.0.0.1:9/api", 2)).unwrap();
        let err = client.health_check().unwrap_err();
        assert_eq!(err.kind(), super::super::RemoteErrorKind::Network);
    }

    #[test]
    fn preconditions_fail_before_any_request() {
        // Unroutable base: any request would fail with a network error,
        // so a Precondition result proves nothing was sent.
        let client =
            HttpSessionClient::new(&ServiceConfig::new("http://127.0.0.1:9/api", 2)).unwrap();
        let blank: SessionId = serde_json::from_str("\"\"").unwrap();

        assert!(matches!(
            client.close_session(&blank),
            Err(RemoteError::Precondition(_))
        ));
        assert!(matches!(
            client.post_message(&sid("s-1"), "   "),
            Err(RemoteError::Precondition(_))
        ));
        let mut bad = IntakeProfile::new("x", 5).unwrap();
        bad.primary_symptom.clear();
        assert!(matches!(
            client.attach_profile(&sid("s-1"), &bad),
            Err(RemoteError::Precondition(_))
        ));
    }
}
