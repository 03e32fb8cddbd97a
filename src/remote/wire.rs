//! JSON shapes exchanged with the assessment service.
//!
//! Field names follow the service (several are Italian: `eta`, `genere`,
//! `sintomo_principale`, ...). Everything here is converted to domain
//! types at the boundary; nothing outside `remote` sees these structs.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use super::RemoteError;
use crate::models::{
    dedupe_preserving_order, AgeBracket, DurationBucket, Gender, IntakeProfile, Role,
    SessionId, SessionInfo, SessionStatus, SessionSummary, Turn, TurnId, UrgencyTier,
    DEFAULT_INTENSITY, MAX_INTENSITY, MIN_INTENSITY,
};

// ═══════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════

/// Body for `POST /chat/session`.
#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub user_profile_id: Option<&'a str>,
}

/// Body for `POST /chat/profile/{session_id}`.
#[derive(Debug, Serialize)]
pub struct ProfileRequest<'a> {
    pub eta: Option<&'static str>,
    pub genere: Option<&'static str>,
    pub sintomo_principale: &'a str,
    pub durata: Option<&'static str>,
    /// The service stores intensity as a one-element slider value list.
    pub intensita: [u8; 1],
    pub sintomi_associati: &'a [String],
    pub condizioni_note: &'a [String],
    pub familiarita: &'a str,
}

impl<'a> From<&'a IntakeProfile> for ProfileRequest<'a> {
    fn from(p: &'a IntakeProfile) -> Self {
        Self {
            eta: p.age_bracket.map(|a| a.as_str()),
            genere: p.gender.map(|g| g.as_str()),
            sintomo_principale: &p.primary_symptom,
            durata: p.duration.map(|d| d.as_str()),
            intensita: [p.intensity],
            sintomi_associati: &p.associated_symptoms,
            condizioni_note: &p.known_conditions,
            familiarita: &p.family_history,
        }
    }
}

/// Body for `POST /chat/message`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub session_id: &'a str,
    pub message: &'a str,
}

// ═══════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    #[serde(deserialize_with = "timestamp")]
    pub start_time: NaiveDateTime,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub end_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub current_urgency_level: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SessionResponse {
    pub fn session_id(&self) -> Result<SessionId, RemoteError> {
        SessionId::parse(&self.session_id)
            .ok_or_else(|| RemoteError::ResponseParsing("service returned an empty session id".into()))
    }

    pub fn into_info(self) -> Result<SessionInfo, RemoteError> {
        let session_id = self.session_id()?;
        let status = self
            .status
            .as_deref()
            .map(SessionStatus::from_str)
            .transpose()
            .map_err(|e| RemoteError::ResponseParsing(e.to_string()))?
            .unwrap_or(SessionStatus::Active);
        Ok(SessionInfo {
            session_id,
            start_time: self.start_time,
            end_time: self.end_time,
            message_count: self.message_count,
            current_urgency: UrgencyTier::from_wire(self.current_urgency_level.as_deref()),
            status,
        })
    }
}

/// One stored message as the service returns it.
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub message_type: String,
    pub content: String,
    #[serde(default)]
    pub urgency_level: Option<String>,
    #[serde(default)]
    pub next_questions: Option<Vec<String>>,
    #[serde(deserialize_with = "timestamp")]
    pub timestamp: NaiveDateTime,
}

impl MessageResponse {
    pub fn into_turn(self) -> Result<Turn, RemoteError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(RemoteError::ResponseParsing("message without id".into()));
        }
        let role = Role::from_str(&self.message_type)
            .map_err(|e| RemoteError::ResponseParsing(e.to_string()))?;
        let urgency = match role {
            Role::Assistant => Some(UrgencyTier::from_wire(self.urgency_level.as_deref())),
            Role::User => None,
        };
        Ok(Turn {
            id: TurnId::Server(id.to_string()),
            role,
            content: self.content,
            timestamp: self.timestamp,
            urgency,
            next_questions: self.next_questions.unwrap_or_default(),
        })
    }

    /// Convert, requiring the message to be an assistant turn.
    pub fn into_assistant_turn(self) -> Result<Turn, RemoteError> {
        let turn = self.into_turn()?;
        if !turn.is_assistant() {
            return Err(RemoteError::ResponseParsing(format!(
                "expected assistant turn, got {}",
                turn.role
            )));
        }
        Ok(turn)
    }
}

/// Response of `POST /chat/message`. The echoed user message is ignored.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub assistant_message: MessageResponse,
}

/// Profile as the service echoes it inside a summary.
#[derive(Debug, Default, Deserialize)]
pub struct WireProfile {
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default)]
    pub genere: Option<String>,
    #[serde(default)]
    pub sintomo_principale: Option<String>,
    #[serde(default)]
    pub durata: Option<String>,
    #[serde(default)]
    pub intensita: Option<Vec<i64>>,
    #[serde(default)]
    pub sintomi_associati: Option<Vec<String>>,
    #[serde(default)]
    pub condizioni_note: Option<Vec<String>>,
    #[serde(default)]
    pub familiarita: Option<String>,
}

impl WireProfile {
    /// Lenient conversion: unknown select values are dropped, a missing
    /// intensity takes the form default. Returns `None` without a primary
    /// symptom, since such a snapshot cannot describe a valid intake.
    pub fn into_profile(self) -> Option<IntakeProfile> {
        let primary = self.sintomo_principale?.trim().to_string();
        if primary.is_empty() {
            return None;
        }
        let intensity = self
            .intensita
            .and_then(|v| v.first().copied())
            .map(|v| v.clamp(i64::from(MIN_INTENSITY), i64::from(MAX_INTENSITY)))
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(DEFAULT_INTENSITY);

        Some(IntakeProfile {
            age_bracket: self.eta.as_deref().and_then(|s| AgeBracket::from_str(s).ok()),
            gender: self.genere.as_deref().and_then(|s| Gender::from_str(s).ok()),
            primary_symptom: primary,
            duration: self.durata.as_deref().and_then(|s| DurationBucket::from_str(s).ok()),
            intensity,
            associated_symptoms: dedupe_preserving_order(self.sintomi_associati.unwrap_or_default()),
            known_conditions: dedupe_preserving_order(self.condizioni_note.unwrap_or_default()),
            family_history: self.familiarita.unwrap_or_default(),
        })
    }
}

/// Response of `GET /chat/summary/{session_id}`.
#[derive(Debug, Deserialize)]
pub struct SummaryResponse {
    pub session_id: String,
    #[serde(deserialize_with = "timestamp")]
    pub start_time: NaiveDateTime,
    #[serde(deserialize_with = "timestamp")]
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub user_profile: Option<WireProfile>,
    #[serde(default)]
    pub symptoms_mentioned: Vec<String>,
    #[serde(default)]
    pub max_urgency_level: Option<String>,
    /// Number of user messages in the session.
    #[serde(default)]
    pub conversation_length: Option<u32>,
}

impl SummaryResponse {
    pub fn into_summary(self) -> Result<SessionSummary, RemoteError> {
        let session_id = SessionId::parse(&self.session_id)
            .ok_or_else(|| RemoteError::ResponseParsing("summary without session id".into()))?;
        let known_conditions = self
            .user_profile
            .as_ref()
            .and_then(|p| p.condizioni_note.clone())
            .map(dedupe_preserving_order)
            .unwrap_or_default();
        Ok(SessionSummary {
            session_id,
            start_time: self.start_time,
            end_time: self.end_time,
            message_count: self.message_count,
            max_urgency: UrgencyTier::from_wire(self.max_urgency_level.as_deref()),
            symptoms_mentioned: self.symptoms_mentioned,
            user_message_count: self.conversation_length,
            known_conditions,
            profile_snapshot: self.user_profile.and_then(WireProfile::into_profile),
        })
    }
}

/// Error body. FastAPI sends `{"detail": "..."}`, or a list of
/// validation problems for 422 responses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub detail: serde_json::Value,
}

/// Best human-readable message from an error body, falling back to the raw text.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorResponse { detail }) => detail.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

// ═══════════════════════════════════════════
// Timestamps
// ═══════════════════════════════════════════

/// The service emits naive UTC timestamps (`2026-03-01T10:00:00.123456`);
/// offset-qualified RFC 3339 values are accepted too and normalized to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
}

fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn optional_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}
