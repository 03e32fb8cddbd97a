use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::{SessionStatus, UrgencyTier};

/// Opaque session token issued by the assessment service. Never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a raw token. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Marker written when a session is closed, read by the results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub session_id: SessionId,
    pub completed_at: NaiveDateTime,
    pub turn_count: usize,
}

/// Remote view of one session's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub message_count: u32,
    pub current_urgency: UrgencyTier,
    pub status: SessionStatus,
}

impl SessionInfo {
    pub fn is_closed(&self) -> bool {
        self.end_time.is_some() || self.status != SessionStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_blank() {
        assert!(SessionId::parse("").is_none());
        assert!(SessionId::parse("  \t").is_none());
        assert_eq!(SessionId::parse(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn session_id_serializes_as_plain_string() {
        let id = SessionId::parse("0f6c-11").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"0f6c-11\"");
    }

    #[test]
    fn completion_record_json_shape() {
        let record = CompletionRecord {
            session_id: SessionId::parse("s-1").unwrap(),
            completed_at: chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            turn_count: 3,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["session_id"], "s-1");
        assert_eq!(json["turn_count"], 3);
        let back: CompletionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
