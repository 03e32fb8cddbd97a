use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::UrgencyTier;
use super::profile::IntakeProfile;
use super::session::SessionId;

/// Session summary as computed by the assessment service.
/// Read-only on this side: projected for display, never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub message_count: u32,
    pub max_urgency: UrgencyTier,
    pub symptoms_mentioned: Vec<String>,
    /// Exact number of user messages, when the service reports it.
    #[serde(default)]
    pub user_message_count: Option<u32>,
    /// Known conditions the service holds for the session, kept even when
    /// the rest of the profile is too incomplete for `profile_snapshot`.
    #[serde(default)]
    pub known_conditions: Vec<String>,
    pub profile_snapshot: Option<IntakeProfile>,
}

impl SessionSummary {
    /// Whole minutes between start and end, floored, never negative.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes().max(0)
    }
}
