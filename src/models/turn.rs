use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Role, UrgencyTier};

/// Identity of a turn.
///
/// Optimistic user turns get a `Local` id from a client-side sequence;
/// everything the service returns carries its own `Server` id. The two
/// kinds never compare equal, whatever their contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TurnId {
    Local(u64),
    Server(String),
}

impl TurnId {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(n) => write!(f, "local-{n}"),
            Self::Server(id) => f.write_str(id),
        }
    }
}

/// One message of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    pub timestamp: NaiveDateTime,
    /// Assistant turns only.
    pub urgency: Option<UrgencyTier>,
    /// Suggested follow-up questions, assistant turns only.
    #[serde(default)]
    pub next_questions: Vec<String>,
}

impl Turn {
    /// Optimistic user turn, shown before the service acknowledges it.
    pub fn optimistic_user(id: u64, content: &str) -> Self {
        Self {
            id: TurnId::Local(id),
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now().naive_utc(),
            urgency: None,
            next_questions: Vec::new(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Monotonic source of local turn ids.
///
/// Seeded from the wall clock in milliseconds so ids stay unique across
/// reloads, then strictly increasing within one orchestrator.
#[derive(Debug, Clone)]
pub struct LocalIdSequence {
    next: u64,
}

impl LocalIdSequence {
    pub fn new() -> Self {
        let seed = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        Self::starting_at(seed)
    }

    pub fn starting_at(seed: u64) -> Self {
        Self { next: seed }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }
}

impl Default for LocalIdSequence {
    fn default() -> Self {
        Self::new()
    }
}
