//! Local state mirror: durable key/value copies of intake and session state.
//!
//! Two layers:
//! - `MirrorStore`: raw string blobs by key (SQLite or in-memory)
//! - `LocalStateMirror`: typed facade that knows the fixed keys and
//!   JSON-encodes the values
//!
//! The mirror holds no policy. The orchestrator decides what is written
//! and when; intake submission writes the profile.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryMirrorStore;
pub use sqlite::SqliteMirrorStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::models::{CompletionRecord, IntakeProfile, SessionId, Turn};

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Stored value for {key} is not valid: {reason}")]
    Decode { key: &'static str, reason: String },

    #[error("Value for {key} could not be encoded: {reason}")]
    Encode { key: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal lock error")]
    LockPoisoned,
}

// ═══════════════════════════════════════════
// Keys
// ═══════════════════════════════════════════

/// The fixed names the mirror stores values under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorKey {
    IntakeProfile,
    ActiveSessionId,
    CompletionRecord,
    /// Legacy write-only copy of the full turn list.
    MessageLog,
}

impl MirrorKey {
    pub const ALL: [MirrorKey; 4] = [
        MirrorKey::IntakeProfile,
        MirrorKey::ActiveSessionId,
        MirrorKey::CompletionRecord,
        MirrorKey::MessageLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntakeProfile => "intake-profile",
            Self::ActiveSessionId => "active-session-id",
            Self::CompletionRecord => "session-completion-record",
            Self::MessageLog => "full-message-log",
        }
    }
}

// ═══════════════════════════════════════════
// Raw store
// ═══════════════════════════════════════════

/// Named-blob persistence. Implementations hold no policy.
pub trait MirrorStore {
    fn read(&self, key: &str) -> Result<Option<String>, MirrorError>;
    fn write(&self, key: &str, value: &str) -> Result<(), MirrorError>;
    fn remove(&self, key: &str) -> Result<(), MirrorError>;
}

// ═══════════════════════════════════════════
// Typed facade
// ═══════════════════════════════════════════

/// Typed access to the mirror's fixed keys.
pub struct LocalStateMirror<S: MirrorStore> {
    store: S,
}

impl<S: MirrorStore> LocalStateMirror<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Intake profile ──────────────────────────────────

    pub fn load_profile(&self) -> Result<Option<IntakeProfile>, MirrorError> {
        self.read_json(MirrorKey::IntakeProfile)
    }

    pub fn store_profile(&self, profile: &IntakeProfile) -> Result<(), MirrorError> {
        self.write_json(MirrorKey::IntakeProfile, profile)
    }

    // ── Active session ──────────────────────────────────

    pub fn active_session_id(&self) -> Result<Option<SessionId>, MirrorError> {
        let raw = self.store.read(MirrorKey::ActiveSessionId.as_str())?;
        Ok(raw.as_deref().and_then(SessionId::parse))
    }

    pub fn set_active_session_id(&self, id: &SessionId) -> Result<(), MirrorError> {
        tracing::debug!(session_id = %id, "Mirror: active session recorded");
        self.store.write(MirrorKey::ActiveSessionId.as_str(), id.as_str())
    }

    pub fn clear_active_session_id(&self) -> Result<(), MirrorError> {
        self.store.remove(MirrorKey::ActiveSessionId.as_str())
    }

    // ── Completion record ───────────────────────────────

    pub fn load_completion(&self) -> Result<Option<CompletionRecord>, MirrorError> {
        self.read_json(MirrorKey::CompletionRecord)
    }

    pub fn store_completion(&self, record: &CompletionRecord) -> Result<(), MirrorError> {
        self.write_json(MirrorKey::CompletionRecord, record)
    }

    pub fn clear_completion(&self) -> Result<(), MirrorError> {
        self.store.remove(MirrorKey::CompletionRecord.as_str())
    }

    // ── Legacy message log ──────────────────────────────

    /// Write-only fallback copy of the turn list.
    pub fn store_message_log(&self, turns: &[Turn]) -> Result<(), MirrorError> {
        self.write_json(MirrorKey::MessageLog, turns)
    }

    // ── Reset ───────────────────────────────────────────

    /// Remove every key this mirror owns.
    pub fn clear_all(&self) -> Result<(), MirrorError> {
        for key in MirrorKey::ALL {
            self.store.remove(key.as_str())?;
        }
        tracing::debug!("Mirror: all keys cleared");
        Ok(())
    }

    // ── Internal ────────────────────────────────────────

    fn read_json<T: DeserializeOwned>(&self, key: MirrorKey) -> Result<Option<T>, MirrorError> {
        match self.store.read(key.as_str())? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| MirrorError::Decode {
                    key: key.as_str(),
                    reason: e.to_string(),
                }),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: MirrorKey, value: &T) -> Result<(), MirrorError> {
        let raw = serde_json::to_string(value).map_err(|e| MirrorError::Encode {
            key: key.as_str(),
            reason: e.to_string(),
        })?;
        tracing::debug!(key = key.as_str(), bytes = raw.len(), "Mirror write");
        self.store.write(key.as_str(), &raw)
    }
}
