//! What the orchestrator exposes to a presentation layer: a snapshot view
//! and a stream of change events.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::state::OrchestratorState;
use crate::models::{SessionId, Turn, TurnId, UrgencyTier};

/// Where the presentation layer should go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Home,
    /// No usable intake profile; collect one first.
    Intake,
    /// Session closed; show the results page.
    Summary,
}

/// Change notification emitted as the orchestrator works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    StateChanged { state: OrchestratorState },
    TurnAppended { turn: Turn },
    TurnRemoved { id: TurnId },
    Typing { active: bool },
    PendingInput { text: String },
    Notice { message: String },
    Navigate { to: Destination },
}

/// Receiver for `ChatEvent`s, e.g. a bridge to a UI event bus.
pub trait ChatEventSink {
    fn emit(&self, event: ChatEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ChatEventSink for NoopSink {
    fn emit(&self, _event: ChatEvent) {}
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ChatEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl ChatEventSink for RecordingSink {
    fn emit(&self, event: ChatEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Snapshot of everything a chat page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatView {
    pub state: OrchestratorState,
    pub session_id: Option<SessionId>,
    pub turns: Vec<Turn>,
    pub typing: bool,
    pub can_send: bool,
    pub can_finish: bool,
    /// Urgency of the most recent assistant turn.
    pub latest_urgency: Option<UrgencyTier>,
    /// Follow-up questions offered by the most recent assistant turn.
    pub suggestions: Vec<String>,
    pub pending_input: String,
    pub notice: Option<String>,
}
