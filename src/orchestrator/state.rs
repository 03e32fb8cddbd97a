//! Session lifecycle as an explicit state machine.
//!
//! `transition` is pure: the orchestrator asks it for the next state
//! before doing any side effect, so an illegal request is refused
//! without touching the service or the mirror.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of turns (welcome included) before a session may be closed.
pub const MIN_TURNS_TO_FINISH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    Uninitialized,
    Initializing,
    Ready,
    Sending,
    Closing,
    Closed,
    Failed { reason: String },
}

impl OrchestratorState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Sending => "sending",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    InitRequested,
    InitSucceeded,
    InitFailed { reason: String },
    SendRequested,
    /// The in-flight message settled, successfully or not.
    SendSettled,
    FinishRequested { turn_count: usize },
    CloseSucceeded,
    CloseFailed,
    Reset,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitRequested => "init_requested",
            Self::InitSucceeded => "init_succeeded",
            Self::InitFailed { .. } => "init_failed",
            Self::SendRequested => "send_requested",
            Self::SendSettled => "send_settled",
            Self::FinishRequested { .. } => "finish_requested",
            Self::CloseSucceeded => "close_succeeded",
            Self::CloseFailed => "close_failed",
            Self::Reset => "reset",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{event} is not allowed while {state}")]
    NotAllowed {
        state: OrchestratorState,
        event: &'static str,
    },

    #[error("Session has {turn_count} turns, {required} required to finish")]
    TooFewTurns { turn_count: usize, required: usize },
}

/// Next state for `event` in `state`.
pub fn transition(
    state: &OrchestratorState,
    event: &SessionEvent,
) -> Result<OrchestratorState, TransitionError> {
    use OrchestratorState as S;
    use SessionEvent as E;

    match (state, event) {
        (S::Uninitialized | S::Failed { .. }, E::InitRequested) => Ok(S::Initializing),
        (S::Initializing, E::InitSucceeded) => Ok(S::Ready),
        (S::Initializing, E::InitFailed { reason }) => Ok(S::Failed {
            reason: reason.clone(),
        }),

        (S::Ready, E::SendRequested) => Ok(S::Sending),
        (S::Sending, E::SendSettled) => Ok(S::Ready),

        (S::Ready, E::FinishRequested { turn_count }) => {
            if *turn_count >= MIN_TURNS_TO_FINISH {
                Ok(S::Closing)
            } else {
                Err(TransitionError::TooFewTurns {
                    turn_count: *turn_count,
                    required: MIN_TURNS_TO_FINISH,
                })
            }
        }
        (S::Closing, E::CloseSucceeded) => Ok(S::Closed),
        (S::Closing, E::CloseFailed) => Ok(S::Ready),

        // Nothing is in flight outside Sending/Closing in a single-threaded caller.
        (S::Sending | S::Closing, E::Reset) => Err(TransitionError::NotAllowed {
            state: state.clone(),
            event: event.name(),
        }),
        (_, E::Reset) => Ok(S::Uninitialized),

        _ => Err(TransitionError::NotAllowed {
            state: state.clone(),
            event: event.name(),
        }),
    }
}
