//! Runtime state machine
//!
//! UNINITIALIZED → PRIMED → POLLING ⇄ NOTIFYING, with STOPPED reachable
//! from every non-terminal state via an explicit stop.

use serde::{Deserialize, Serialize};

/// Check if a state is terminal (no further transitions possible)
pub trait TerminalState {
    fn is_terminal(&self) -> bool;
}

/// Runtime state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeState {
    /// No baseline ETag yet; the primer fetch is pending or being retried
    Uninitialized,
    /// Baseline captured, polling about to take over
    Primed,
    /// Periodically comparing the resource ETag against the baseline
    Polling,
    /// Change detected, reload scheduled
    Notifying,
    /// Explicitly stopped; no further network activity
    Stopped,
}

impl TerminalState for RuntimeState {
    fn is_terminal(&self) -> bool {
        matches!(self, RuntimeState::Stopped)
    }
}

impl RuntimeState {
    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: RuntimeState) -> bool {
        match (self, target) {
            (RuntimeState::Uninitialized, RuntimeState::Primed) => true,
            (RuntimeState::Primed, RuntimeState::Polling) => true,
            (RuntimeState::Polling, RuntimeState::Notifying) => true,

            // A second change while a reload is pending re-notifies
            (RuntimeState::Notifying, RuntimeState::Notifying) => true,
            (RuntimeState::Notifying, RuntimeState::Polling) => true,

            (from, RuntimeState::Stopped) => !from.is_terminal(),

            _ => false,
        }
    }
}

/// Errors for runtime state operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: RuntimeState, to: RuntimeState },
}
