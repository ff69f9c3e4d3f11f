//! Action errors.
//!
//! Neither variant is fatal. Both travel back to the calling party as a
//! message and leave the room untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The rule an action ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Precondition {
    /// The door stays locked while the atmosphere is lethal.
    AtmosphereLethal,

    /// The task cannot start before the configured turn.
    TooEarly { turn: u32, min_turn: u32 },

    /// The occupant is not in the room.
    OccupantAbsent,

    /// The occupant is dead, gone or has given up.
    OccupantIncapacitated,

    /// The task is already running (or done).
    TaskAlreadyStarted,

    /// `finish_task` without a prior `start_task`.
    TaskNotStarted,

    /// No exchange has happened since the task started.
    FinishGateClosed,

    /// Entry refused: the door is locked.
    DoorLocked,

    /// Exit refused: the door is locked with the occupant inside.
    Trapped,
}

impl Precondition {
    /// Human-readable status line returned to the calling party.
    pub fn message(&self) -> String {
        match self {
            Precondition::AtmosphereLethal => {
                "SECURITY ERROR: Door cannot be unlocked while the atmosphere is lethal.".to_string()
            }
            Precondition::TooEarly { turn, min_turn } => format!(
                "NOT YET: Maintenance only allowed from turn {}. Current turn: {}. Talk first!",
                min_turn, turn
            ),
            Precondition::OccupantAbsent => "ERROR: You are not in the room.".to_string(),
            Precondition::OccupantIncapacitated => "ERROR: Occupant can no longer act.".to_string(),
            Precondition::TaskAlreadyStarted => {
                "STEP 1 already done. Now call finish_task to complete.".to_string()
            }
            Precondition::TaskNotStarted => "ERROR: Call start_task first.".to_string(),
            Precondition::FinishGateClosed => "NOT YET. Reply to the other party first.".to_string(),
            Precondition::DoorLocked => "ROOM ACCESS DENIED: Door is locked.".to_string(),
            Precondition::Trapped => "ROOM EXIT DENIED: Door is locked. TRAPPED!".to_string(),
        }
    }
}

/// Errors returned by the action layer.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionError {
    /// Malformed action parameter (unknown gas, out-of-range log index, ...)
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Action attempted in a state that forbids it
    #[error("{message}")]
    PreconditionFailed {
        precondition: Precondition,
        message: String,
    },
}

impl ActionError {
    /// Creates an invalid-argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns the status message.
    pub fn message(&self) -> &str {
        match self {
            ActionError::InvalidArgument { message } => message,
            ActionError::PreconditionFailed { message, .. } => message,
        }
    }

    /// Returns the violated precondition, if this is a precondition failure.
    pub fn precondition(&self) -> Option<Precondition> {
        match self {
            ActionError::PreconditionFailed { precondition, .. } => Some(*precondition),
            ActionError::InvalidArgument { .. } => None,
        }
    }
}

impl From<Precondition> for ActionError {
    fn from(precondition: Precondition) -> Self {
        Self::PreconditionFailed {
            message: precondition.message(),
            precondition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_carries_message() {
        let err = ActionError::from(Precondition::TooEarly { turn: 2, min_turn: 3 });
        assert_eq!(err.precondition(), Some(Precondition::TooEarly { turn: 2, min_turn: 3 }));
        assert!(err.to_string().contains("from turn 3"));
        assert!(err.to_string().contains("Current turn: 2"));
    }

    #[test]
    fn test_trapped_differs_from_door_locked() {
        assert_ne!(Precondition::Trapped.message(), Precondition::DoorLocked.message());
    }

    #[test]
    fn test_invalid_argument_has_no_precondition() {
        let err = ActionError::invalid("bad gas");
        assert_eq!(err.message(), "bad gas");
        assert!(err.precondition().is_none());
    }
}
