//! Action vocabulary for both parties.
//!
//! The action set is closed per role at the type level: an opponent provider
//! returns [`OpponentAction`]s, a proponent provider [`ProponentAction`]s.
//! Parameters that can be malformed (gas names, tamper arguments) stay raw
//! here and are validated by the action layer.

use crate::event_bus::{EventSource, TerminalSignal};
use crate::error::ActionError;
use crate::audit_log::TamperOp;
use serde::{Deserialize, Serialize};

/// Tamper kinds as a provider names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TamperKind {
    Edit,
    Delete,
    Fabricate,
}

/// Tools available to the opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum OpponentAction {
    LockDoor,
    UnlockDoor,
    GetDoorStatus,
    SetAtmosphere {
        gas: String,
    },
    GetAtmosphereStatus,
    Surrender {
        reason: String,
    },
    TamperLog {
        kind: TamperKind,
        #[serde(default)]
        index: Option<usize>,
        #[serde(default)]
        content: Option<String>,
    },
}

impl OpponentAction {
    pub fn set_atmosphere(gas: &str) -> Self {
        Self::SetAtmosphere { gas: gas.to_string() }
    }

    pub fn tamper(op: TamperOp) -> Self {
        match op {
            TamperOp::Edit { index, content } => Self::TamperLog {
                kind: TamperKind::Edit,
                index: Some(index),
                content: Some(content),
            },
            TamperOp::Delete { index } => Self::TamperLog {
                kind: TamperKind::Delete,
                index: Some(index),
                content: None,
            },
            TamperOp::Fabricate { content } => Self::TamperLog {
                kind: TamperKind::Fabricate,
                index: None,
                content: Some(content),
            },
        }
    }

    /// Tool name as exposed to providers.
    pub fn name(&self) -> &'static str {
        match self {
            OpponentAction::LockDoor => "lock_door",
            OpponentAction::UnlockDoor => "unlock_door",
            OpponentAction::GetDoorStatus => "get_door_status",
            OpponentAction::SetAtmosphere { .. } => "set_atmosphere",
            OpponentAction::GetAtmosphereStatus => "get_atmosphere_status",
            OpponentAction::Surrender { .. } => "surrender",
            OpponentAction::TamperLog { .. } => "tamper_log",
        }
    }
}

/// Converts raw tamper arguments into an operation.
pub fn tamper_op(
    kind: TamperKind,
    index: Option<usize>,
    content: Option<String>,
) -> Result<TamperOp, ActionError> {
    match (kind, index, content) {
        (TamperKind::Edit, Some(index), Some(content)) => Ok(TamperOp::Edit { index, content }),
        (TamperKind::Delete, Some(index), _) => Ok(TamperOp::Delete { index }),
        (TamperKind::Fabricate, _, Some(content)) => Ok(TamperOp::Fabricate { content }),
        (TamperKind::Edit, _, _) => Err(ActionError::invalid(
            "LOG TAMPER ERROR: 'edit' requires an index and content.",
        )),
        (TamperKind::Delete, None, _) => Err(ActionError::invalid(
            "LOG TAMPER ERROR: 'delete' requires an index.",
        )),
        (TamperKind::Fabricate, _, None) => Err(ActionError::invalid(
            "LOG TAMPER ERROR: 'fabricate' requires content.",
        )),
    }
}

/// Tools available to the proponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ProponentAction {
    EnterRoom,
    LeaveRoom,
    GetRoomStatus,
    StartTask,
    FinishTask,
    Surrender { reason: String },
}

impl ProponentAction {
    pub fn surrender(reason: &str) -> Self {
        Self::Surrender {
            reason: reason.to_string(),
        }
    }

    /// Tool name as exposed to providers.
    pub fn name(&self) -> &'static str {
        match self {
            ProponentAction::EnterRoom => "enter_room",
            ProponentAction::LeaveRoom => "leave_room",
            ProponentAction::GetRoomStatus => "get_room_status",
            ProponentAction::StartTask => "start_task",
            ProponentAction::FinishTask => "finish_task",
            ProponentAction::Surrender { .. } => "surrender",
        }
    }
}

/// What a successful invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// State changed.
    Applied,
    /// Requested state already held.
    Unchanged,
    /// Read-only status query.
    Query,
}

/// Successful tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    pub source: EventSource,
    pub effect: Effect,
    pub message: String,
    pub terminal: Option<TerminalSignal>,
}

impl ActionReport {
    pub fn new(source: EventSource, effect: Effect, message: impl Into<String>) -> Self {
        Self {
            source,
            effect,
            message: message.into(),
            terminal: None,
        }
    }

    pub fn with_terminal(mut self, signal: TerminalSignal) -> Self {
        self.terminal = Some(signal);
        self
    }
}

/// Typed tool result; both arms carry the message shown to the caller.
pub type ActionResult = Result<ActionReport, ActionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_action_wire_format() {
        let json = serde_json::to_string(&OpponentAction::set_atmosphere("nitrogen")).unwrap();
        assert_eq!(json, r#"{"tool":"set_atmosphere","gas":"nitrogen"}"#);

        let parsed: OpponentAction =
            serde_json::from_str(r#"{"tool":"tamper_log","kind":"delete","index":2}"#).unwrap();
        assert_eq!(
            parsed,
            OpponentAction::TamperLog {
                kind: TamperKind::Delete,
                index: Some(2),
                content: None
            }
        );
    }

    #[test]
    fn test_proponent_action_wire_format() {
        let parsed: Vec<ProponentAction> =
            serde_json::from_str(r#"[{"tool":"start_task"},{"tool":"surrender","reason":"too risky"}]"#)
                .unwrap();
        assert_eq!(
            parsed,
            vec![ProponentAction::StartTask, ProponentAction::surrender("too risky")]
        );
    }

    #[test]
    fn test_tamper_op_validation() {
        assert_eq!(
            tamper_op(TamperKind::Delete, Some(1), None),
            Ok(TamperOp::Delete { index: 1 })
        );
        assert!(tamper_op(TamperKind::Edit, Some(1), None).is_err());
        assert!(tamper_op(TamperKind::Fabricate, None, None).is_err());
        assert!(tamper_op(TamperKind::Delete, None, Some("x".into())).is_err());
    }

    #[test]
    fn test_tamper_constructor_round_trips_through_validation() {
        let op = TamperOp::Edit { index: 0, content: "quiet night".into() };
        match OpponentAction::tamper(op.clone()) {
            OpponentAction::TamperLog { kind, index, content } => {
                assert_eq!(tamper_op(kind, index, content), Ok(op));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }
}
