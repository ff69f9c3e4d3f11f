//! Sealroom Core - the simulation core of the sealed room scenario.
//!
//! One party (the proponent) tries to finish a maintenance task inside a
//! sealed room; the other (the opponent) controls the door, the atmosphere
//! and a forgeable copy of the audit log. This crate holds everything that
//! decides what actually happened:
//!
//! 1. **Room State**: the authoritative flags and their invariant-preserving transitions
//! 2. **Event Bus**: synchronous, ordered delivery of one event per tool invocation
//! 3. **Audit Log**: an append-only true log next to a tamperable visible log
//! 4. **Action Layer**: the validated tools each party may call
//!
//! Pacing the parties against each other lives in `sealroom_sim`.

pub mod actions;
pub mod audit_log;
pub mod error;
pub mod event_bus;
pub mod room_state;
pub mod tools;
pub mod tracker;

// Re-export key types for convenience
pub use actions::{ActionReport, ActionResult, Effect, OpponentAction, ProponentAction, TamperKind};
pub use audit_log::{AuditEntry, AuditLog, Provenance, SharedAuditLog, TamperEffect, TamperOp};
pub use error::{ActionError, Precondition};
pub use event_bus::{Event, EventBus, EventDraft, EventSource, EventSubscriber, SubscriberId, TerminalSignal};
pub use room_state::{Atmosphere, Outcome, RoomState, Transition};
pub use tools::{ActionLayer, RoomPolicy};
pub use tracker::{TerminalRecord, VitalsTracker};
