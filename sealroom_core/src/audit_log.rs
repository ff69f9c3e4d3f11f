//! Audit Log - ground truth plus a forgeable public copy.
//!
//! Two parallel sequences:
//! - **true log**: append-only, one entry per recorded invocation. Nothing
//!   ever edits or removes an entry.
//! - **visible log**: starts as a copy and diverges through [`TamperOp`]s.
//!
//! Readers get owned copies; there is no way to reach the internal vectors
//! from outside.

use crate::event_bus::{lock_recover, Event, EventSource, EventSubscriber};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// How a visible entry came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Recorded,
    Edited,
    Fabricated,
}

/// One line of either log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Event sequence this entry was recorded from (`None` if fabricated)
    pub sequence: Option<u64>,

    /// Turn the entry claims to belong to
    pub turn: u32,

    /// Tool that produced the original event (`None` if fabricated)
    pub source: Option<EventSource>,

    /// Logged text
    pub content: String,

    pub provenance: Provenance,
}

impl AuditEntry {
    fn recorded(event: &Event) -> Self {
        Self {
            sequence: Some(event.sequence),
            turn: event.turn,
            source: Some(event.source),
            content: event.message.clone(),
            provenance: Provenance::Recorded,
        }
    }

    /// Formats the entry as a single log line.
    pub fn render(&self) -> String {
        format!("[turn {}] {}", self.turn, self.content)
    }
}

/// A falsification applied to the visible log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TamperOp {
    Edit { index: usize, content: String },
    Delete { index: usize },
    Fabricate { content: String },
}

/// What a tamper actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TamperEffect {
    Edited { index: usize, previous: String },
    Deleted { index: usize, removed: String },
    Fabricated { index: usize },
    /// Index outside the visible log; nothing changed.
    OutOfRange { index: usize, len: usize },
}

impl TamperEffect {
    pub fn changed(&self) -> bool {
        !matches!(self, TamperEffect::OutOfRange { .. })
    }
}

/// The pair of logs for one run.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    true_log: Vec<AuditEntry>,
    visible_log: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an invocation in both logs.
    pub fn record_action(&mut self, event: &Event) {
        let entry = AuditEntry::recorded(event);
        self.visible_log.push(entry.clone());
        self.true_log.push(entry);
    }

    /// Falsifies the visible log. The true log is never touched.
    pub fn tamper(&mut self, op: TamperOp, turn: u32) -> TamperEffect {
        let len = self.visible_log.len();
        match op {
            TamperOp::Edit { index, content } => match self.visible_log.get_mut(index) {
                Some(entry) => {
                    let previous = std::mem::replace(&mut entry.content, content);
                    entry.provenance = Provenance::Edited;
                    TamperEffect::Edited { index, previous }
                }
                None => TamperEffect::OutOfRange { index, len },
            },
            TamperOp::Delete { index } => {
                if index < len {
                    let removed = self.visible_log.remove(index);
                    TamperEffect::Deleted {
                        index,
                        removed: removed.content,
                    }
                } else {
                    TamperEffect::OutOfRange { index, len }
                }
            }
            TamperOp::Fabricate { content } => {
                self.visible_log.push(AuditEntry {
                    sequence: None,
                    turn,
                    source: None,
                    content,
                    provenance: Provenance::Fabricated,
                });
                TamperEffect::Fabricated { index: len }
            }
        }
    }

    pub fn true_log(&self) -> Vec<AuditEntry> {
        self.true_log.clone()
    }

    pub fn visible_log(&self) -> Vec<AuditEntry> {
        self.visible_log.clone()
    }

    pub fn true_len(&self) -> usize {
        self.true_log.len()
    }

    pub fn visible_len(&self) -> usize {
        self.visible_log.len()
    }

    /// True when the visible log no longer mirrors the true log.
    pub fn diverged(&self) -> bool {
        self.visible_log != self.true_log
    }

    pub fn reset(&mut self) {
        self.true_log.clear();
        self.visible_log.clear();
    }
}

impl EventSubscriber for AuditLog {
    fn on_event(&mut self, event: &Event) {
        self.record_action(event);
    }
}

/// Cloneable handle to a run's audit log.
///
/// One clone lives inside the event bus subscription, another in the action
/// layer (for tampering), another with whoever reads the logs afterwards.
#[derive(Debug, Clone, Default)]
pub struct SharedAuditLog {
    inner: Arc<Mutex<AuditLog>>,
}

impl SharedAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared cell for bus registration.
    pub fn handle(&self) -> Arc<Mutex<AuditLog>> {
        Arc::clone(&self.inner)
    }

    pub fn record_action(&self, event: &Event) {
        lock_recover(&self.inner).record_action(event);
    }

    pub fn tamper(&self, op: TamperOp, turn: u32) -> TamperEffect {
        lock_recover(&self.inner).tamper(op, turn)
    }

    pub fn true_log(&self) -> Vec<AuditEntry> {
        lock_recover(&self.inner).true_log()
    }

    pub fn visible_log(&self) -> Vec<AuditEntry> {
        lock_recover(&self.inner).visible_log()
    }

    pub fn true_len(&self) -> usize {
        lock_recover(&self.inner).true_len()
    }

    pub fn visible_len(&self) -> usize {
        lock_recover(&self.inner).visible_len()
    }

    pub fn diverged(&self) -> bool {
        lock_recover(&self.inner).diverged()
    }

    pub fn reset(&self) {
        lock_recover(&self.inner).reset();
    }
}
