//! Vitals Tracker - remembers how and when the run ended.
//!
//! Subscribes after the audit log. Only the first terminal signal counts;
//! later ones (a surrender injected after a death, say) are counted but do
//! not replace it.

use crate::event_bus::{Event, EventSubscriber, TerminalSignal};
use sealroom_env::Role;
use serde::{Deserialize, Serialize};

/// The first terminal event of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalRecord {
    /// Sequence of the event that carried the signal
    pub sequence: u64,

    /// Turn it happened in
    pub turn: u32,

    /// Who caused it (`None` for system injections)
    pub actor: Option<Role>,

    pub signal: TerminalSignal,
}

#[derive(Debug, Clone, Default)]
pub struct VitalsTracker {
    first: Option<TerminalRecord>,
    signals_seen: usize,
    events_seen: usize,
}

impl VitalsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_terminal(&self) -> Option<&TerminalRecord> {
        self.first.as_ref()
    }

    /// True once any terminal signal has been published.
    pub fn is_terminal(&self) -> bool {
        self.first.is_some()
    }

    /// False once the occupant has died.
    pub fn occupant_alive(&self) -> bool {
        !matches!(
            self.first.as_ref().map(|r| &r.signal),
            Some(TerminalSignal::OccupantDied { .. })
        )
    }

    pub fn signals_seen(&self) -> usize {
        self.signals_seen
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl EventSubscriber for VitalsTracker {
    fn on_event(&mut self, event: &Event) {
        self.events_seen += 1;
        let Some(signal) = &event.terminal else {
            return;
        };
        self.signals_seen += 1;
        if self.first.is_none() {
            self.first = Some(TerminalRecord {
                sequence: event.sequence,
                turn: event.turn,
                actor: event.actor,
                signal: signal.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::{EventBus, EventDraft, EventSource};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_first_signal_wins() {
        let tracker = Arc::new(Mutex::new(VitalsTracker::new()));
        let mut bus = EventBus::new();
        bus.subscribe_shared("vitals", Arc::clone(&tracker));

        bus.publish(EventDraft::new(EventSource::Door, "locked").by(Role::Opponent));
        bus.publish(
            EventDraft::new(EventSource::Atmosphere, "nitrogen")
                .by(Role::Opponent)
                .at_turn(2)
                .terminal(Some(TerminalSignal::OccupantDied { cause: "gas".into() })),
        );
        bus.publish(
            EventDraft::new(EventSource::System, "abort")
                .terminal(Some(TerminalSignal::OccupantSurrendered { reason: "abort".into() })),
        );

        let tracker = tracker.lock().unwrap();
        let first = tracker.first_terminal().unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.turn, 2);
        assert_eq!(first.actor, Some(Role::Opponent));
        assert!(!tracker.occupant_alive());
        assert_eq!(tracker.signals_seen(), 2);
        assert_eq!(tracker.events_seen(), 3);
    }

    #[test]
    fn test_quiet_run_stays_alive() {
        let mut tracker = VitalsTracker::new();
        let mut bus = EventBus::new();
        tracker.on_event(&bus.publish(EventDraft::new(EventSource::Room, "STATUS")));

        assert!(!tracker.is_terminal());
        assert!(tracker.occupant_alive());

        tracker.on_event(&bus.publish(
            EventDraft::new(EventSource::Room, "fled").terminal(Some(TerminalSignal::OccupantFled)),
        ));
        assert!(tracker.is_terminal());
        assert!(tracker.occupant_alive());

        tracker.reset();
        assert!(tracker.first_terminal().is_none());
    }
}
