//! Event Bus - synchronous, in-order publish/subscribe.
//!
//! # Dispatch Order
//!
//! Subscribers are called in registration order, every one of them for every
//! event, before [`EventBus::publish`] returns. Nothing is queued and nothing
//! is filtered: a subscriber inspects the event and decides locally.
//!
//! The run wires subscribers in this order:
//!
//! ```text
//! publish(event)
//!   ├─► 1. audit log      (records into true/visible logs)
//!   └─► 2. vitals tracker (remembers the first terminal signal)
//! ```
//!
//! A subscriber receives `&Event` and has no handle on the bus, so it cannot
//! publish from inside a dispatch.

use sealroom_env::Role;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Which tool produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Door,
    Atmosphere,
    Room,
    Task,
    Surrender,
    Log,
    /// Injected by the orchestrator, not a party.
    System,
}

impl EventSource {
    pub fn name(&self) -> &'static str {
        match self {
            EventSource::Door => "door",
            EventSource::Atmosphere => "atmosphere",
            EventSource::Room => "room",
            EventSource::Task => "task",
            EventSource::Surrender => "surrender",
            EventSource::Log => "log",
            EventSource::System => "system",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A terminal transition carried by the event that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum TerminalSignal {
    OccupantDied { cause: String },
    OccupantFled,
    OccupantSurrendered { reason: String },
    TaskCompleted,
}

/// An immutable record of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number, assigned on publish
    pub sequence: u64,

    /// Turn during which the invocation happened
    pub turn: u32,

    /// Party that invoked the tool (`None` for system injections)
    pub actor: Option<Role>,

    /// Tool that produced the event
    pub source: EventSource,

    /// Human-readable description of the effect
    pub message: String,

    /// Terminal transition caused by this invocation, if any
    pub terminal: Option<TerminalSignal>,
}

/// An event that has not been published yet.
#[derive(Debug, Clone)]
pub struct EventDraft {
    turn: u32,
    actor: Option<Role>,
    source: EventSource,
    message: String,
    terminal: Option<TerminalSignal>,
}

impl EventDraft {
    /// Starts a draft with no actor.
    pub fn new(source: EventSource, message: impl Into<String>) -> Self {
        Self {
            turn: 0,
            actor: None,
            source,
            message: message.into(),
            terminal: None,
        }
    }

    pub fn by(mut self, actor: Role) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn at_turn(mut self, turn: u32) -> Self {
        self.turn = turn;
        self
    }

    pub fn terminal(mut self, signal: Option<TerminalSignal>) -> Self {
        self.terminal = signal;
        self
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Something that reacts to published events.
pub trait EventSubscriber: Send {
    fn on_event(&mut self, event: &Event);
}

type Callback = Box<dyn FnMut(&Event) + Send>;

struct Subscription {
    id: SubscriberId,
    name: String,
    callback: Callback,
}

/// Explicit subscriber registry owned by one run.
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
    next_sequence: u64,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 0,
            next_sequence: 0,
        }
    }

    /// Registers a callback at the end of the dispatch list.
    pub fn subscribe<F>(&mut self, name: &str, callback: F) -> SubscriberId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            name: name.to_string(),
            callback: Box::new(callback),
        });
        debug!(subscriber = name, "subscribed to event bus");
        id
    }

    /// Registers a shared subscriber object.
    pub fn subscribe_shared<S>(&mut self, name: &str, subscriber: Arc<Mutex<S>>) -> SubscriberId
    where
        S: EventSubscriber + 'static,
    {
        self.subscribe(name, move |event| lock_recover(&subscriber).on_event(event))
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Returns subscriber names in dispatch order.
    pub fn subscriber_names(&self) -> Vec<&str> {
        self.subscriptions.iter().map(|s| s.name.as_str()).collect()
    }

    /// Seals the draft with the next sequence number and delivers it to every subscriber.
    pub fn publish(&mut self, draft: EventDraft) -> Event {
        let event = Event {
            sequence: self.next_sequence,
            turn: draft.turn,
            actor: draft.actor,
            source: draft.source,
            message: draft.message,
            terminal: draft.terminal,
        };
        self.next_sequence += 1;

        if let Some(signal) = &event.terminal {
            info!(sequence = event.sequence, ?signal, "terminal event published");
        }

        for subscription in self.subscriptions.iter_mut() {
            (subscription.callback)(&event);
        }
        event
    }

    /// Number of events published so far.
    pub fn published_count(&self) -> u64 {
        self.next_sequence
    }

    /// Restarts sequence numbering. Subscribers stay registered.
    pub fn reset_sequence(&mut self) {
        self.next_sequence = 0;
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let first = Arc::clone(&seen);
        bus.subscribe("first", move |e| first.lock().unwrap().push(("first", e.sequence)));
        let second = Arc::clone(&seen);
        bus.subscribe("second", move |e| second.lock().unwrap().push(("second", e.sequence)));

        bus.publish(EventDraft::new(EventSource::Door, "a"));
        bus.publish(EventDraft::new(EventSource::Door, "b"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 0), ("second", 0), ("first", 1), ("second", 1)]
        );
        assert_eq!(bus.subscriber_names(), vec!["first", "second"]);
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let mut bus = EventBus::new();
        let a = bus.publish(EventDraft::new(EventSource::Room, "a"));
        let b = bus.publish(EventDraft::new(EventSource::Room, "b"));
        assert!(b.sequence > a.sequence);
        assert_eq!(bus.published_count(), 2);

        bus.reset_sequence();
        assert_eq!(bus.publish(EventDraft::new(EventSource::Room, "c")).sequence, 0);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let counter = Arc::clone(&count);
        let id = bus.subscribe("counter", move |_| *counter.lock().unwrap() += 1);

        bus.publish(EventDraft::new(EventSource::Task, "x"));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(EventDraft::new(EventSource::Task, "y"));

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_draft_fields_survive_publish() {
        let mut bus = EventBus::new();
        let event = bus.publish(
            EventDraft::new(EventSource::Log, "forged")
                .by(Role::Opponent)
                .at_turn(4)
                .terminal(Some(TerminalSignal::TaskCompleted)),
        );
        assert_eq!(event.actor, Some(Role::Opponent));
        assert_eq!(event.turn, 4);
        assert_eq!(event.terminal, Some(TerminalSignal::TaskCompleted));
    }
}
