//! Engine event bus.
//!
//! A small set of enumerated channels, each with its own typed
//! subscriber list, dispatched in subscription order. A listener is a
//! plain `FnMut(&Event)`; it may mutate world state, but those
//! mutations only take effect at the next step's flattening, except
//! for `BeforeUpdate` listeners.

use crate::id::{BodyId, CompositeId, PairKey};

/// Payload delivered to a listener, mirroring `{name, source, timestamp, pairs?}`.
#[derive(Debug, Clone)]
pub enum Event {
    /// Fired once at the start of `Engine::step`, before anything else runs.
    BeforeUpdate {
        /// Engine timestamp in milliseconds after this step's delta is applied.
        timestamp: f64,
    },
    /// Fired once at the end of `Engine::step`.
    AfterUpdate {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
    },
    /// A pair transitioned from inactive/unknown to active this step.
    CollisionStart {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
        /// Pairs that started colliding this step.
        pairs: Vec<PairKey>,
    },
    /// A pair remained active (continued colliding) this step.
    CollisionActive {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
        /// Pairs still colliding this step.
        pairs: Vec<PairKey>,
    },
    /// A pair transitioned from active to inactive this step.
    CollisionEnd {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
        /// Pairs that stopped colliding this step.
        pairs: Vec<PairKey>,
    },
    /// A specific body fell asleep.
    SleepStart {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
        /// The body that fell asleep.
        body: BodyId,
    },
    /// A specific body woke up.
    SleepEnd {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
        /// The body that woke up.
        body: BodyId,
    },
    /// Fired on a composite just before a child is attached to it.
    BeforeAdd {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
        /// The composite being modified.
        composite: CompositeId,
    },
    /// Fired on a composite just after a child is attached to it.
    AfterAdd {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
        /// The composite that was modified.
        composite: CompositeId,
    },
    /// Fired on a composite just before a child is detached from it.
    BeforeRemove {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
        /// The composite being modified.
        composite: CompositeId,
    },
    /// Fired on a composite just after a child is detached from it.
    AfterRemove {
        /// Engine timestamp in milliseconds.
        timestamp: f64,
        /// The composite that was modified.
        composite: CompositeId,
    },
}

type Listener = Box<dyn FnMut(&Event) + Send>;

/// Per-channel listener lists, dispatched in subscription order.
#[derive(Default)]
pub struct EventBus {
    before_update: Vec<Listener>,
    after_update: Vec<Listener>,
    collision_start: Vec<Listener>,
    collision_active: Vec<Listener>,
    collision_end: Vec<Listener>,
    sleep_start: Vec<Listener>,
    sleep_end: Vec<Listener>,
    before_add: Vec<Listener>,
    after_add: Vec<Listener>,
    before_remove: Vec<Listener>,
    after_remove: Vec<Listener>,
}

/// Which channel a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// See [`Event::BeforeUpdate`].
    BeforeUpdate,
    /// See [`Event::AfterUpdate`].
    AfterUpdate,
    /// See [`Event::CollisionStart`].
    CollisionStart,
    /// See [`Event::CollisionActive`].
    CollisionActive,
    /// See [`Event::CollisionEnd`].
    CollisionEnd,
    /// See [`Event::SleepStart`].
    SleepStart,
    /// See [`Event::SleepEnd`].
    SleepEnd,
    /// See [`Event::BeforeAdd`].
    BeforeAdd,
    /// See [`Event::AfterAdd`].
    AfterAdd,
    /// See [`Event::BeforeRemove`].
    BeforeRemove,
    /// See [`Event::AfterRemove`].
    AfterRemove,
}

impl EventBus {
    /// Construct an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener to a channel. Listeners on the same channel
    /// fire in the order they were registered.
    pub fn on(&mut self, channel: Channel, listener: impl FnMut(&Event) + Send + 'static) {
        let boxed: Listener = Box::new(listener);
        match channel {
            Channel::BeforeUpdate => self.before_update.push(boxed),
            Channel::AfterUpdate => self.after_update.push(boxed),
            Channel::CollisionStart => self.collision_start.push(boxed),
            Channel::CollisionActive => self.collision_active.push(boxed),
            Channel::CollisionEnd => self.collision_end.push(boxed),
            Channel::SleepStart => self.sleep_start.push(boxed),
            Channel::SleepEnd => self.sleep_end.push(boxed),
            Channel::BeforeAdd => self.before_add.push(boxed),
            Channel::AfterAdd => self.after_add.push(boxed),
            Channel::BeforeRemove => self.before_remove.push(boxed),
            Channel::AfterRemove => self.after_remove.push(boxed),
        }
    }

    /// Deliver an event to every listener on its channel, in subscription order.
    pub fn emit(&mut self, event: Event) {
        let listeners = match &event {
            Event::BeforeUpdate { .. } => &mut self.before_update,
            Event::AfterUpdate { .. } => &mut self.after_update,
            Event::CollisionStart { .. } => &mut self.collision_start,
            Event::CollisionActive { .. } => &mut self.collision_active,
            Event::CollisionEnd { .. } => &mut self.collision_end,
            Event::SleepStart { .. } => &mut self.sleep_start,
            Event::SleepEnd { .. } => &mut self.sleep_end,
            Event::BeforeAdd { .. } => &mut self.before_add,
            Event::AfterAdd { .. } => &mut self.after_add,
            Event::BeforeRemove { .. } => &mut self.before_remove,
            Event::AfterRemove { .. } => &mut self.after_remove,
        };
        for listener in listeners.iter_mut() {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn listeners_fire_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let log_a = Arc::clone(&log);
        bus.on(Channel::AfterUpdate, move |_| log_a.lock().unwrap().push("a"));
        let log_b = Arc::clone(&log);
        bus.on(Channel::AfterUpdate, move |_| log_b.lock().unwrap().push("b"));

        bus.emit(Event::AfterUpdate { timestamp: 0.0 });

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn listeners_on_other_channels_are_not_invoked() {
        let called = Arc::new(Mutex::new(false));
        let mut bus = EventBus::new();

        let flag = Arc::clone(&called);
        bus.on(Channel::CollisionStart, move |_| *flag.lock().unwrap() = true);

        bus.emit(Event::AfterUpdate { timestamp: 0.0 });

        assert!(!*called.lock().unwrap());
    }
}
