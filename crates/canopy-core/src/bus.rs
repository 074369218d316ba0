//! Typed publish/subscribe bus with bounded history.
//!
//! Handlers run synchronously inside [`EventBus::emit`]. The handler list is
//! snapshotted before delivery, so a handler may subscribe, unsubscribe or
//! emit without affecting the delivery already in progress.

use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt,
    rc::{Rc, Weak},
    time::Instant,
};

use canopy_proto::{EventPayload, EventRecord, event::WILDCARD};
use tracing::trace;

use crate::env::Environment;

/// Event handler.
pub type EventHandler = Rc<dyn Fn(&EventRecord)>;

struct Entry {
    id: u64,
    kind: String,
    handler: EventHandler,
}

struct BusInner {
    handlers: Vec<Entry>,
    history: VecDeque<EventRecord>,
    capacity: usize,
    next_id: u64,
}

/// Event bus. Clones share the same handlers and history.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
    env: Rc<dyn Environment>,
    epoch: Instant,
}

impl EventBus {
    /// Bus retaining at most `capacity` records. Zero disables retention.
    pub fn new(capacity: usize, env: Rc<dyn Environment>) -> Self {
        let epoch = env.now();
        let inner = BusInner {
            handlers: Vec::new(),
            history: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 0,
        };
        Self { inner: Rc::new(RefCell::new(inner)), env, epoch }
    }

    /// Subscribe to `kind`, or to every event with [`WILDCARD`].
    pub fn on(
        &self,
        kind: impl Into<String>,
        handler: impl Fn(&EventRecord) + 'static,
    ) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.handlers.push(Entry { id, kind: kind.into(), handler: Rc::new(handler) });
        Subscription { id, bus: Rc::downgrade(&self.inner) }
    }

    /// Record an event and deliver it. Exact subscribers run first, in
    /// subscription order, then wildcard subscribers. Events typed as the
    /// wildcard itself reach no wildcard subscriber.
    pub fn emit(&self, kind: &str, payload: EventPayload) -> EventRecord {
        let elapsed = self.env.now().saturating_duration_since(self.epoch);
        let timestamp = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let record = EventRecord { kind: kind.to_string(), payload, timestamp };

        let handlers: Vec<EventHandler> = {
            let mut inner = self.inner.borrow_mut();
            if inner.capacity > 0 {
                inner.history.push_back(record.clone());
                while inner.history.len() > inner.capacity {
                    inner.history.pop_front();
                }
            }

            let exact = inner
                .handlers
                .iter()
                .filter(|entry| entry.kind == kind && kind != WILDCARD)
                .map(|entry| Rc::clone(&entry.handler));
            let wildcard = inner
                .handlers
                .iter()
                .filter(|entry| entry.kind == WILDCARD && kind != WILDCARD)
                .map(|entry| Rc::clone(&entry.handler));
            exact.chain(wildcard).collect()
        };

        trace!(kind, subscribers = handlers.len(), "emit");
        for handler in handlers {
            handler(&record);
        }
        record
    }

    /// Retained records, oldest first.
    pub fn history(&self) -> Vec<EventRecord> {
        self.inner.borrow().history.iter().cloned().collect()
    }

    /// Remove every subscription and drop all retained records.
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.handlers.clear();
        inner.history.clear();
    }

    /// Retention capacity.
    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().handlers.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventBus")
            .field("subscribers", &inner.handlers.len())
            .field("history", &inner.history.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}

/// Handle returned by [`EventBus::on`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<RefCell<BusInner>>,
}

impl Subscription {
    /// Remove the handler. Calling this more than once has no effect.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.borrow_mut().handlers.retain(|entry| entry.id != self.id);
        }
    }
}
