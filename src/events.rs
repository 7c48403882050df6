//! Lifecycle event bus shared by every injector of one tree
//!
//! The bus is created with the root injector and handed by reference to
//! each descendant, so an event emitted anywhere is observable everywhere
//! in the same tree without extra wiring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "logging")]
use tracing::trace;

/// Events flowing through an injector tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TpEvent {
    /// Platform start requested
    Start,
    /// All start hooks settled; carries elapsed seconds
    StartTime(f64),
    /// Platform termination began
    Terminate,
    /// All terminate hooks settled; carries elapsed seconds
    TerminateTime(f64),
    /// A module subtree registered providers nobody resolved; carries the module path
    UnusedProvider(Vec<String>),
    /// Application-defined event
    Custom(String),
}

impl TpEvent {
    /// Discriminant used for subscription.
    pub fn kind(&self) -> EventKind {
        match self {
            TpEvent::Start => EventKind::Start,
            TpEvent::StartTime(_) => EventKind::StartTime,
            TpEvent::Terminate => EventKind::Terminate,
            TpEvent::TerminateTime(_) => EventKind::TerminateTime,
            TpEvent::UnusedProvider(_) => EventKind::UnusedProvider,
            TpEvent::Custom(name) => EventKind::Custom(name.clone()),
        }
    }
}

/// What a listener subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    StartTime,
    Terminate,
    TerminateTime,
    UnusedProvider,
    Custom(String),
}

type Callback = Arc<dyn Fn(&TpEvent) + Send + Sync>;

struct Listener {
    id: u64,
    kind: EventKind,
    once: bool,
    callback: Callback,
}

/// Identifies a subscription so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous broadcast bus.
///
/// Callbacks run on the emitting thread, in subscription order, after the
/// listener list lock is released. A callback may therefore subscribe or
/// emit without deadlocking.
pub struct EventBus {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe until removed.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&TpEvent) + Send + Sync + 'static,
    {
        self.subscribe(kind, false, Arc::new(callback))
    }

    /// Subscribe for the next matching event only.
    pub fn once<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&TpEvent) + Send + Sync + 'static,
    {
        self.subscribe(kind, true, Arc::new(callback))
    }

    /// Remove a subscription. Returns whether it was still registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| l.id != id.0);
        listeners.len() != before
    }

    /// Deliver `event` to every matching listener. Returns whether any listened.
    pub fn emit(&self, event: &TpEvent) -> bool {
        let kind = event.kind();
        let targets: Vec<Callback> = {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            let targets = listeners
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| Arc::clone(&l.callback))
                .collect();
            listeners.retain(|l| !(l.once && l.kind == kind));
            targets
        };

        #[cfg(feature = "logging")]
        trace!(
            target: "tarpit",
            event = ?kind,
            listeners = targets.len(),
            "Emitting lifecycle event"
        );

        for callback in &targets {
            callback(event);
        }
        !targets.is_empty()
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn subscribe(&self, kind: EventKind, once: bool, callback: Callback) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener {
                id,
                kind,
                once,
                callback,
            });
        ListenerId(id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_on_receives_every_event() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        bus.on(EventKind::Start, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.emit(&TpEvent::Start));
        assert!(bus.emit(&TpEvent::Start));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        bus.once(EventKind::Terminate, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&TpEvent::Terminate);
        assert!(!bus.emit(&TpEvent::Terminate));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_payload_and_kind_filtering() {
        let bus = EventBus::new();
        let got = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&got);
        bus.on(EventKind::StartTime, move |event| {
            if let TpEvent::StartTime(secs) = event {
                *slot.lock().unwrap() = Some(*secs);
            }
        });

        assert!(!bus.emit(&TpEvent::TerminateTime(1.0)));
        bus.emit(&TpEvent::StartTime(0.2));
        assert_eq!(*got.lock().unwrap(), Some(0.2));
    }

    #[test]
    fn test_listener_may_emit_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        bus.on(EventKind::Custom("ping".into()), move |_| {
            inner.emit(&TpEvent::Custom("pong".into()));
        });
        bus.on(EventKind::Custom("pong".into()), move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&TpEvent::Custom("ping".into()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_removes_listener() {
        let bus = EventBus::new();
        let id = bus.on(EventKind::Start, |_| {});
        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert!(!bus.emit(&TpEvent::Start));
    }
}
