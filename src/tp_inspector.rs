//! Lifecycle timing
//!
//! [`TpInspector`] listens to the lifecycle events of its tree and records
//! when the platform started and terminated and how long each took. Values
//! that have not been observed yet read as `-1`.

use crate::component::Component;
use crate::events::{EventBus, EventKind, TpEvent};
use crate::factory::Args;
use crate::injector::Injector;
use crate::resolver::Dep;
use crate::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

struct InspectorState {
    started_at: AtomicI64,
    terminated_at: AtomicI64,
    start_time: watch::Sender<Option<f64>>,
    terminate_time: watch::Sender<Option<f64>>,
}

/// Records start/terminate timestamps and durations.
pub struct TpInspector {
    state: Arc<InspectorState>,
}

impl TpInspector {
    /// Subscribe to the lifecycle events of `events`.
    ///
    /// Only the shared state is captured by the listeners, never the
    /// injector, so the tree does not keep itself alive.
    pub fn attach(events: &EventBus) -> Self {
        let state = Arc::new(InspectorState {
            started_at: AtomicI64::new(-1),
            terminated_at: AtomicI64::new(-1),
            start_time: watch::Sender::new(None),
            terminate_time: watch::Sender::new(None),
        });

        let s = Arc::clone(&state);
        events.on(EventKind::Start, move |_| {
            s.started_at.store(now_millis(), Ordering::SeqCst);
        });
        let s = Arc::clone(&state);
        events.on(EventKind::StartTime, move |event| {
            if let TpEvent::StartTime(secs) = event {
                s.start_time.send_replace(Some(*secs));
            }
        });
        let s = Arc::clone(&state);
        events.on(EventKind::Terminate, move |_| {
            s.terminated_at.store(now_millis(), Ordering::SeqCst);
        });
        let s = Arc::clone(&state);
        events.on(EventKind::TerminateTime, move |event| {
            if let TpEvent::TerminateTime(secs) = event {
                s.terminate_time.send_replace(Some(*secs));
            }
        });

        Self { state }
    }

    /// Unix milliseconds of the start event, or -1.
    pub fn started_at(&self) -> i64 {
        self.state.started_at.load(Ordering::SeqCst)
    }

    /// Unix milliseconds of the terminate event, or -1.
    pub fn terminated_at(&self) -> i64 {
        self.state.terminated_at.load(Ordering::SeqCst)
    }

    /// Seconds start took, or -1.
    pub fn start_time(&self) -> f64 {
        self.state.start_time.borrow().unwrap_or(-1.0)
    }

    /// Seconds termination took, or -1.
    pub fn terminate_time(&self) -> f64 {
        self.state.terminate_time.borrow().unwrap_or(-1.0)
    }

    /// Wait until start has completed; returns its duration in seconds.
    pub async fn wait_start(&self) -> f64 {
        wait_for(&self.state.start_time).await
    }

    /// Wait until termination has completed; returns its duration in seconds.
    pub async fn wait_terminate(&self) -> f64 {
        wait_for(&self.state.terminate_time).await
    }
}

impl Component for TpInspector {
    fn dependencies() -> Vec<Dep> {
        vec![Dep::on::<Injector>()]
    }

    fn construct(args: &Args) -> Result<Self> {
        let injector = args.get::<Injector>(0)?;
        Ok(Self::attach(injector.events()))
    }
}

impl std::fmt::Debug for TpInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TpInspector")
            .field("started_at", &self.started_at())
            .field("start_time", &self.start_time())
            .field("terminated_at", &self.terminated_at())
            .field("terminate_time", &self.terminate_time())
            .finish()
    }
}

async fn wait_for(sender: &watch::Sender<Option<f64>>) -> f64 {
    let mut rx = sender.subscribe();
    let secs = rx.wait_for(Option::is_some).await.map(|value| (*value).unwrap_or(-1.0));
    secs.unwrap_or(-1.0)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(-1, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_negative() {
        let inspector = TpInspector::attach(&EventBus::new());
        assert_eq!(inspector.started_at(), -1);
        assert_eq!(inspector.terminated_at(), -1);
        assert_eq!(inspector.start_time(), -1.0);
        assert_eq!(inspector.terminate_time(), -1.0);
    }

    #[test]
    fn test_records_events() {
        let bus = EventBus::new();
        let inspector = TpInspector::attach(&bus);

        bus.emit(&TpEvent::Start);
        bus.emit(&TpEvent::StartTime(0.5));
        assert!(inspector.started_at() > 0);
        assert_eq!(inspector.start_time(), 0.5);

        bus.emit(&TpEvent::Terminate);
        bus.emit(&TpEvent::TerminateTime(0.25));
        assert!(inspector.terminated_at() >= inspector.started_at());
        assert_eq!(inspector.terminate_time(), 0.25);
    }

    #[tokio::test]
    async fn test_wait_start_resolves_after_event() {
        let bus = Arc::new(EventBus::new());
        let inspector = TpInspector::attach(&bus);

        let emitter = Arc::clone(&bus);
        let (secs, _) = tokio::join!(inspector.wait_start(), async move {
            tokio::task::yield_now().await;
            emitter.emit(&TpEvent::StartTime(1.5));
        });
        assert_eq!(secs, 1.5);
        // Already resolved waits return immediately.
        assert_eq!(inspector.wait_start().await, 1.5);
    }

    #[test]
    fn test_constructed_through_injector() {
        let injector = Injector::new();
        let def = crate::ProviderDef::component::<TpInspector>();
        crate::loader::def_to_provider(&def, &injector).unwrap();
        let inspector = injector.expose::<TpInspector>().unwrap().unwrap();

        injector.child().emit(&TpEvent::StartTime(2.0));
        assert_eq!(inspector.start_time(), 2.0);
    }
}
