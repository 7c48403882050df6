//! Diagnostic sink for lifecycle events

use crate::events::{EventBus, EventKind, ListenerId, TpEvent};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{info, warn};

/// Receives lifecycle reports.
pub trait TpLogger: Send + Sync + 'static {
    /// Start finished after `secs` seconds.
    fn after_start(&self, secs: f64);

    /// Termination finished after `secs` seconds.
    fn after_terminate(&self, secs: f64);

    /// A module subtree registered providers nobody used.
    fn unused_provider(&self, path: &[String]);
}

/// Default logger, writing through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTpLogger;

#[cfg_attr(not(feature = "logging"), allow(unused_variables))]
impl TpLogger for BuiltinTpLogger {
    fn after_start(&self, secs: f64) {
        #[cfg(feature = "logging")]
        info!(target: "tarpit", "Tarpit server started in {secs:.3}s");
    }

    fn after_terminate(&self, secs: f64) {
        #[cfg(feature = "logging")]
        info!(target: "tarpit", "Tarpit server terminated in {secs:.3}s");
    }

    fn unused_provider(&self, path: &[String]) {
        #[cfg(feature = "logging")]
        warn!(target: "tarpit", "{} not used.", path.join(" -> "));
    }
}

/// Route the lifecycle events of `events` to `logger`.
pub fn attach_logger(events: &EventBus, logger: Arc<dyn TpLogger>) -> [ListenerId; 3] {
    let l = Arc::clone(&logger);
    let started = events.on(EventKind::StartTime, move |event| {
        if let TpEvent::StartTime(secs) = event {
            l.after_start(*secs);
        }
    });
    let l = Arc::clone(&logger);
    let terminated = events.on(EventKind::TerminateTime, move |event| {
        if let TpEvent::TerminateTime(secs) = event {
            l.after_terminate(*secs);
        }
    });
    let unused = events.on(EventKind::UnusedProvider, move |event| {
        if let TpEvent::UnusedProvider(path) = event {
            logger.unused_provider(path);
        }
    });
    [started, terminated, unused]
}
