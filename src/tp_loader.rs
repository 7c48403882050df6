//! Lifecycle hub
//!
//! [`TpLoader`] keeps one [`SubsystemLoader`] per subsystem token plus any
//! free-standing start/terminate hooks components register for themselves.
//! `start` and `terminate` run every hook concurrently and wait for all of
//! them. A failing hook is logged and does not affect the others.

use crate::component::ComponentMeta;
use crate::error::HookResult;
use crate::injector::Injector;
use crate::token::Token;
use crate::{DiError, Result};
use ahash::RandomState;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "logging")]
use tracing::{debug, error};

/// A subsystem that takes over components tagged with its token.
#[async_trait]
pub trait SubsystemLoader: Send + Sync + 'static {
    /// Bring the subsystem up.
    async fn on_start(&self) -> HookResult;

    /// Shut the subsystem down.
    async fn on_terminate(&self) -> HookResult;

    /// Take over a loaded component.
    fn on_load(&self, meta: &ComponentMeta, injector: &Injector) -> Result<()>;
}

/// Deferred lifecycle hook.
pub type Hook = Arc<dyn Fn() -> BoxFuture<'static, HookResult> + Send + Sync>;

#[derive(Default)]
struct Registry {
    loaders: HashMap<Token, Arc<dyn SubsystemLoader>, RandomState>,
    start_hooks: Vec<Hook>,
    terminate_hooks: Vec<Hook>,
}

/// Registry of subsystem loaders and lifecycle hooks.
#[derive(Default)]
pub struct TpLoader {
    registry: Mutex<Registry>,
}

impl TpLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `loader` for `token`.
    ///
    /// The first registration for a token wins; later ones are ignored.
    /// Returns whether `loader` was registered.
    pub fn register(&self, token: impl Into<Token>, loader: Arc<dyn SubsystemLoader>) -> bool {
        let token = token.into();
        let mut registry = self.lock();
        if registry.loaders.contains_key(&token) {
            return false;
        }

        #[cfg(feature = "logging")]
        debug!(target: "tarpit", token = %token, "Registering subsystem loader");

        let on_start = Arc::clone(&loader);
        registry.start_hooks.push(Arc::new(move || {
            let loader = Arc::clone(&on_start);
            async move { loader.on_start().await }.boxed()
        }));
        let on_terminate = Arc::clone(&loader);
        registry.terminate_hooks.push(Arc::new(move || {
            let loader = Arc::clone(&on_terminate);
            async move { loader.on_terminate().await }.boxed()
        }));
        registry.loaders.insert(token, loader);
        true
    }

    /// Whether a loader is registered for `token`.
    pub fn contains(&self, token: &Token) -> bool {
        self.lock().loaders.contains_key(token)
    }

    /// Number of registered subsystem loaders.
    pub fn len(&self) -> usize {
        self.lock().loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `hook` on every `start`.
    pub fn on_start<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.lock().start_hooks.push(Arc::new(move || hook().boxed()));
    }

    /// Run `hook` on every `terminate`.
    pub fn on_terminate<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.lock().terminate_hooks.push(Arc::new(move || hook().boxed()));
    }

    /// Hand `meta` to the loader registered for its token.
    pub fn load(&self, meta: &ComponentMeta, injector: &Injector) -> Result<()> {
        let loader = meta
            .token
            .as_ref()
            .and_then(|token| self.lock().loaders.get(token).cloned())
            .ok_or_else(|| DiError::LoaderNotFound {
                component: meta.display_name().to_string(),
            })?;
        loader.on_load(meta, injector)
    }

    /// Run every start hook concurrently and wait for all of them.
    pub async fn start(&self) {
        let hooks = self.lock().start_hooks.clone();
        run_all("start", hooks).await;
    }

    /// Run every terminate hook concurrently and wait for all of them.
    pub async fn terminate(&self) {
        let hooks = self.lock().terminate_hooks.clone();
        run_all("terminate", hooks).await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TpLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        f.debug_struct("TpLoader")
            .field("loaders", &registry.loaders.len())
            .field("start_hooks", &registry.start_hooks.len())
            .field("terminate_hooks", &registry.terminate_hooks.len())
            .finish()
    }
}

#[cfg_attr(not(feature = "logging"), allow(unused_variables))]
async fn run_all(phase: &'static str, hooks: Vec<Hook>) {
    // A panicking hook counts as a failed one.
    let runs = hooks
        .into_iter()
        .map(|hook| AssertUnwindSafe(async move { hook().await }).catch_unwind());
    for outcome in join_all(runs).await {
        let result = outcome.unwrap_or_else(|payload| Err(panic_reason(payload).into()));
        if let Err(err) = result {
            #[cfg(feature = "logging")]
            error!(target: "tarpit", phase, error = %err, "Lifecycle hook failed");
        }
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("hook panicked: {reason}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counting {
        starts: AtomicU32,
        terminates: AtomicU32,
        loads: AtomicU32,
        fail: bool,
        explode: bool,
    }

    #[async_trait]
    impl SubsystemLoader for Counting {
        async fn on_start(&self) -> HookResult {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.explode {
                panic!("start hook exploded");
            }
            if self.fail {
                return Err("boom".into());
            }
            Ok(())
        }

        async fn on_terminate(&self) -> HookResult {
            self.terminates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_load(&self, _meta: &ComponentMeta, _injector: &Injector) -> Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_first_registration_wins() {
        let loader = TpLoader::new();
        let first = Arc::new(Counting::default());
        let second = Arc::new(Counting::default());
        assert!(loader.register("http", first.clone()));
        assert!(!loader.register("http", second.clone()));

        loader.start().await;
        loader.terminate().await;
        assert_eq!(first.starts.load(Ordering::SeqCst), 1);
        assert_eq!(first.terminates.load(Ordering::SeqCst), 1);
        assert_eq!(second.starts.load(Ordering::SeqCst), 0);
        assert_eq!(second.terminates.load(Ordering::SeqCst), 0);
        assert_eq!(loader.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_hook_is_isolated() {
        let loader = TpLoader::new();
        let failing = Arc::new(Counting {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(Counting::default());
        loader.register("amqp", failing.clone());
        loader.register("http", healthy.clone());

        loader.start().await;
        assert_eq!(failing.starts.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_hook_is_isolated() {
        let loader = TpLoader::new();
        let exploding = Arc::new(Counting {
            explode: true,
            ..Default::default()
        });
        loader.register("amqp", exploding.clone());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        loader.on_start(move || {
            let counter = Arc::clone(&counter);
            async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        loader.start().await;
        assert_eq!(exploding.starts.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        loader.terminate().await;
        assert_eq!(exploding.terminates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_reason_message() {
        assert_eq!(panic_reason(Box::new("boom")), "hook panicked: boom");
        assert_eq!(panic_reason(Box::new(String::from("bang"))), "hook panicked: bang");
        assert_eq!(panic_reason(Box::new(7u8)), "hook panicked: unknown cause");
    }

    #[tokio::test]
    async fn test_free_hooks() {
        let loader = TpLoader::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        loader.on_terminate(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        loader.start().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        loader.terminate().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_dispatches_by_token() {
        let loader = TpLoader::new();
        let http = Arc::new(Counting::default());
        loader.register("http", http.clone());

        let injector = Injector::new();
        loader.load(&ComponentMeta::service().token("http"), &injector).unwrap();
        assert_eq!(http.loads.load(Ordering::SeqCst), 1);

        let err = loader
            .load(&ComponentMeta::service().token("grpc"), &injector)
            .unwrap_err();
        assert_eq!(err.to_string(), "Can't find loader for component \"undefined\"");
    }
}
