//! Platform: the top-level entry point
//!
//! A [`Platform`] owns the root injector and the built-in services bound
//! in it ([`TpLoader`], [`TpInspector`], [`ConfigData`]). User code imports
//! components, then drives the two lifecycle phases:
//!
//! ```text
//! Created ──start()──▶ Starting ──▶ Started ──terminate()──▶ Terminating ──▶ Terminated
//! ```
//!
//! Both phases are idempotent. `terminate()` waits for start to complete,
//! so a terminate requested mid-start runs after it instead of racing it.

use crate::component::{Component, ComponentKind, ComponentRef};
use crate::config::ConfigData;
use crate::events::TpEvent;
use crate::factory::ProviderDef;
use crate::injector::Injector;
use crate::loader::{check_usage, def_to_provider, load_component};
use crate::provider::{Provider, ValueProvider};
use crate::token::Token;
use crate::tp_inspector::TpInspector;
use crate::tp_loader::TpLoader;
use crate::tp_logger::{BuiltinTpLogger, TpLogger, attach_logger};
use crate::{DiError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

#[cfg(feature = "logging")]
use tracing::{debug, info};

/// Lifecycle phase of a [`Platform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformState {
    Created,
    Starting,
    Started,
    Terminating,
    Terminated,
}

/// Application facade over the root injector.
///
/// # Examples
///
/// ```rust
/// use tarpit::{Args, Component, ConfigData, Platform, Result};
///
/// struct Greeter;
///
/// impl Component for Greeter {
///     fn construct(_: &Args) -> Result<Self> {
///         Ok(Greeter)
///     }
/// }
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let platform = Platform::new(ConfigData::default()).unwrap();
/// platform.import(tarpit::component::<Greeter>()).unwrap();
/// assert!(platform.expose::<Greeter>().unwrap().is_some());
///
/// platform.start().await;
/// platform.terminate().await;
/// # });
/// ```
pub struct Platform {
    root: Injector,
    loader: Arc<TpLoader>,
    inspector: Arc<TpInspector>,
    state: Mutex<PlatformState>,
    terminate_requested: AtomicBool,
}

impl Platform {
    /// Create a platform with the builtin logger.
    pub fn new(config: ConfigData) -> Result<Self> {
        Self::with_logger(config, Arc::new(BuiltinTpLogger))
    }

    /// Create a platform from a JSON config file (`tarpit.json` when `None`).
    pub fn from_file(path: Option<&Path>) -> Result<Self> {
        Self::new(ConfigData::load(path)?)
    }

    /// Create a platform reporting through `logger`.
    pub fn with_logger(config: ConfigData, logger: Arc<dyn TpLogger>) -> Result<Self> {
        let root = Injector::new();
        attach_logger(root.events(), logger);

        let loader = Arc::new(TpLoader::new());
        root.set(
            Token::of::<TpLoader>(),
            Provider::Value(ValueProvider::from_instance(
                Token::of::<TpLoader>(),
                Arc::clone(&loader) as _,
            )),
        );
        root.set(
            Token::of::<ConfigData>(),
            Provider::Value(ValueProvider::new(Token::of::<ConfigData>(), config)),
        );

        let inspector = load_component(&ComponentRef::of::<TpInspector>(), &root)?
            .provider
            .create(&[])?
            .downcast::<TpInspector>()
            .map_err(|_| DiError::creation_failed::<TpInspector>("unexpected instance type"))?;

        #[cfg(feature = "logging")]
        debug!(target: "tarpit", injector = %root.id(), "Created platform");

        Ok(Self {
            root,
            loader,
            inspector,
            state: Mutex::new(PlatformState::Created),
            terminate_requested: AtomicBool::new(false),
        })
    }

    /// The root injector.
    #[inline]
    pub fn injector(&self) -> &Injector {
        &self.root
    }

    #[inline]
    pub fn loader(&self) -> &Arc<TpLoader> {
        &self.loader
    }

    #[inline]
    pub fn inspector(&self) -> &Arc<TpInspector> {
        &self.inspector
    }

    pub fn state(&self) -> PlatformState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a component or provider definition at the root.
    ///
    /// Components are loaded with everything they import. Usage is only
    /// checked by [`Platform::bootstrap`], since a later import may still
    /// resolve what this one provides.
    pub fn import(&self, def: impl Into<ProviderDef>) -> Result<&Self> {
        def_to_provider(&def.into(), &self.root)?;
        Ok(self)
    }

    /// Load root component `C` into its own child injector.
    pub fn bootstrap<C: Component>(&self) -> Result<&Self> {
        self.bootstrap_ref(&ComponentRef::of::<C>())
    }

    /// Load a root component given by reference.
    pub fn bootstrap_ref(&self, component: &ComponentRef) -> Result<&Self> {
        if component.kind() != ComponentKind::Root {
            return Err(DiError::NotEntry {
                received: component.name().to_string(),
            });
        }
        let loaded = load_component(component, &self.root)?;
        if let Some(tree) = &loaded.tree {
            check_usage(&loaded.injector, tree, &[]);
        }
        Ok(self)
    }

    /// Create the value bound to type `T` at the root.
    pub fn expose<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        self.root.expose::<T>()
    }

    /// Create the value bound to `token` at the root.
    pub fn expose_token<T: Send + Sync + 'static>(&self, token: &Token) -> Result<Option<Arc<T>>> {
        self.root.expose_token::<T>(token)
    }

    /// Run every start hook. Later calls only log.
    pub async fn start(&self) -> &Self {
        if !self.transition(PlatformState::Created, PlatformState::Starting) {
            #[cfg(feature = "logging")]
            info!(target: "tarpit", "Tarpit server is started.");
            return self;
        }

        let begin = Instant::now();
        self.root.emit(&TpEvent::Start);
        self.loader.start().await;
        let secs = begin.elapsed().as_secs_f64();
        self.set_state(PlatformState::Started);
        self.root.emit(&TpEvent::StartTime(secs));
        self
    }

    /// Run every terminate hook once start has completed. Later calls only log.
    pub async fn terminate(&self) -> &Self {
        if self.terminate_requested.swap(true, Ordering::SeqCst) {
            #[cfg(feature = "logging")]
            info!(target: "tarpit", "Tarpit server is terminated.");
            return self;
        }

        self.inspector.wait_start().await;

        self.set_state(PlatformState::Terminating);
        let begin = Instant::now();
        self.root.emit(&TpEvent::Terminate);
        self.loader.terminate().await;
        let secs = begin.elapsed().as_secs_f64();
        self.set_state(PlatformState::Terminated);
        self.root.emit(&TpEvent::TerminateTime(secs));
        self
    }

    /// Render the injector hierarchy.
    pub fn provider_tree(&self) -> String {
        self.root.provider_tree()
    }

    fn transition(&self, from: PlatformState, to: PlatformState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    fn set_state(&self, to: PlatformState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("state", &self.state())
            .field("injector", &self.root)
            .finish()
    }
}
