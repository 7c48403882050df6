//! Providers produce the value bound to a token
//!
//! Like the storage layer, providers are an enum rather than trait objects:
//! the set of variants is closed and every resolve is a single match.
//!
//! - [`ValueProvider`] returns a precomputed instance.
//! - [`MultiProvider`] returns every value pushed under its token, in order.
//! - [`FactoryProvider`] calls a function with freshly resolved arguments on
//!   every `create`, unless it was registered as a singleton.
//! - [`ClassProvider`] builds a component once and memoizes it.
//! - [`ScopeProvider`] hands out the injector it is registered in.
//!
//! Every `create` takes the resolution path that led to it. The path is
//! copied, never mutated, and is used both for cycle detection and for the
//! positions quoted in error messages.

use crate::component::{ComponentKind, ComponentRef};
use crate::factory::{Args, FactoryFn};
use crate::injector::WeakInjector;
use crate::resolver::{Dep, ParamDeps, get_providers};
use crate::token::Token;
use crate::{DiError, Result};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Type-erased value produced by a provider.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// One step of a resolution path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentDesc {
    /// Token being resolved
    pub token: Token,
    /// Argument position inside the dependent, once known
    pub index: Option<usize>,
}

impl ParentDesc {
    #[inline]
    pub fn new(token: Token) -> Self {
        Self { token, index: None }
    }

    #[inline]
    pub fn at(token: Token, index: usize) -> Self {
        Self {
            token,
            index: Some(index),
        }
    }
}

/// Render a path as a position, e.g. `A[0] -> B`.
pub fn render_position(path: &[ParentDesc]) -> String {
    path.iter()
        .map(|p| match p.index {
            Some(i) => format!("{}[{i}]", p.token),
            None => p.token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Fail if `token` already occurs in `parents`.
///
/// The message lists the cycle from the first occurrence of `token` and
/// repeats that element at the end: `A[0] => B[0] => C[0] => A[0]`.
pub fn detect_cycle(token: &Token, parents: &[ParentDesc]) -> Result<()> {
    let Some(start) = parents.iter().position(|p| &p.token == token) else {
        return Ok(());
    };
    let render = |p: &ParentDesc| match p.index {
        Some(i) => format!("{}[{i}]", p.token),
        None => format!("{}[]", p.token),
    };
    let mut segments: Vec<String> = parents[start..].iter().map(render).collect();
    segments.push(render(&parents[start]));
    Err(DiError::circular(segments.join(" => ")))
}

/// Kind of a provider, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Value,
    Multi,
    Factory,
    Class,
    Scope,
}

// =============================================================================
// Value Provider
// =============================================================================

/// Precomputed constant.
pub struct ValueProvider {
    token: Token,
    value: Instance,
    used: AtomicBool,
}

impl ValueProvider {
    /// Wrap `value`.
    #[inline]
    pub fn new<T: Send + Sync + 'static>(token: Token, value: T) -> Self {
        Self::from_instance(token, Arc::new(value))
    }

    /// Wrap an already shared instance.
    #[inline]
    pub fn from_instance(token: Token, value: Instance) -> Self {
        Self {
            token,
            value,
            used: AtomicBool::new(false),
        }
    }
}

// =============================================================================
// Multi Provider
// =============================================================================

/// Ordered accumulation of values under one token.
///
/// `create` yields an `Arc<Vec<Instance>>` snapshot of the values pushed so far.
pub struct MultiProvider {
    token: Token,
    values: Mutex<Vec<Instance>>,
    used: AtomicBool,
}

impl MultiProvider {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            values: Mutex::new(Vec::new()),
            used: AtomicBool::new(false),
        }
    }

    /// Append a value.
    pub fn push(&self, value: Instance) {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).push(value);
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Instance> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

// =============================================================================
// Factory Provider
// =============================================================================

/// Function invoked with resolved dependencies.
pub struct FactoryProvider {
    token: Token,
    injector: WeakInjector,
    deps: Vec<Dep>,
    factory: FactoryFn,
    singleton: bool,
    param_deps: OnceCell<Vec<ParamDeps>>,
    cached: OnceCell<Instance>,
    used: AtomicBool,
}

impl FactoryProvider {
    pub(crate) fn new(
        token: Token,
        injector: WeakInjector,
        deps: Vec<Dep>,
        factory: FactoryFn,
        singleton: bool,
    ) -> Self {
        Self {
            token,
            injector,
            deps,
            factory,
            singleton,
            param_deps: OnceCell::new(),
            cached: OnceCell::new(),
            used: AtomicBool::new(false),
        }
    }

    /// Whether the first result is reused.
    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    fn invoke(&self, path: &[ParentDesc]) -> Result<Instance> {
        let position = render_position(path);
        // Dependencies are looked up once; their instances are created per call.
        let param_deps = self.param_deps.get_or_try_init(|| {
            let injector = self.injector.upgrade()?;
            get_providers(&self.deps, &position, &injector, None)
        })?;
        let args = resolve_args(param_deps, path, position)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "tarpit",
            token = %self.token,
            "Invoking factory provider"
        );

        (self.factory)(&args)
    }
}

// =============================================================================
// Class Provider
// =============================================================================

/// Component constructed once with resolved constructor arguments.
pub struct ClassProvider {
    token: Token,
    injector: WeakInjector,
    class: ComponentRef,
    resolved: OnceCell<Instance>,
    used: AtomicBool,
}

impl ClassProvider {
    pub(crate) fn new(token: Token, injector: WeakInjector, class: ComponentRef) -> Self {
        Self {
            token,
            injector,
            class,
            resolved: OnceCell::new(),
            used: AtomicBool::new(false),
        }
    }

    /// The component this provider builds.
    #[inline]
    pub fn class(&self) -> &ComponentRef {
        &self.class
    }

    /// Whether the instance has been built.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    fn instantiate(&self, path: &[ParentDesc]) -> Result<Instance> {
        let injector = self.injector.upgrade()?;
        let position = render_position(path);
        let deps = self.class.dependencies();
        let param_deps = get_providers(&deps, &position, &injector, None)?;
        let args = resolve_args(&param_deps, path, position)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "tarpit",
            component = self.class.name(),
            injector = %injector.id(),
            args = args.len(),
            "Instantiating component"
        );

        self.class.build(&args, &injector)
    }
}

// =============================================================================
// Scope Provider
// =============================================================================

/// Yields an `Injector` handle for the injector that registered it.
pub struct ScopeProvider {
    injector: WeakInjector,
    used: AtomicBool,
}

impl ScopeProvider {
    pub(crate) fn new(injector: WeakInjector) -> Self {
        Self {
            injector,
            used: AtomicBool::new(false),
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Type-erased provider stored in an injector.
pub enum Provider {
    Value(ValueProvider),
    Multi(MultiProvider),
    Factory(FactoryProvider),
    Class(ClassProvider),
    Scope(ScopeProvider),
}

impl Provider {
    /// Token this provider was registered for.
    ///
    /// Scope providers answer for `Injector`.
    pub fn token(&self) -> Token {
        match self {
            Provider::Value(p) => p.token.clone(),
            Provider::Multi(p) => p.token.clone(),
            Provider::Factory(p) => p.token.clone(),
            Provider::Class(p) => p.token.clone(),
            Provider::Scope(_) => Token::of::<crate::Injector>(),
        }
    }

    #[inline]
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Value(_) => ProviderKind::Value,
            Provider::Multi(_) => ProviderKind::Multi,
            Provider::Factory(_) => ProviderKind::Factory,
            Provider::Class(_) => ProviderKind::Class,
            Provider::Scope(_) => ProviderKind::Scope,
        }
    }

    /// Component kind for class providers.
    pub fn component_kind(&self) -> Option<ComponentKind> {
        match self {
            Provider::Class(p) => Some(p.class.kind()),
            _ => None,
        }
    }

    /// Produce the value.
    ///
    /// `parents` is the path that led here; pass `&[]` at the top level.
    pub fn create(&self, parents: &[ParentDesc]) -> Result<Instance> {
        match self {
            Provider::Value(p) => {
                p.used.store(true, Ordering::Relaxed);
                Ok(Arc::clone(&p.value))
            }
            Provider::Multi(p) => {
                p.used.store(true, Ordering::Relaxed);
                Ok(Arc::new(p.snapshot()))
            }
            Provider::Scope(p) => {
                p.used.store(true, Ordering::Relaxed);
                Ok(Arc::new(p.injector.upgrade()?))
            }
            Provider::Factory(p) => {
                detect_cycle(&p.token, parents)?;
                let path = extend_path(parents, &p.token);
                p.used.store(true, Ordering::Relaxed);
                if p.singleton {
                    p.cached.get_or_try_init(|| p.invoke(&path)).map(Arc::clone)
                } else {
                    p.invoke(&path)
                }
            }
            Provider::Class(p) => {
                detect_cycle(&p.token, parents)?;
                let path = extend_path(parents, &p.token);
                p.used.store(true, Ordering::Relaxed);
                p.resolved.get_or_try_init(|| p.instantiate(&path)).map(Arc::clone)
            }
        }
    }

    /// Mark as used without producing a value.
    #[inline]
    pub fn set_used(&self) -> &Self {
        self.used_flag().store(true, Ordering::Relaxed);
        self
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.used_flag().load(Ordering::Relaxed)
    }

    /// Access the multi variant, for appending.
    pub fn as_multi(&self) -> Option<&MultiProvider> {
        match self {
            Provider::Multi(p) => Some(p),
            _ => None,
        }
    }

    /// Access the class variant.
    pub fn as_class(&self) -> Option<&ClassProvider> {
        match self {
            Provider::Class(p) => Some(p),
            _ => None,
        }
    }

    fn used_flag(&self) -> &AtomicBool {
        match self {
            Provider::Value(p) => &p.used,
            Provider::Multi(p) => &p.used,
            Provider::Factory(p) => &p.used,
            Provider::Class(p) => &p.used,
            Provider::Scope(p) => &p.used,
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &self.kind())
            .field("token", &self.token())
            .field("used", &self.is_used())
            .finish()
    }
}

/// Copy of `parents` with `token` appended.
fn extend_path(parents: &[ParentDesc], token: &Token) -> Vec<ParentDesc> {
    let mut path = Vec::with_capacity(parents.len() + 1);
    path.extend_from_slice(parents);
    path.push(ParentDesc::new(token.clone()));
    path
}

/// Create every resolved dependency; argument `i` sees the path with the
/// dependent's entry tagged `[i]`.
fn resolve_args(param_deps: &[ParamDeps], path: &[ParentDesc], position: String) -> Result<Args> {
    let Some((last, ancestors)) = path.split_last() else {
        return Ok(Args::new(position, Vec::new(), Vec::new()));
    };
    let mut values = Vec::with_capacity(param_deps.len());
    let mut tokens = Vec::with_capacity(param_deps.len());
    for (index, dep) in param_deps.iter().enumerate() {
        let value = match &dep.provider {
            Some(provider) => {
                let mut child_path = ancestors.to_vec();
                child_path.push(ParentDesc::at(last.token.clone(), index));
                Some(provider.create(&child_path)?)
            }
            None => None,
        };
        values.push(value);
        tokens.push(dep.token.clone());
    }
    Ok(Args::new(position, values, tokens))
}
