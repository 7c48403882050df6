//! Components: services, modules and roots
//!
//! A component is a type that knows how to build itself from resolved
//! dependencies. Its [`ComponentMeta`] says what kind of component it is
//! and, for modules and roots, what it brings with it.
//!
//! | Kind    | Registered in            | Instantiated |
//! |---------|--------------------------|--------------|
//! | Service | the loading injector     | on demand    |
//! | Module  | the loading injector     | on load      |
//! | Root    | a new child injector     | on load      |

use crate::factory::{Args, ProviderDef};
use crate::injector::Injector;
use crate::provider::Instance;
use crate::resolver::Dep;
use crate::token::{Token, short_type_name};
use crate::tp_loader::TpLoader;
use crate::Result;
use std::sync::Arc;

/// Component discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Leaf, constructed lazily
    Service,
    /// Aggregates imports and providers
    Module,
    /// Entry point with its own injector
    Root,
}

impl ComponentKind {
    /// Label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Service => "TpService",
            ComponentKind::Module => "TpModule",
            ComponentKind::Root => "TpRoot",
        }
    }
}

/// Static description of a component.
#[derive(Clone, Debug)]
pub struct ComponentMeta {
    pub kind: ComponentKind,
    /// Display name; defaults to the type name
    pub name: Option<String>,
    /// Bind in the root injector instead of the loading one
    pub inject_root: bool,
    /// Components loaded before this one
    pub imports: Vec<ComponentRef>,
    /// Providers registered alongside this one
    pub providers: Vec<ProviderDef>,
    /// Root only: components cascade-loaded into the root's injector
    pub entries: Vec<ComponentRef>,
    /// Subsystem that handles this component on load
    pub token: Option<Token>,
}

impl ComponentMeta {
    fn of_kind(kind: ComponentKind) -> Self {
        Self {
            kind,
            name: None,
            inject_root: false,
            imports: Vec::new(),
            providers: Vec::new(),
            entries: Vec::new(),
            token: None,
        }
    }

    pub fn service() -> Self {
        Self::of_kind(ComponentKind::Service)
    }

    pub fn module() -> Self {
        Self::of_kind(ComponentKind::Module)
    }

    pub fn root() -> Self {
        Self::of_kind(ComponentKind::Root)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn inject_root(mut self) -> Self {
        self.inject_root = true;
        self
    }

    pub fn import(mut self, component: ComponentRef) -> Self {
        self.imports.push(component);
        self
    }

    pub fn provide(mut self, def: impl Into<ProviderDef>) -> Self {
        self.providers.push(def.into());
        self
    }

    pub fn entry(mut self, component: ComponentRef) -> Self {
        self.entries.push(component);
        self
    }

    /// Dispatch this component to the subsystem registered under `token`.
    pub fn token(mut self, token: impl Into<Token>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Display name, or `undefined` when unnamed.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("undefined")
    }
}

/// A type that can be registered and built by an injector.
///
/// # Examples
///
/// ```rust
/// use tarpit::{Args, Component, Dep, Injector, ProviderDef, Result, def_to_provider};
/// use std::sync::Arc;
///
/// struct Database;
///
/// impl Component for Database {
///     fn construct(_: &Args) -> Result<Self> {
///         Ok(Database)
///     }
/// }
///
/// struct Users {
///     db: Arc<Database>,
/// }
///
/// impl Component for Users {
///     fn dependencies() -> Vec<Dep> {
///         vec![Dep::on::<Database>()]
///     }
///
///     fn construct(args: &Args) -> Result<Self> {
///         Ok(Users { db: args.get(0)? })
///     }
/// }
///
/// let injector = Injector::new();
/// def_to_provider(&ProviderDef::component::<Database>(), &injector).unwrap();
/// def_to_provider(&ProviderDef::component::<Users>(), &injector).unwrap();
///
/// let users = injector.expose::<Users>().unwrap().unwrap();
/// let db = injector.expose::<Database>().unwrap().unwrap();
/// assert!(Arc::ptr_eq(&users.db, &db));
/// ```
pub trait Component: Send + Sync + Sized + 'static {
    /// Kind and wiring. Defaults to a plain service.
    fn meta() -> ComponentMeta {
        ComponentMeta::service()
    }

    /// Constructor arguments, in order.
    fn dependencies() -> Vec<Dep> {
        Vec::new()
    }

    /// Build from resolved arguments.
    fn construct(args: &Args) -> Result<Self>;

    /// Register start/terminate hooks once constructed.
    fn lifecycle(_this: &Arc<Self>, _loader: &TpLoader) {}
}

/// Type-erased handle to a [`Component`] implementation.
#[derive(Clone)]
pub struct ComponentRef {
    token: Token,
    name: &'static str,
    meta: fn() -> ComponentMeta,
    deps: fn() -> Vec<Dep>,
    build: fn(&Args, &Injector) -> Result<Instance>,
}

impl ComponentRef {
    pub fn of<C: Component>() -> Self {
        Self {
            token: Token::of::<C>(),
            name: short_type_name(std::any::type_name::<C>()),
            meta: C::meta,
            deps: C::dependencies,
            build: build_component::<C>,
        }
    }

    /// Token the component is bound under: its own type.
    #[inline]
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Short type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Metadata, with the name defaulted to the type name.
    pub fn meta(&self) -> ComponentMeta {
        let mut meta = (self.meta)();
        if meta.name.is_none() {
            meta.name = Some(self.name.to_string());
        }
        meta
    }

    pub fn kind(&self) -> ComponentKind {
        (self.meta)().kind
    }

    pub fn dependencies(&self) -> Vec<Dep> {
        (self.deps)()
    }

    pub(crate) fn build(&self, args: &Args, injector: &Injector) -> Result<Instance> {
        (self.build)(args, injector)
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl std::fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ComponentRef").field(&self.name).finish()
    }
}

/// Shorthand for [`ComponentRef::of`].
#[inline]
pub fn component<C: Component>() -> ComponentRef {
    ComponentRef::of::<C>()
}

fn build_component<C: Component>(args: &Args, injector: &Injector) -> Result<Instance> {
    let this = Arc::new(C::construct(args)?);
    if let Some(loader) = injector.expose::<TpLoader>()? {
        C::lifecycle(&this, &loader);
    }
    Ok(this)
}
