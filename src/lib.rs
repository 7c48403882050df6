//! # Tarpit - Component-Based Dependency Injection Runtime
//!
//! Hierarchical injectors, declarative components and a two-phase
//! application lifecycle.
//!
//! ## Features
//!
//! - **Hierarchical injectors** - A tree of scopes; lookups walk toward the root
//! - **Components** - Services, modules and roots declared through one trait
//! - **Load once** - Diamond imports are materialized a single time per injector
//! - **Cycle detection** - Errors name the full dependency path
//! - **Lifecycle hub** - Subsystem start/terminate hooks fan out concurrently
//! - **Unused-provider report** - Modules whose providers nobody resolves are flagged
//! - **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use tarpit::{Args, Component, ComponentMeta, ConfigData, Dep, Platform, Result, component};
//! use std::sync::Arc;
//!
//! struct Database;
//!
//! impl Component for Database {
//!     fn construct(_: &Args) -> Result<Self> {
//!         Ok(Database)
//!     }
//! }
//!
//! struct Users {
//!     db: Arc<Database>,
//! }
//!
//! impl Component for Users {
//!     fn dependencies() -> Vec<Dep> {
//!         vec![Dep::on::<Database>()]
//!     }
//!
//!     fn construct(args: &Args) -> Result<Self> {
//!         Ok(Users { db: args.get(0)? })
//!     }
//! }
//!
//! struct AppModule;
//!
//! impl Component for AppModule {
//!     fn meta() -> ComponentMeta {
//!         ComponentMeta::module()
//!             .provide(component::<Database>())
//!             .provide(component::<Users>())
//!     }
//!
//!     fn construct(_: &Args) -> Result<Self> {
//!         Ok(AppModule)
//!     }
//! }
//!
//! let platform = Platform::new(ConfigData::default()).unwrap();
//! platform.import(component::<AppModule>()).unwrap();
//!
//! let users = platform.expose::<Users>().unwrap().unwrap();
//! let db = platform.expose::<Database>().unwrap().unwrap();
//! assert!(Arc::ptr_eq(&users.db, &db));
//! ```
//!
//! ## Provider Kinds
//!
//! | Definition | Behavior |
//! |------------|----------|
//! | `ProviderDef::value` | Constant |
//! | `ProviderDef::multi` | Appends to an ordered list under one token |
//! | `ProviderDef::factory` | Called with fresh arguments on every resolve |
//! | `ProviderDef::factory(..).singleton()` | Called once |
//! | `ProviderDef::class` / `component` | Constructed once per injector |
//!
//! ## Lifecycle
//!
//! ```rust
//! use tarpit::{ConfigData, Platform};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let platform = Platform::new(ConfigData::default()).unwrap();
//! platform.loader().on_start(|| async { Ok(()) });
//!
//! platform.start().await;
//! assert!(platform.inspector().wait_start().await >= 0.0);
//! platform.terminate().await;
//! # });
//! ```

// Lets generated `::tarpit::` paths resolve inside this crate's own tests.
extern crate self as tarpit;

mod component;
mod config;
mod error;
mod events;
mod factory;
mod injector;
mod loader;
mod platform;
mod printer;
mod provider;
mod resolver;
mod scope;
mod storage;
mod token;
mod tp_inspector;
mod tp_loader;
mod tp_logger;

pub mod logging;

pub use component::{Component, ComponentKind, ComponentMeta, ComponentRef, component};
pub use config::{ConfigData, ConfigError, DEFAULT_CONFIG_FILE};
pub use error::{DiError, HookError, HookResult, Result};
pub use events::{EventBus, EventKind, ListenerId, TpEvent};
pub use factory::{Args, FactoryFn, ProviderDef};
pub use injector::{Injector, WeakInjector};
pub use loader::{LoadedComponent, ProviderTreeNode, check_usage, def_to_provider, load_component};
pub use platform::{Platform, PlatformState};
pub use printer::print_provider_tree;
pub use provider::{
    ClassProvider, FactoryProvider, Instance, MultiProvider, ParentDesc, Provider, ProviderKind,
    ScopeProvider, ValueProvider, detect_cycle, render_position,
};
pub use resolver::{Dep, ParamDeps, get_providers, method_position};
pub use scope::{InjectorId, NullInjector};
pub use token::{Token, stringify};
pub use tp_inspector::TpInspector;
pub use tp_loader::{Hook, SubsystemLoader, TpLoader};
pub use tp_logger::{BuiltinTpLogger, TpLogger, attach_logger};

#[cfg(feature = "derive")]
pub use tarpit_derive::TpService;

// Re-export for convenience
pub use async_trait::async_trait;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, Component, ComponentKind, ComponentMeta, ComponentRef, ConfigData, Dep, DiError,
        HookResult, Injector, Platform, ProviderDef, Result, SubsystemLoader, Token, TpEvent,
        TpLoader, WeakInjector, component,
    };

    #[cfg(feature = "derive")]
    pub use crate::TpService;
}
