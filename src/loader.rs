//! Component loading
//!
//! Loading a component registers it, everything it imports and every
//! provider it declares, exactly once per injector. Modules and roots are
//! then instantiated eagerly, and a component carrying a subsystem token
//! is handed to that subsystem's loader.
//!
//! Loading modules also yields a [`ProviderTreeNode`] snapshot. Once the
//! load is complete, [`check_usage`] walks it and reports every module
//! subtree whose providers nobody resolved.

use crate::component::{ComponentKind, ComponentMeta, ComponentRef};
use crate::events::TpEvent;
use crate::factory::ProviderDef;
use crate::injector::Injector;
use crate::provider::{ClassProvider, FactoryProvider, MultiProvider, Provider, ValueProvider};
use crate::token::stringify;
use crate::tp_loader::TpLoader;
use crate::{DiError, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Providers registered by one module, and the modules it imported.
#[derive(Debug, Clone)]
pub struct ProviderTreeNode {
    pub name: String,
    pub providers: Vec<Arc<Provider>>,
    pub children: Vec<ProviderTreeNode>,
}

impl ProviderTreeNode {
    /// Whether any provider in this subtree has been used.
    pub fn is_used(&self) -> bool {
        self.providers.iter().any(|p| p.is_used())
            || self.children.iter().any(ProviderTreeNode::is_used)
    }
}

/// Outcome of [`load_component`].
#[derive(Debug, Clone)]
pub struct LoadedComponent {
    /// Injector the component is bound in
    pub injector: Injector,
    /// The component's own provider
    pub provider: Arc<Provider>,
    /// Snapshot of what a module or root brought in; `None` for services
    /// and for components that were already loaded
    pub tree: Option<ProviderTreeNode>,
}

/// Load `component` into `injector`.
///
/// A component already visible from the target injector is not loaded
/// again. Roots get a fresh child injector. Modules and roots register
/// their imports and providers first and are instantiated right away.
pub fn load_component(component: &ComponentRef, injector: &Injector) -> Result<LoadedComponent> {
    let meta = component.meta();
    let mut target = if meta.inject_root {
        injector.root()
    } else {
        injector.clone()
    };

    if let Some(provider) = target.get(component.token()) {
        #[cfg(feature = "logging")]
        trace!(
            target: "tarpit",
            component = component.name(),
            "Component already loaded"
        );

        return Ok(LoadedComponent {
            injector: target,
            provider,
            tree: None,
        });
    }

    if meta.kind == ComponentKind::Root {
        target = target.child();
    }

    #[cfg(feature = "logging")]
    debug!(
        target: "tarpit",
        component = component.name(),
        kind = meta.kind.label(),
        injector = %target.id(),
        "Loading component"
    );

    let tree = match meta.kind {
        ComponentKind::Service => None,
        ComponentKind::Module | ComponentKind::Root => Some(collect_worker(&meta, &target)?),
    };

    let provider = target.set(
        component.token().clone(),
        Provider::Class(ClassProvider::new(
            component.token().clone(),
            target.downgrade(),
            component.clone(),
        )),
    );

    if meta.kind != ComponentKind::Service {
        provider.create(&[])?;
    }

    if meta.kind == ComponentKind::Root {
        for entry in &meta.entries {
            load_component(entry, &target)?;
        }
    }

    if let Some(token) = &meta.token {
        let loader = target
            .expose::<TpLoader>()?
            .filter(|loader| loader.contains(token))
            .ok_or_else(|| DiError::LoaderNotFound {
                component: meta.display_name().to_string(),
            })?;
        loader.load(&meta, &target)?;
    }

    Ok(LoadedComponent {
        injector: target,
        provider,
        tree,
    })
}

/// Register the provider a definition describes and return it.
///
/// Definitions marked `root` are registered in the root injector.
/// `Component` definitions go through [`load_component`].
pub fn def_to_provider(def: &ProviderDef, injector: &Injector) -> Result<Arc<Provider>> {
    match def {
        ProviderDef::Component(component) => Ok(load_component(component, injector)?.provider),
        ProviderDef::Value {
            token,
            value,
            multi: false,
            root,
        } => {
            let target = scope_of(injector, *root);
            Ok(target.set(
                token.clone(),
                Provider::Value(ValueProvider::from_instance(token.clone(), Arc::clone(value))),
            ))
        }
        ProviderDef::Value {
            token,
            value,
            multi: true,
            root,
        } => {
            let target = scope_of(injector, *root);
            let provider = match target.get_local(token) {
                Some(existing) => existing,
                None => target.set(
                    token.clone(),
                    Provider::Multi(MultiProvider::new(token.clone())),
                ),
            };
            let multi = provider.as_multi().ok_or_else(|| DiError::MultiConflict {
                token: stringify(token),
            })?;
            multi.push(Arc::clone(value));
            Ok(provider)
        }
        ProviderDef::Factory {
            token,
            deps,
            factory,
            singleton,
            root,
        } => {
            let target = scope_of(injector, *root);
            Ok(target.set(
                token.clone(),
                Provider::Factory(FactoryProvider::new(
                    token.clone(),
                    target.downgrade(),
                    deps.clone(),
                    Arc::clone(factory),
                    *singleton,
                )),
            ))
        }
        ProviderDef::Class { token, class, root } => {
            if class.kind() != ComponentKind::Service {
                return Err(DiError::NotWorker {
                    received: class.name().to_string(),
                });
            }
            let target = scope_of(injector, *root);
            Ok(target.set(
                token.clone(),
                Provider::Class(ClassProvider::new(
                    token.clone(),
                    target.downgrade(),
                    class.clone(),
                )),
            ))
        }
    }
}

/// Walk `node` and emit [`TpEvent::UnusedProvider`] for every subtree with
/// no used provider. Returns whether anything under `node` was used.
pub fn check_usage(injector: &Injector, node: &ProviderTreeNode, path: &[String]) -> bool {
    let mut path = path.to_vec();
    path.push(node.name.clone());

    let providers_used = node.providers.iter().any(|p| p.is_used());
    // Every child is visited so each unused subtree is reported.
    let children_used = node
        .children
        .iter()
        .map(|child| check_usage(injector, child, &path))
        .fold(false, |acc, used| acc || used);

    if providers_used || children_used {
        return true;
    }
    injector.emit(&TpEvent::UnusedProvider(path));
    false
}

fn collect_worker(meta: &ComponentMeta, injector: &Injector) -> Result<ProviderTreeNode> {
    let mut children = Vec::new();
    for import in &meta.imports {
        if let Some(tree) = load_component(import, injector)?.tree {
            children.push(tree);
        }
    }
    let providers = meta
        .providers
        .iter()
        .map(|def| def_to_provider(def, injector))
        .collect::<Result<Vec<_>>>()?;

    Ok(ProviderTreeNode {
        name: meta.display_name().to_string(),
        providers,
        children,
    })
}

fn scope_of(injector: &Injector, root: bool) -> Injector {
    if root { injector.root() } else { injector.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, component};
    use crate::events::EventKind;
    use crate::factory::Args;
    use crate::resolver::Dep;
    use crate::token::Token;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    static SHARED_BUILDS: AtomicU32 = AtomicU32::new(0);

    struct Shared;

    impl Component for Shared {
        fn construct(_: &Args) -> Result<Self> {
            SHARED_BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Shared)
        }
    }

    struct SharedModule;

    impl Component for SharedModule {
        fn meta() -> ComponentMeta {
            ComponentMeta::module().provide(component::<Shared>())
        }

        fn construct(_: &Args) -> Result<Self> {
            Ok(SharedModule)
        }
    }

    struct Left;

    impl Component for Left {
        fn meta() -> ComponentMeta {
            ComponentMeta::module().import(component::<SharedModule>())
        }

        fn construct(_: &Args) -> Result<Self> {
            Ok(Left)
        }
    }

    struct Right;

    impl Component for Right {
        fn meta() -> ComponentMeta {
            ComponentMeta::module().import(component::<SharedModule>())
        }

        fn construct(_: &Args) -> Result<Self> {
            Ok(Right)
        }
    }

    struct Consumer {
        shared: Arc<Shared>,
    }

    impl Component for Consumer {
        fn dependencies() -> Vec<Dep> {
            vec![Dep::on::<Shared>()]
        }

        fn construct(args: &Args) -> Result<Self> {
            Ok(Consumer { shared: args.get(0)? })
        }
    }

    struct Diamond;

    impl Component for Diamond {
        fn meta() -> ComponentMeta {
            ComponentMeta::module()
                .import(component::<Left>())
                .import(component::<Right>())
                .provide(component::<Consumer>())
        }

        fn construct(_: &Args) -> Result<Self> {
            Ok(Diamond)
        }
    }

    #[test]
    fn test_diamond_loads_once() {
        let injector = Injector::new();
        let loaded = load_component(&component::<Diamond>(), &injector).unwrap();

        let consumer = injector.expose::<Consumer>().unwrap().unwrap();
        let shared = injector.expose::<Shared>().unwrap().unwrap();
        assert!(Arc::ptr_eq(&consumer.shared, &shared));
        assert_eq!(SHARED_BUILDS.load(Ordering::SeqCst), 1);

        let tree = loaded.tree.unwrap();
        assert_eq!(tree.name, "Diamond");
        // Right sees SharedModule already loaded, so only Left carries it.
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].children.len(), 1);
        assert!(tree.children[1].children.is_empty());
    }

    #[test]
    fn test_reload_is_noop() {
        let injector = Injector::new();
        let first = load_component(&component::<SharedModule>(), &injector).unwrap();
        let second = load_component(&component::<SharedModule>(), &injector).unwrap();
        assert!(Arc::ptr_eq(&first.provider, &second.provider));
        assert!(second.tree.is_none());
    }

    struct Lonely;

    impl Component for Lonely {
        fn meta() -> ComponentMeta {
            ComponentMeta::module().provide(ProviderDef::value("never", 0u8))
        }

        fn construct(_: &Args) -> Result<Self> {
            Ok(Lonely)
        }
    }

    struct Outer;

    impl Component for Outer {
        fn meta() -> ComponentMeta {
            ComponentMeta::module()
                .import(component::<Lonely>())
                .provide(ProviderDef::value("used", 1u8))
        }

        fn construct(_: &Args) -> Result<Self> {
            Ok(Outer)
        }
    }

    #[test]
    fn test_check_usage_reports_unused_subtree() {
        let injector = Injector::new();
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        injector.on(EventKind::UnusedProvider, move |event| {
            if let TpEvent::UnusedProvider(path) = event {
                sink.lock().unwrap().push(path.join(" -> "));
            }
        });

        let loaded = load_component(&component::<Outer>(), &injector).unwrap();
        injector.get(&Token::name("used")).unwrap().set_used();

        let tree = loaded.tree.unwrap();
        assert!(check_usage(&injector, &tree, &[]));
        assert_eq!(*reports.lock().unwrap(), ["Outer -> Lonely"]);
        assert!(!tree.children[0].is_used());
    }

    struct Entry;

    impl Component for Entry {
        fn construct(_: &Args) -> Result<Self> {
            Ok(Entry)
        }
    }

    struct App;

    impl Component for App {
        fn meta() -> ComponentMeta {
            ComponentMeta::root().entry(component::<Entry>()).entry(component::<App>())
        }

        fn construct(_: &Args) -> Result<Self> {
            Ok(App)
        }
    }

    #[test]
    fn test_root_gets_child_injector() {
        let injector = Injector::new();
        let loaded = load_component(&component::<App>(), &injector).unwrap();

        assert_eq!(loaded.injector.parent(), Some(injector.clone()));
        assert!(loaded.injector.has_local(&Token::of::<App>()));
        assert!(loaded.injector.has_local(&Token::of::<Entry>()));
        assert!(!injector.has(&Token::of::<App>()));
    }

    struct Global;

    impl Component for Global {
        fn meta() -> ComponentMeta {
            ComponentMeta::service().inject_root()
        }

        fn construct(_: &Args) -> Result<Self> {
            Ok(Global)
        }
    }

    #[test]
    fn test_inject_root_binds_at_root() {
        let root = Injector::new();
        let child = root.child();
        let loaded = load_component(&component::<Global>(), &child).unwrap();
        assert_eq!(loaded.injector, root);
        assert!(root.has_local(&Token::of::<Global>()));
        assert!(!child.has_local(&Token::of::<Global>()));
    }

    struct Routed;

    impl Component for Routed {
        fn meta() -> ComponentMeta {
            ComponentMeta::service().named("Routed").token("http")
        }

        fn construct(_: &Args) -> Result<Self> {
            Ok(Routed)
        }
    }

    #[test]
    fn test_missing_loader_is_fatal() {
        let injector = Injector::new();
        let err = load_component(&component::<Routed>(), &injector).unwrap_err();
        assert_eq!(err.to_string(), "Can't find loader for component \"Routed\"");
    }

    #[test]
    fn test_multi_values_accumulate() {
        let injector = Injector::new();
        def_to_provider(&ProviderDef::multi("plugins", "a"), &injector).unwrap();
        let provider = def_to_provider(&ProviderDef::multi("plugins", "b"), &injector).unwrap();
        assert_eq!(provider.as_multi().unwrap().len(), 2);

        def_to_provider(&ProviderDef::value("single", 1u8), &injector).unwrap();
        let err = def_to_provider(&ProviderDef::multi("single", 2u8), &injector).unwrap_err();
        assert!(matches!(err, DiError::MultiConflict { .. }));
    }

    #[test]
    fn test_class_def_requires_service() {
        let injector = Injector::new();
        let lonely = ProviderDef::class("svc", component::<Lonely>());
        let err = def_to_provider(&lonely, &injector).unwrap_err();
        assert!(matches!(err, DiError::NotWorker { ref received } if received == "Lonely"));

        let entry = ProviderDef::class("svc", component::<Entry>());
        let provider = def_to_provider(&entry, &injector).unwrap();
        assert!(provider.create(&[]).unwrap().downcast::<Entry>().is_ok());
    }

    #[test]
    fn test_root_flag_registers_at_root() {
        let root = Injector::new();
        let child = root.child();
        def_to_provider(&ProviderDef::value("cfg", 1u8).root(), &child).unwrap();
        assert!(root.has_local(&Token::name("cfg")));
    }
}
