//! Hierarchical injector
//!
//! An [`Injector`] is a cheap handle to one node of an injector tree. The
//! tree itself lives in a shared arena, so cloning a handle, creating a
//! child or walking to the root never copies providers.
//!
//! ## Resolution
//!
//! Lookups check the node's own bindings first and then each ancestor in
//! turn. A miss above the root returns `None`; it is the caller that turns
//! a miss into an error when the dependency was required.

use crate::events::{EventBus, EventKind, ListenerId, TpEvent};
use crate::printer::print_provider_tree;
use crate::provider::{Provider, ScopeProvider, ValueProvider};
use crate::scope::{InjectorId, InjectorNode, InjectorTree};
use crate::token::{Token, short_type_name};
use crate::{DiError, Result};
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Handle to one injector in a tree.
///
/// # Examples
///
/// ```rust
/// use tarpit::{Injector, Provider, Token, ValueProvider};
///
/// let root = Injector::new();
/// let token = Token::name("greeting");
/// root.set(token.clone(), Provider::Value(ValueProvider::new(token.clone(), "hi")));
///
/// let child = root.child();
/// let greeting = child.expose_token::<&str>(&token).unwrap().unwrap();
/// assert_eq!(*greeting, "hi");
/// ```
///
/// A handle keeps the whole tree alive. Components that hold on to their
/// injector should depend on [`WeakInjector`] instead, otherwise the
/// memoized instance and the tree keep each other alive.
#[derive(Clone)]
pub struct Injector {
    id: InjectorId,
    tree: Arc<InjectorTree>,
}

/// Non-owning injector handle.
///
/// Every injector binds one under `Token::of::<WeakInjector>()`.
#[derive(Clone)]
pub struct WeakInjector {
    id: InjectorId,
    tree: Weak<InjectorTree>,
}

impl WeakInjector {
    /// The injector, or `InjectorDropped` once its tree is gone.
    pub fn upgrade(&self) -> Result<Injector> {
        self.tree
            .upgrade()
            .map(|tree| Injector { id: self.id, tree })
            .ok_or(DiError::InjectorDropped)
    }
}

impl Injector {
    /// Create a root injector with a fresh event bus.
    pub fn new() -> Self {
        Self::create(None)
    }

    /// Create an injector under `parent`, or a new root when `None`.
    ///
    /// Every injector binds itself under `Token::of::<Injector>()` and
    /// `Token::of::<WeakInjector>()`. Roots additionally bind the tree's
    /// [`EventBus`].
    pub fn create(parent: Option<&Injector>) -> Self {
        let injector = match parent {
            Some(parent) => Injector {
                id: parent.tree.add_child(parent.id),
                tree: Arc::clone(&parent.tree),
            },
            None => {
                let tree = Arc::new(InjectorTree::new());
                let injector = Injector { id: tree.root, tree };
                let events = Arc::clone(&injector.tree.events);
                injector.set(
                    Token::of::<EventBus>(),
                    Provider::Value(ValueProvider::from_instance(Token::of::<EventBus>(), events)),
                );
                injector
            }
        };
        injector.set(
            Token::of::<Injector>(),
            Provider::Scope(ScopeProvider::new(injector.downgrade())),
        );
        injector.set(
            Token::of::<WeakInjector>(),
            Provider::Value(ValueProvider::new(Token::of::<WeakInjector>(), injector.downgrade())),
        );

        #[cfg(feature = "logging")]
        debug!(
            target: "tarpit",
            injector = %injector.id,
            depth = injector.depth(),
            "Created injector"
        );

        injector
    }

    /// Create a child of this injector.
    #[inline]
    pub fn child(&self) -> Self {
        Self::create(Some(self))
    }

    #[inline]
    pub fn id(&self) -> InjectorId {
        self.id
    }

    /// Distance from the root (root = 0).
    pub fn depth(&self) -> u32 {
        self.node().map_or(0, |n| n.depth)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.id == self.tree.root
    }

    /// The root injector of this tree.
    #[inline]
    pub fn root(&self) -> Injector {
        self.at(self.tree.root)
    }

    /// Parent injector; `None` for a root.
    pub fn parent(&self) -> Option<Injector> {
        self.node().and_then(|n| n.parent).map(|id| self.at(id))
    }

    /// Child injectors in creation order.
    pub fn children(&self) -> Vec<Injector> {
        self.node()
            .map(|n| n.children().into_iter().map(|id| self.at(id)).collect())
            .unwrap_or_default()
    }

    /// Bind `token` locally, replacing any previous local binding.
    pub fn set(&self, token: Token, provider: Provider) -> Arc<Provider> {
        self.set_arc(token, Arc::new(provider))
    }

    /// Bind an already shared provider.
    pub fn set_arc(&self, token: Token, provider: Arc<Provider>) -> Arc<Provider> {
        #[cfg(feature = "logging")]
        trace!(
            target: "tarpit",
            injector = %self.id,
            token = %token,
            kind = ?provider.kind(),
            "Binding provider"
        );

        match self.node() {
            Some(node) => node.storage.insert(token, provider),
            None => provider,
        }
    }

    /// Nearest provider of `token`, walking up to the root.
    ///
    /// Falsy tokens never resolve.
    pub fn get(&self, token: &Token) -> Option<Arc<Provider>> {
        if token.is_falsy() {
            return None;
        }
        self.tree.lookup(self.id, token)
    }

    /// Provider bound in this injector only.
    pub fn get_local(&self, token: &Token) -> Option<Arc<Provider>> {
        self.node().and_then(|n| n.storage.get(token))
    }

    /// Whether `token` resolves here or in an ancestor.
    pub fn has(&self, token: &Token) -> bool {
        !token.is_falsy() && self.tree.contains(self.id, token)
    }

    /// Whether `token` is bound in this injector itself.
    pub fn has_local(&self, token: &Token) -> bool {
        self.node().is_some_and(|n| n.storage.contains(token))
    }

    /// Remove a local binding.
    pub fn remove(&self, token: &Token) -> bool {
        self.node().is_some_and(|n| n.storage.remove(token))
    }

    /// Number of local bindings.
    pub fn len(&self) -> usize {
        self.node().map_or(0, |n| n.storage.len())
    }

    /// Whether no local bindings exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Local bindings in registration order.
    pub fn providers(&self) -> Vec<(Token, Arc<Provider>)> {
        self.node().map(|n| n.storage.entries()).unwrap_or_default()
    }

    /// Create the value bound to type `T`.
    ///
    /// `Ok(None)` when nothing is bound.
    pub fn expose<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        self.expose_token(&Token::of::<T>())
    }

    /// Create the value bound to `token`, downcast to `T`.
    pub fn expose_token<T: Send + Sync + 'static>(&self, token: &Token) -> Result<Option<Arc<T>>> {
        let Some(provider) = self.get(token) else {
            return Ok(None);
        };
        provider
            .create(&[])?
            .downcast::<T>()
            .map(Some)
            .map_err(|_| DiError::TypeMismatch {
                expected: short_type_name(std::any::type_name::<T>()),
                index: 0,
            })
    }

    // =========================================================================
    // Event relay
    // =========================================================================

    /// The event bus shared by the whole tree.
    #[inline]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.tree.events
    }

    #[inline]
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&TpEvent) + Send + Sync + 'static,
    {
        self.tree.events.on(kind, callback)
    }

    #[inline]
    pub fn once<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&TpEvent) + Send + Sync + 'static,
    {
        self.tree.events.once(kind, callback)
    }

    #[inline]
    pub fn emit(&self, event: &TpEvent) -> bool {
        self.tree.events.emit(event)
    }

    /// Render the whole tree this injector belongs to.
    pub fn provider_tree(&self) -> String {
        print_provider_tree(&self.root())
    }

    /// Non-owning handle to this injector.
    pub fn downgrade(&self) -> WeakInjector {
        WeakInjector {
            id: self.id,
            tree: Arc::downgrade(&self.tree),
        }
    }

    fn node(&self) -> Option<Arc<InjectorNode>> {
        self.tree.node(self.id)
    }

    fn at(&self, id: InjectorId) -> Injector {
        Injector {
            id,
            tree: Arc::clone(&self.tree),
        }
    }
}

impl std::fmt::Debug for WeakInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WeakInjector").field(&self.id).finish()
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Injector {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Injector {}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("id", &self.id)
            .field("depth", &self.depth())
            .field("providers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(injector: &Injector, name: &'static str, value: u32) -> Arc<Provider> {
        let token = Token::name(name);
        injector.set(token.clone(), Provider::Value(ValueProvider::new(token, value)))
    }

    #[test]
    fn test_child_shadows_parent() {
        let root = Injector::new();
        let child = root.child();
        bind(&root, "port", 80);
        assert_eq!(*child.expose_token::<u32>(&Token::name("port")).unwrap().unwrap(), 80);

        bind(&child, "port", 8080);
        assert_eq!(*child.expose_token::<u32>(&Token::name("port")).unwrap().unwrap(), 8080);
        assert_eq!(*root.expose_token::<u32>(&Token::name("port")).unwrap().unwrap(), 80);

        assert!(child.remove(&Token::name("port")));
        assert_eq!(*child.expose_token::<u32>(&Token::name("port")).unwrap().unwrap(), 80);
    }

    #[test]
    fn test_set_overwrites_last_write_wins() {
        let injector = Injector::new();
        bind(&injector, "x", 1);
        let second = bind(&injector, "x", 2);
        assert!(Arc::ptr_eq(&injector.get(&Token::name("x")).unwrap(), &second));
    }

    #[test]
    fn test_falsy_tokens_never_resolve() {
        let injector = Injector::new();
        bind(&injector, "", 1);
        assert!(injector.get(&Token::name("")).is_none());
        assert!(!injector.has(&Token::Undefined));
    }

    #[test]
    fn test_self_reference() {
        let root = Injector::new();
        let child = root.child();

        let exposed = child.expose::<Injector>().unwrap().unwrap();
        assert_eq!(*exposed, child);
        assert_ne!(*exposed, root);
        assert!(child.has_local(&Token::of::<Injector>()));
    }

    struct Holder {
        injector: Arc<WeakInjector>,
    }

    impl crate::component::Component for Holder {
        fn dependencies() -> Vec<crate::resolver::Dep> {
            vec![crate::resolver::Dep::on::<WeakInjector>()]
        }

        fn construct(args: &crate::factory::Args) -> Result<Self> {
            Ok(Holder {
                injector: args.get(0)?,
            })
        }
    }

    #[test]
    fn test_weak_self_reference_does_not_keep_tree_alive() {
        let root = Injector::new();
        let child = root.child();
        let def = crate::factory::ProviderDef::component::<Holder>();
        crate::loader::def_to_provider(&def, &child).unwrap();

        let holder = child.expose::<Holder>().unwrap().unwrap();
        assert_eq!(holder.injector.upgrade().unwrap(), child);

        drop(child);
        drop(root);
        let err = holder.injector.upgrade().unwrap_err();
        assert!(matches!(err, DiError::InjectorDropped));
    }

    #[test]
    fn test_tree_navigation() {
        let root = Injector::new();
        let a = root.child();
        let b = root.child();
        let leaf = a.child();

        assert!(root.is_root());
        assert_eq!(leaf.depth(), 2);
        assert_eq!(leaf.root(), root);
        assert_eq!(leaf.parent(), Some(a.clone()));
        assert_eq!(root.children(), vec![a, b]);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_events_shared_across_tree() {
        let root = Injector::new();
        let leaf = root.child().child();
        assert!(Arc::ptr_eq(root.events(), leaf.events()));

        let seen = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&seen);
        leaf.on(EventKind::Start, move |_| flag.store(true, std::sync::atomic::Ordering::SeqCst));
        root.emit(&TpEvent::Start);
        assert!(seen.load(std::sync::atomic::Ordering::SeqCst));

        let bus = leaf.expose::<EventBus>().unwrap().unwrap();
        assert!(Arc::ptr_eq(&bus, root.events()));
    }

    #[test]
    fn test_separate_roots_are_isolated() {
        let a = Injector::new();
        let b = Injector::new();
        bind(&a, "only-a", 1);
        assert!(!b.has(&Token::name("only-a")));
        assert!(!Arc::ptr_eq(a.events(), b.events()));
    }

    #[test]
    fn test_expose_type_mismatch() {
        let injector = Injector::new();
        bind(&injector, "n", 1);
        let err = injector.expose_token::<String>(&Token::name("n")).unwrap_err();
        assert!(matches!(err, DiError::TypeMismatch { expected: "String", .. }));
    }
}
