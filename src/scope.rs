//! Injector arena
//!
//! Injectors form a tree. Nodes live in an arena keyed by [`InjectorId`];
//! a node stores its parent as an id and its children as an id list, so
//! the tree owns every node exactly once and no reference cycles exist.

use crate::events::EventBus;
use crate::provider::Provider;
use crate::storage::ProviderStorage;
use crate::token::{Token, stringify};
use crate::{DiError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Creation ordinal of an injector, unique for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InjectorId(u64);

impl InjectorId {
    /// Next ordinal.
    #[inline]
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InjectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "injector-{}", self.0)
    }
}

/// Sentinel above every root injector.
///
/// Lookups always miss. [`NullInjector::require`] turns the miss into the
/// standard missing-provider diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInjector;

impl NullInjector {
    #[inline]
    pub fn get(&self, _token: &Token) -> Option<Arc<Provider>> {
        None
    }

    #[inline]
    pub fn has(&self, _token: &Token) -> bool {
        false
    }

    /// Fail with a `ProviderNotFound` naming `position[index]`.
    pub fn require(&self, token: &Token, position: &str, index: usize) -> Result<Arc<Provider>> {
        Err(DiError::not_found(stringify(token), position, index))
    }
}

pub(crate) struct InjectorNode {
    pub(crate) parent: Option<InjectorId>,
    pub(crate) depth: u32,
    pub(crate) children: Mutex<Vec<InjectorId>>,
    pub(crate) storage: ProviderStorage,
}

impl InjectorNode {
    pub(crate) fn children(&self) -> Vec<InjectorId> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Arena holding every node of one injector tree plus its event bus.
pub(crate) struct InjectorTree {
    pub(crate) root: InjectorId,
    nodes: DashMap<InjectorId, Arc<InjectorNode>, RandomState>,
    pub(crate) events: Arc<EventBus>,
}

impl InjectorTree {
    /// New tree containing only a root node.
    pub(crate) fn new() -> Self {
        let root = InjectorId::next();
        let nodes = DashMap::with_capacity_and_hasher_and_shard_amount(1, RandomState::new(), 8);
        nodes.insert(
            root,
            Arc::new(InjectorNode {
                parent: None,
                depth: 0,
                children: Mutex::new(Vec::new()),
                storage: ProviderStorage::new(),
            }),
        );
        Self {
            root,
            nodes,
            events: Arc::new(EventBus::new()),
        }
    }

    /// Allocate a child of `parent` and append it to the parent's children.
    ///
    /// Nodes are never removed, so `parent` is always present when it came
    /// from a live handle.
    pub(crate) fn add_child(&self, parent: InjectorId) -> InjectorId {
        let parent_node = self.node(parent);
        let id = InjectorId::next();
        self.nodes.insert(
            id,
            Arc::new(InjectorNode {
                parent: Some(parent),
                depth: parent_node.as_ref().map_or(1, |p| p.depth + 1),
                children: Mutex::new(Vec::new()),
                storage: ProviderStorage::new(),
            }),
        );
        if let Some(parent_node) = parent_node {
            parent_node
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(id);
        }
        id
    }

    #[inline]
    pub(crate) fn node(&self, id: InjectorId) -> Option<Arc<InjectorNode>> {
        self.nodes.get(&id).map(|n| Arc::clone(n.value()))
    }

    /// Nearest binding of `token`, starting at `start` and walking up.
    pub(crate) fn lookup(&self, start: InjectorId, token: &Token) -> Option<Arc<Provider>> {
        let mut current = Some(start);
        while let Some(id) = current {
            let node = self.node(id)?;
            if let Some(provider) = node.storage.get(token) {
                return Some(provider);
            }
            current = node.parent;
        }
        NullInjector.get(token)
    }

    pub(crate) fn contains(&self, start: InjectorId, token: &Token) -> bool {
        let mut current = Some(start);
        while let Some(id) = current {
            let Some(node) = self.node(id) else {
                return false;
            };
            if node.storage.contains(token) {
                return true;
            }
            current = node.parent;
        }
        NullInjector.has(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ValueProvider;

    #[test]
    fn test_injector_ids_unique() {
        let a = InjectorId::next();
        let b = InjectorId::next();
        assert!(b > a);
        assert!(format!("{a}").starts_with("injector-"));
    }

    #[test]
    fn test_tree_children_and_lookup() {
        let tree = InjectorTree::new();
        let child = tree.add_child(tree.root);
        let grandchild = tree.add_child(child);

        let token = Token::name("shared");
        let root_node = tree.node(tree.root).unwrap();
        let provider = Provider::Value(ValueProvider::new(token.clone(), 1u8));
        root_node.storage.insert(token.clone(), Arc::new(provider));

        assert_eq!(root_node.children(), vec![child]);
        assert_eq!(tree.node(grandchild).unwrap().depth, 2);
        assert!(tree.lookup(grandchild, &token).is_some());
        assert!(tree.contains(grandchild, &token));
        assert!(tree.lookup(grandchild, &Token::name("missing")).is_none());
    }

    #[test]
    fn test_null_injector_require_message() {
        let err = NullInjector.require(&Token::name("X"), "Owner", 1).unwrap_err();
        assert_eq!(err.to_string(), "Can't find provider of \"X\" at {Owner[1]}");
    }
}
