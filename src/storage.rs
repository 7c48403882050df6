//! Provider storage for a single injector
//!
//! Uses DashMap for lock-free concurrent access. Insertion order is kept
//! alongside each binding so diagnostics can list providers in the order
//! they were registered.

use crate::provider::Provider;
use crate::token::Token;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

struct Binding {
    seq: u64,
    provider: Arc<Provider>,
}

/// Local token -> provider bindings of one injector.
pub(crate) struct ProviderStorage {
    bindings: DashMap<Token, Binding, RandomState>,
    seq: AtomicU64,
}

impl ProviderStorage {
    /// Create new empty storage.
    ///
    /// Uses 8 shards: injectors rarely hold more than a few dozen bindings
    /// and the default of `num_cpus * 4` makes child creation expensive.
    #[inline]
    pub fn new() -> Self {
        Self {
            bindings: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            seq: AtomicU64::new(0),
        }
    }

    /// Bind `token`, replacing any previous local binding (last write wins).
    #[inline]
    pub fn insert(&self, token: Token, provider: Arc<Provider>) -> Arc<Provider> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.bindings.insert(
            token,
            Binding {
                seq,
                provider: Arc::clone(&provider),
            },
        );
        provider
    }

    #[inline]
    pub fn get(&self, token: &Token) -> Option<Arc<Provider>> {
        self.bindings.get(token).map(|b| Arc::clone(&b.provider))
    }

    #[inline]
    pub fn contains(&self, token: &Token) -> bool {
        self.bindings.contains_key(token)
    }

    #[inline]
    pub fn remove(&self, token: &Token) -> bool {
        self.bindings.remove(token).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Bindings in registration order.
    pub fn entries(&self) -> Vec<(Token, Arc<Provider>)> {
        let mut entries: Vec<(u64, Token, Arc<Provider>)> = self
            .bindings
            .iter()
            .map(|r| (r.value().seq, r.key().clone(), Arc::clone(&r.value().provider)))
            .collect();
        entries.sort_by_key(|(seq, _, _)| *seq);
        entries.into_iter().map(|(_, token, provider)| (token, provider)).collect()
    }
}

impl Default for ProviderStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderStorage")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ValueProvider;

    fn value(token: &Token, v: i32) -> Arc<Provider> {
        Arc::new(Provider::Value(ValueProvider::new(token.clone(), v)))
    }

    #[test]
    fn test_storage_insert_and_get() {
        let storage = ProviderStorage::new();
        let token = Token::name("answer");
        storage.insert(token.clone(), value(&token, 42));

        let provider = storage.get(&token).unwrap();
        let instance = provider.create(&[]).unwrap();
        assert_eq!(*instance.downcast::<i32>().unwrap(), 42);
    }

    #[test]
    fn test_storage_overwrite_keeps_last() {
        let storage = ProviderStorage::new();
        let token = Token::name("answer");
        storage.insert(token.clone(), value(&token, 1));
        let second = storage.insert(token.clone(), value(&token, 2));

        assert_eq!(storage.len(), 1);
        assert!(Arc::ptr_eq(&storage.get(&token).unwrap(), &second));
    }

    #[test]
    fn test_storage_entries_in_registration_order() {
        let storage = ProviderStorage::new();
        for name in ["c", "a", "b"] {
            let token = Token::name(name);
            storage.insert(token.clone(), value(&token, 0));
        }
        let names: Vec<String> = storage.entries().iter().map(|(t, _)| t.to_string()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn test_storage_remove() {
        let storage = ProviderStorage::new();
        let token = Token::name("gone");
        storage.insert(token.clone(), value(&token, 0));
        assert!(storage.contains(&token));

        assert!(storage.remove(&token));
        assert!(!storage.contains(&token));
    }
}
