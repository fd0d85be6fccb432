// Context Registry - identity-based sharing of Exclusive contexts

use crate::application::exclusive::Exclusive;
use crate::domain::ContextKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Maps keys to live [`Exclusive`] contexts so call sites sharing only a key
/// share one serialization domain.
///
/// The registry is owned by the application and handed to whoever needs it;
/// clones share the same map. Every operation is a single critical section
/// that never spans an `.await`, and none of them can fail.
///
/// Entries are never evicted implicitly. Call [`remove`](Self::remove) for keys
/// that are no longer needed.
#[derive(Clone, Default)]
pub struct ContextRegistry {
    contexts: Arc<Mutex<HashMap<ContextKey, Exclusive>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the context registered under `key`, creating and registering
    /// a fresh one if there is none
    pub fn get_or_create(&self, key: &ContextKey) -> Exclusive {
        self.lock()
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(context = %key, "Creating context");
                Exclusive::with_key(Some(key.clone()))
            })
            .clone()
    }

    /// Create a fresh context under `key`, replacing any existing one
    ///
    /// Holders of the replaced context keep using it; work already queued
    /// there is unaffected. Only later lookups see the new context.
    pub fn register(&self, key: &ContextKey) -> Exclusive {
        let context = Exclusive::with_key(Some(key.clone()));
        if let Some(old) = self.lock().insert(key.clone(), context.clone()) {
            info!(
                context = %key,
                pending = old.pending(),
                "Context replaced"
            );
        }
        context
    }

    /// Forget the context registered under `key`
    ///
    /// Idempotent. The detached context is returned and stays usable; the
    /// next `get_or_create` for this key starts an empty chain.
    pub fn remove(&self, key: &ContextKey) -> Option<Exclusive> {
        let removed = self.lock().remove(key);
        if removed.is_some() {
            debug!(context = %key, "Context removed");
        }
        removed
    }

    /// Context registered under `key`, without creating one
    pub fn get(&self, key: &ContextKey) -> Option<Exclusive> {
        self.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<ContextKey> {
        let mut keys: Vec<ContextKey> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Detach every context (teardown)
    ///
    /// In-flight work keeps running on the detached contexts.
    pub fn clear(&self) {
        let mut contexts = self.lock();
        let count = contexts.len();
        contexts.clear();
        debug!(count, "Registry cleared");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContextKey, Exclusive>> {
        // No user code runs under this lock, so a poisoned map is still consistent
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
