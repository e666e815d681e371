//! Process-wide registry of running searches.
//!
//! One entry per live search, keyed by search id. The supervisor inserts the
//! entry before it starts consuming tool output and removes it on every
//! terminal path; the cancel endpoint removes it to request termination.
//! Removal is idempotent, so a cancel racing the supervisor's own cleanup is
//! harmless.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct SearchRegistry {
    inner: Arc<DashMap<String, CancellationToken>>,
}

impl SearchRegistry {
    /// Insert an entry for a freshly spawned search. Only the supervisor
    /// calls this, before it reads any output.
    pub fn register(&self, search_id: &str, token: CancellationToken) {
        self.inner.insert(search_id.to_string(), token);
    }

    /// Whether the search is still believed to be running.
    pub fn contains(&self, search_id: &str) -> bool {
        self.inner.contains_key(search_id)
    }

    /// Remove an entry without signaling. Returns whether it was present.
    pub fn remove(&self, search_id: &str) -> bool {
        self.inner.remove(search_id).is_some()
    }

    /// Remove an entry and trigger its cancellation token. Returns `false`
    /// when the id is unknown (already finished, already cancelled, or never
    /// existed) so callers can report not-found.
    pub fn cancel(&self, search_id: &str) -> bool {
        match self.inner.remove(search_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Removes a registry entry when dropped. Keeps the "entry exists iff the
/// process is believed alive" invariant on every exit path of the
/// supervisor, including panics and an early drop of the event stream.
#[derive(Debug)]
pub struct RegistryGuard {
    registry: SearchRegistry,
    search_id: String,
}

impl RegistryGuard {
    pub fn new(registry: SearchRegistry, search_id: String) -> Self {
        Self {
            registry,
            search_id,
        }
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.search_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_unknown_id_is_not_found() {
        let registry = SearchRegistry::default();
        assert!(!registry.cancel("nope"));
    }

    #[test]
    fn cancel_is_idempotent() {
        let registry = SearchRegistry::default();
        let token = CancellationToken::new();
        registry.register("abc", token.clone());

        assert!(registry.cancel("abc"));
        assert!(token.is_cancelled());
        // Second cancel on the same id reports not-found, not an error.
        assert!(!registry.cancel("abc"));
    }

    #[test]
    fn guard_removes_entry_on_drop() {
        let registry = SearchRegistry::default();
        registry.register("abc", CancellationToken::new());
        {
            let _guard = RegistryGuard::new(registry.clone(), "abc".to_string());
            assert!(registry.contains("abc"));
        }
        assert!(!registry.contains("abc"));
    }

    #[test]
    fn guard_tolerates_prior_removal() {
        let registry = SearchRegistry::default();
        registry.register("abc", CancellationToken::new());
        let guard = RegistryGuard::new(registry.clone(), "abc".to_string());
        assert!(registry.cancel("abc"));
        drop(guard);
        assert!(registry.is_empty());
    }
}
