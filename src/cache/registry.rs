//! Cache registry - Central management for all caches.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::{CacheConfig, TypedCache};

/// Central registry of named caches.
///
/// Repositories ask for their cache by name; asking twice returns a handle
/// to the same cache.
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

/// Internal cache entry storing type-erased cache.
struct CacheEntry {
    cache: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an existing cache or create a new one if it doesn't exist.
    ///
    /// A name already registered with different key/value types gets a
    /// fresh, unregistered cache and a warning.
    pub fn get_or_create<K, V>(&self, name: &str, config: CacheConfig) -> TypedCache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut caches = self.caches.write().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = caches.get(name) {
            if let Some(cache) = entry.cache.downcast_ref::<TypedCache<K, V>>() {
                return cache.clone();
            }
            warn!(
                "Cache '{}' already registered as {}, requested {}",
                name,
                entry.type_name,
                std::any::type_name::<TypedCache<K, V>>()
            );
            return TypedCache::new(name, config);
        }

        debug!("Creating cache: {}", name);
        let cache = TypedCache::new(name, config);
        caches.insert(
            name.to_string(),
            CacheEntry {
                cache: Box::new(cache.clone()),
                type_name: std::any::type_name::<TypedCache<K, V>>(),
            },
        );
        cache
    }

    /// Get the number of registered caches.
    pub fn len(&self) -> usize {
        self.caches.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let caches = self.caches.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("CacheRegistry")
            .field("cache_count", &caches.len())
            .field("cache_names", &caches.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_shares_cache() {
        let registry = CacheRegistry::new();
        let a: TypedCache<u64, String> = registry.get_or_create("langs", CacheConfig::default());
        let b: TypedCache<u64, String> = registry.get_or_create("langs", CacheConfig::default());

        a.insert(1, "uk".to_string());
        assert_eq!(b.get(&1).as_deref(), Some("uk"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_type_mismatch_gets_separate_cache() {
        let registry = CacheRegistry::new();
        let a: TypedCache<u64, String> = registry.get_or_create("x", CacheConfig::default());
        let b: TypedCache<u64, u32> = registry.get_or_create("x", CacheConfig::default());

        a.insert(1, "one".to_string());
        b.insert(1, 1);
        assert_eq!(a.get(&1).as_deref(), Some("one"));
        assert_eq!(b.get(&1), Some(1));
        assert_eq!(registry.len(), 1);
    }
}
