use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Key scopes for the catalog cache. Keys are `<scope>` or `<scope>:<rest>`;
/// invalidation works on whole scopes or on a single key.
pub mod scope {
    pub const PRODUCTS: &str = "products";
    pub const PRODUCT: &str = "product";
    pub const RECENT_PRODUCTS: &str = "recent_products";
    pub const STORE_PRODUCTS: &str = "store_products";
    pub const CATEGORY_PRODUCTS: &str = "category_products";
    pub const CATEGORIES: &str = "categories";
}

pub fn key(scope: &str, rest: impl std::fmt::Display) -> String {
    format!("{scope}:{rest}")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }
}

struct Entry {
    value: String,
    inserted_at: Instant,
}

struct Inner {
    entries: RwLock<HashMap<String, Entry>>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Read-through cache for catalog queries. Values are stored as serialized
/// JSON so the same store can hold any view type. Entries expire after `ttl`
/// and the map is capped at `capacity`, evicting the oldest entry first.
///
/// Correctness never depends on this cache: every write path to the
/// underlying tables must call one of the `invalidate*` methods for the
/// scopes it touched.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<Inner>,
}

impl CatalogCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                capacity: capacity.max(1),
                ttl,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let expired = {
            let entries = self.inner.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if entry.inserted_at.elapsed() <= self.inner.ttl => {
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    return serde_json::from_str(&entry.value).ok();
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.inner.entries.write().unwrap();
            entries.remove(key);
        }
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn put<T: Serialize>(&self, key: impl Into<String>, value: &T) {
        let Ok(serialized) = serde_json::to_string(value) else {
            return;
        };
        let mut entries = self.inner.entries.write().unwrap();
        let key = key.into();
        if !entries.contains_key(&key) && entries.len() >= self.inner.capacity {
            self.evict_one(&mut entries);
        }
        entries.insert(
            key,
            Entry {
                value: serialized,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        let mut entries = self.inner.entries.write().unwrap();
        entries.remove(key);
    }

    /// Drop every key belonging to `scope`, e.g. `products` clears all
    /// paginated product listings, `store_products:<id>` clears one store's
    /// listings.
    pub fn invalidate_scope(&self, scope: &str) {
        let prefix = format!("{scope}:");
        let mut entries = self.inner.entries.write().unwrap();
        entries.retain(|key, _| key != scope && !key.starts_with(&prefix));
    }

    pub fn clear(&self) {
        let mut entries = self.inner.entries.write().unwrap();
        entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.entries.read().unwrap();
        CacheStats {
            entries: entries.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
        }
    }

    fn evict_one(&self, entries: &mut HashMap<String, Entry>) {
        // Expired entries go first; otherwise the oldest insert loses.
        let candidate = entries
            .iter()
            .filter(|(_, e)| e.inserted_at.elapsed() > self.inner.ttl)
            .map(|(k, _)| k.clone())
            .next()
            .or_else(|| {
                entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone())
            });
        if let Some(key) = candidate {
            entries.remove(&key);
            self.inner.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}
