//! Repository trait plus a `dashmap`-backed caching decorator, matching the
//! original's `CachedMetadataAppRepository` / `CachedUserHistoryDefinitionRepository`
//! pairing of a raw metadata-service-backed repository with a cache in front
//! of it.

use dashmap::DashMap;

use crate::error::Result;

pub trait Repository<K, V>: Send + Sync
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    fn get(&self, key: &K) -> Result<V>;
}

/// Wraps a `Repository` with an unbounded `dashmap` cache, matching the
/// teacher's preference for `dashmap`-backed caches over ad hoc mutexes.
/// Entries are never evicted here — the catalog is reloaded wholesale by an
/// external process on its own cadence (see the catalog cache note in
/// `DESIGN.md`), so per-entry TTL would just duplicate that reload.
pub struct CachedRepository<K, V, R>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
    R: Repository<K, V>,
{
    inner: R,
    cache: DashMap<K, V>,
}

impl<K, V, R> CachedRepository<K, V, R>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
    R: Repository<K, V>,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.clear();
    }
}

impl<K, V, R> Repository<K, V> for CachedRepository<K, V, R>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
    R: Repository<K, V>,
{
    fn get(&self, key: &K) -> Result<V> {
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit.clone());
        }
        let value = self.inner.get(key)?;
        self.cache.insert(key.clone(), value.clone());
        Ok(value)
    }
}
