use crate::builder::CacheBuilder;
use crate::entry::Fetched;
use crate::error::{BoxError, BuildError, RegistryError};
use crate::sync_cache::SyncCache;
use crate::ttl::Ttl;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A set of named `SyncCache`s keyed by string.
///
/// Lookups take a read lock; registering takes the write lock. The lock is
/// never held while a compute function runs.
pub struct CacheRegistry<V> {
  caches: RwLock<HashMap<String, Arc<SyncCache<String, V>>>>,
}

impl<V> fmt::Debug for CacheRegistry<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let caches = self.caches.read();
    let mut names: Vec<&String> = caches.keys().collect();
    names.sort();
    f.debug_struct("CacheRegistry").field("caches", &names).finish()
  }
}

impl<V> Default for CacheRegistry<V> {
  fn default() -> Self {
    Self {
      caches: RwLock::new(HashMap::new()),
    }
  }
}

impl<V> CacheRegistry<V>
where
  V: Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `cache` under `name`, replacing any cache already there.
  pub fn register(&self, name: impl Into<String>, cache: SyncCache<String, V>) -> Arc<SyncCache<String, V>> {
    let name = name.into();
    let cache = Arc::new(cache);
    if self.caches.write().insert(name.clone(), cache.clone()).is_some() {
      tracing::debug!(name = %name, "replaced registered cache");
    }
    cache
  }

  /// Builds a `SyncCache` from `builder` and registers it under `name`.
  pub fn create(
    &self,
    name: impl Into<String>,
    builder: CacheBuilder<String, V>,
  ) -> Result<Arc<SyncCache<String, V>>, BuildError> {
    let cache = builder.build_sync_cache()?;
    Ok(self.register(name, cache))
  }

  /// Returns the cache registered under `name`.
  pub fn get(&self, name: &str) -> Result<Arc<SyncCache<String, V>>, RegistryError> {
    self
      .caches
      .read()
      .get(name)
      .cloned()
      .ok_or_else(|| RegistryError::NotInitialized(name.to_string()))
  }

  /// Removes and returns the cache registered under `name`.
  pub fn remove(&self, name: &str) -> Option<Arc<SyncCache<String, V>>> {
    self.caches.write().remove(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.caches.read().contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.caches.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.caches.read().is_empty()
  }

  /// Fetches `key` from the cache named `name`. See `SyncCache::fetch`.
  pub fn fetch<F, E>(
    &self,
    name: &str,
    key: impl Into<String>,
    ttl: impl Into<Ttl>,
    compute: F,
  ) -> Result<Fetched<V>, RegistryError>
  where
    F: FnOnce() -> Result<Option<V>, E>,
    E: Into<BoxError>,
  {
    let cache = self.get(name)?;
    cache.fetch(key.into(), ttl, compute).map_err(RegistryError::Compute)
  }
}
