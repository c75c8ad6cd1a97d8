mod futures;
mod sync;

use crate::shared::CacheShared;

use std::sync::Arc;

/// A thread-safe, synchronous stale-while-revalidate cache.
///
/// Computations run on their own OS threads; a caller that misses blocks
/// until the computation it triggered or joined has finished.
#[derive(Debug)]
pub struct Cache<K: Send, V: Send> {
  pub(crate) shared: Arc<CacheShared<K, V>>,
}

/// A thread-safe, asynchronous stale-while-revalidate cache.
///
/// Computations are spawned on the cache's `TaskSpawner`; a caller that
/// misses awaits the computation without blocking its thread.
#[derive(Debug)]
pub struct AsyncCache<K: Send, V: Send> {
  pub(crate) shared: Arc<CacheShared<K, V>>,
}

impl<K: Send, V: Send> Clone for Cache<K, V> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<K: Send, V: Send> Clone for AsyncCache<K, V> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}
