use crate::error::{BuildError, ComputeError};
use crate::handles::{AsyncCache, Cache};
use crate::inflight::InFlight;
use crate::metrics::Metrics;
use crate::shared::{CacheCore, CacheShared, ErrorHandler};
use crate::store::{ArcStore, BoundedStore};
use crate::sync_cache::SyncCache;
use crate::ttl::Expiry;
use crate::TaskSpawner;

use core::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;

/// The capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A builder for creating `Cache`, `AsyncCache` and `SyncCache` instances.
pub struct CacheBuilder<K: Send, V: Send> {
  pub(crate) capacity: usize,
  pub(crate) default_ttl: TimeDelta,
  pub(crate) jitter: Duration,
  pub(crate) cache_absent: bool,
  pub(crate) stale_grace: Option<Duration>,
  on_error: Option<ErrorHandler>,
  store: Option<Arc<dyn BoundedStore<K, V>>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
}

// Manual Debug implementation for CacheBuilder.
impl<K: Send, V: Send> fmt::Debug for CacheBuilder<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("capacity", &self.capacity)
      .field("default_ttl", &self.default_ttl)
      .field("jitter", &self.jitter)
      .field("cache_absent", &self.cache_absent)
      .field("stale_grace", &self.stale_grace)
      .field("has_error_handler", &self.on_error.is_some())
      .field("has_custom_store", &self.store.is_some())
      .finish_non_exhaustive()
  }
}

impl<K: Send, V: Send> Default for CacheBuilder<K, V> {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_CAPACITY,
      default_ttl: TimeDelta::zero(),
      jitter: Duration::ZERO,
      cache_absent: false,
      stale_grace: None,
      on_error: None,
      store: None,
      spawner: None,
    }
  }
}

// --- General Configuration Methods ---
// This impl block has no restrictive bounds on K or V.
impl<K: Send, V: Send> CacheBuilder<K, V> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the maximum number of entries. Also bounds the number of
  /// computations that may wait in the intake queue.
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Sets the TTL applied when a `fetch` passes `Ttl::Default`. Zero means
  /// such entries never expire; a negative value is rejected at build time.
  pub fn default_ttl(mut self, ttl: TimeDelta) -> Self {
    self.default_ttl = ttl;
    self
  }

  /// Like `default_ttl`, for callers holding a `std::time::Duration`.
  pub fn default_ttl_std(mut self, ttl: Duration) -> Self {
    self.default_ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
    self
  }

  /// Sets the width of the random window added to every finite TTL, so keys
  /// stored together do not all expire together.
  pub fn jitter(mut self, jitter: Duration) -> Self {
    self.jitter = jitter;
    self
  }

  /// Keeps `Ok(None)` results as absent entries, so repeat lookups for a
  /// missing key are answered from the cache.
  pub fn cache_absent(mut self, cache_absent: bool) -> Self {
    self.cache_absent = cache_absent;
    self
  }

  /// Limits how long past its expiry an entry may still be served stale.
  /// Older entries are treated as misses. Without this, stale entries are
  /// served for as long as they stay resident.
  pub fn stale_grace(mut self, grace: Duration) -> Self {
    self.stale_grace = Some(grace);
    self
  }

  /// Sets the handler that receives compute failures for calls that did not
  /// pass their own.
  pub fn on_error<H>(mut self, handler: H) -> Self
  where
    H: Fn(&ComputeError) + Send + Sync + 'static,
  {
    self.on_error = Some(Arc::new(handler));
    self
  }

  /// Replaces the default ARC store.
  pub fn store<S>(mut self, store: S) -> Self
  where
    S: BoundedStore<K, V> + 'static,
  {
    self.store = Some(Arc::new(store));
    self
  }

  /// Sets the spawner used for async computations. Required by
  /// `build_async` outside of a Tokio runtime.
  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }
}

// This impl block contains the full set of trait bounds required to actually
// construct a cache.
impl<K, V> CacheBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Builds a synchronous `Cache`.
  pub fn build(mut self) -> Result<Cache<K, V>, BuildError> {
    self.validate()?;
    let shared = self.build_shared_core(false)?;
    Ok(Cache { shared })
  }

  /// Builds an asynchronous `AsyncCache`.
  pub fn build_async(mut self) -> Result<AsyncCache<K, V>, BuildError> {
    self.validate()?;
    let shared = self.build_shared_core(true)?;
    Ok(AsyncCache { shared })
  }

  /// Builds a `SyncCache`, which computes inline on the calling thread and
  /// has no dispatcher. `stale_grace`, `on_error` and `spawner` are ignored.
  pub fn build_sync_cache(mut self) -> Result<SyncCache<K, V>, BuildError> {
    self.validate()?;
    let store = self.take_store()?;
    Ok(SyncCache::new(store, self.expiry(), self.cache_absent))
  }

  /// Central logic to construct the shared core of the cache.
  fn build_shared_core(
    &mut self,
    needs_spawner: bool,
  ) -> Result<Arc<CacheShared<K, V>>, BuildError> {
    #[allow(unused_mut)]
    let mut spawner = self.spawner.take();
    if needs_spawner && spawner.is_none() {
      #[cfg(feature = "tokio")]
      {
        spawner = crate::runtime::TokioSpawner::try_current()
          .map(|spawner| Arc::new(spawner) as Arc<dyn TaskSpawner>);
      }
      if spawner.is_none() {
        return Err(BuildError::SpawnerRequired);
      }
    }

    let core = CacheCore {
      store: self.take_store()?,
      inflight: Arc::new(InFlight::new()),
      expiry: self.expiry(),
      cache_absent: self.cache_absent,
      stale_grace: self.stale_grace,
      on_error: self.on_error.take(),
      metrics: Arc::new(Metrics::new()),
      spawner,
    };
    tracing::debug!(
      capacity = self.capacity,
      default_ttl = ?core.expiry.default_ttl(),
      jitter = ?core.expiry.jitter(),
      "cache built"
    );
    Ok(Arc::new(CacheShared::new(core, self.capacity)))
  }

  fn take_store(&mut self) -> Result<Arc<dyn BoundedStore<K, V>>, BuildError> {
    match self.store.take() {
      Some(store) => Ok(store),
      None => Ok(Arc::new(ArcStore::new(self.capacity)?)),
    }
  }

  fn expiry(&self) -> Expiry {
    Expiry::new(self.default_ttl.to_std().ok(), self.jitter)
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.capacity == 0 {
      return Err(BuildError::ZeroCapacity);
    }
    if self.default_ttl < TimeDelta::zero() {
      return Err(BuildError::NegativeDefaultTtl);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_capacity_is_rejected() {
    let err = CacheBuilder::<u32, u32>::new().capacity(0).build().unwrap_err();
    assert_eq!(err, BuildError::ZeroCapacity);
  }

  #[test]
  fn negative_default_ttl_is_rejected() {
    let err = CacheBuilder::<u32, u32>::new()
      .default_ttl(TimeDelta::seconds(-1))
      .build_sync_cache()
      .unwrap_err();
    assert_eq!(err, BuildError::NegativeDefaultTtl);
  }

  #[test]
  fn async_cache_outside_a_runtime_needs_a_spawner() {
    let err = CacheBuilder::<u32, u32>::new().build_async().unwrap_err();
    assert_eq!(err, BuildError::SpawnerRequired);
  }

  #[test]
  fn zero_default_ttl_never_expires() {
    let builder = CacheBuilder::<u32, u32>::new().default_ttl_std(Duration::ZERO);
    assert_eq!(builder.expiry().default_ttl(), None);
  }
}
