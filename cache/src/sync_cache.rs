use crate::entry::{Entry, Fetched};
use crate::error::BoxError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::store::BoundedStore;
use crate::ttl::{Expiry, Ttl};

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

/// A bounded cache that recomputes inline.
///
/// There is no background refresh and no coalescing: a stale or missing
/// entry is recomputed on the calling thread, and compute errors are
/// returned to the caller. Concurrent callers for the same missing key may
/// each run their own computation.
pub struct SyncCache<K, V> {
  store: Arc<dyn BoundedStore<K, V>>,
  expiry: Expiry,
  cache_absent: bool,
  metrics: Metrics,
}

impl<K, V> fmt::Debug for SyncCache<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SyncCache")
      .field("len", &self.store.len())
      .field("default_ttl", &self.expiry.default_ttl())
      .field("cache_absent", &self.cache_absent)
      .finish_non_exhaustive()
  }
}

impl<K, V> SyncCache<K, V>
where
  K: Eq + Hash + Clone,
{
  pub(crate) fn new(store: Arc<dyn BoundedStore<K, V>>, expiry: Expiry, cache_absent: bool) -> Self {
    Self {
      store,
      expiry,
      cache_absent,
      metrics: Metrics::new(),
    }
  }

  /// Returns the fresh value for `key`, or runs `compute` and stores what it
  /// produces. A compute error is returned and leaves the store untouched,
  /// including any stale entry already there.
  pub fn fetch<F, E>(&self, key: K, ttl: impl Into<Ttl>, compute: F) -> Result<Fetched<V>, BoxError>
  where
    F: FnOnce() -> Result<Option<V>, E>,
    E: Into<BoxError>,
  {
    if let Some(entry) = self.store.get(&key) {
      if !entry.is_stale(Instant::now()) {
        Metrics::incr(&self.metrics.hits);
        return Ok(entry.fetched());
      }
    }
    Metrics::incr(&self.metrics.misses);
    Metrics::incr(&self.metrics.loads_started);

    let value = match compute() {
      Ok(value) => value,
      Err(err) => {
        Metrics::incr(&self.metrics.loads_failed);
        return Err(err.into());
      }
    };
    if value.is_none() && !self.cache_absent {
      Metrics::incr(&self.metrics.loads_discarded);
      return Ok(Fetched::Absent);
    }

    let entry = Entry::new(
      value.map(Arc::new),
      self.expiry.expires_at(ttl.into(), Instant::now()),
    );
    let fetched = entry.fetched();
    if self.store.add(key, entry) {
      Metrics::incr(&self.metrics.evicted_by_capacity);
    }
    Metrics::incr(&self.metrics.inserts);
    Metrics::incr(&self.metrics.loads_stored);
    Ok(fetched)
  }

  /// Returns the number of entries currently stored.
  pub fn len(&self) -> usize {
    self.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.store.is_empty()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}
