use crate::entry::Fetched;
use crate::error::{BoxError, ComputeError};
use crate::metrics::MetricsSnapshot;
use crate::shared::{ErrorHandler, Job, Load, Lookup, Task};
use crate::ttl::Ttl;
use crate::Cache;

use std::hash::Hash;
use std::sync::Arc;

impl<K, V> Cache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Returns the value for `key`, computing it if needed.
  ///
  /// - **Fresh hit**: returns the cached value; `compute` is not called.
  /// - **Stale hit**: returns the cached value immediately and queues
  ///   `compute` as a background refresh, unless one is already pending.
  /// - **Miss**: queues `compute` (or joins the computation another caller
  ///   already started) and blocks until it has finished.
  ///
  /// `compute` returns `Ok(None)` when there is no value for the key. Errors
  /// never reach the caller; they go to the cache's default error handler.
  pub fn fetch<F, E>(&self, key: K, ttl: impl Into<Ttl>, compute: F) -> Fetched<V>
  where
    F: FnOnce() -> Result<Option<V>, E> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    self.fetch_inner(key, ttl.into(), compute, None)
  }

  /// Like `fetch`, but failures of this call's `compute` go to `on_error`
  /// instead of the cache's default handler.
  pub fn fetch_with_handler<F, E, H>(
    &self,
    key: K,
    ttl: impl Into<Ttl>,
    compute: F,
    on_error: H,
  ) -> Fetched<V>
  where
    F: FnOnce() -> Result<Option<V>, E> + Send + 'static,
    E: Into<BoxError> + 'static,
    H: Fn(&ComputeError) + Send + Sync + 'static,
  {
    self.fetch_inner(key, ttl.into(), compute, Some(Arc::new(on_error)))
  }

  fn fetch_inner<F, E>(
    &self,
    key: K,
    ttl: Ttl,
    compute: F,
    on_error: Option<ErrorHandler>,
  ) -> Fetched<V>
  where
    F: FnOnce() -> Result<Option<V>, E> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    let lookup = self.shared.lookup(&key);
    let task = |key| Task {
      key,
      ttl,
      job: Job::blocking(compute),
      on_error,
    };

    match lookup {
      Lookup::Fresh(entry) => entry.fetched(),
      Lookup::Stale(entry) => {
        self.shared.refresh(task(key));
        entry.fetched()
      }
      Lookup::Miss => match self.shared.load(task(key.clone())) {
        Load::Ready(fetched) => fetched,
        Load::Wait(completion) => {
          let outcome = completion.wait();
          self.shared.resolve(&key, outcome)
        }
      },
    }
  }

  /// Returns the number of entries currently stored.
  pub fn len(&self) -> usize {
    self.shared.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns the number of keys with a computation queued or running.
  pub fn pending(&self) -> usize {
    self.shared.pending()
  }

  /// Returns true if a computation for `key` is queued or running.
  pub fn is_pending(&self, key: &K) -> bool {
    self.shared.is_pending(key)
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.core.metrics.snapshot()
  }
}
