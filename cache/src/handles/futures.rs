use crate::entry::Fetched;
use crate::error::{BoxError, ComputeError};
use crate::metrics::MetricsSnapshot;
use crate::shared::{ErrorHandler, Job, Load, Lookup, Task};
use crate::ttl::Ttl;
use crate::{AsyncCache, Cache};

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

// --- AsyncCache Implementation ---

impl<K, V> AsyncCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Converts this asynchronous `AsyncCache` into a synchronous `Cache`
  /// over the same store. This is a zero-cost conversion.
  pub fn to_sync(&self) -> Cache<K, V> {
    Cache {
      shared: self.shared.clone(),
    }
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.core.metrics.snapshot()
  }

  /// Returns the value for `key`, computing it if needed.
  ///
  /// Behaves like `Cache::fetch`, except that `compute` produces a future
  /// that is spawned on the cache's `TaskSpawner`, and a miss awaits the
  /// result instead of blocking the thread.
  ///
  /// Queuing the computation is not async. When the dispatcher's intake
  /// queue is full, a stale hit or a starting miss blocks the calling worker
  /// thread until a slot frees up. No cache lock is held meanwhile, so other
  /// callers keep being served. Size the cache capacity, which also bounds
  /// the queue, for the expected burst of distinct missing keys.
  pub async fn fetch<F, Fut, E>(&self, key: K, ttl: impl Into<Ttl>, compute: F) -> Fetched<V>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    self.fetch_inner(key, ttl.into(), compute, None).await
  }

  /// Like `fetch`, but failures of this call's `compute` go to `on_error`
  /// instead of the cache's default handler.
  pub async fn fetch_with_handler<F, Fut, E, H>(
    &self,
    key: K,
    ttl: impl Into<Ttl>,
    compute: F,
    on_error: H,
  ) -> Fetched<V>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
    H: Fn(&ComputeError) + Send + Sync + 'static,
  {
    let on_error: ErrorHandler = Arc::new(on_error);
    self.fetch_inner(key, ttl.into(), compute, Some(on_error)).await
  }

  async fn fetch_inner<F, Fut, E>(
    &self,
    key: K,
    ttl: Ttl,
    compute: F,
    on_error: Option<ErrorHandler>,
  ) -> Fetched<V>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    let completion = match self.shared.lookup(&key) {
      Lookup::Fresh(entry) => return entry.fetched(),
      Lookup::Stale(entry) => {
        self.shared.refresh(Task {
          key,
          ttl,
          job: Job::future(compute),
          on_error,
        });
        return entry.fetched();
      }
      Lookup::Miss => {
        let task = Task {
          key: key.clone(),
          ttl,
          job: Job::future(compute),
          on_error,
        };
        match self.shared.load(task) {
          Load::Ready(fetched) => return fetched,
          Load::Wait(completion) => completion,
        }
      }
    };

    let outcome = (&*completion).await;
    self.shared.resolve(&key, outcome)
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
}
