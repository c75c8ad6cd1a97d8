use crate::dispatch::Dispatcher;
use crate::entry::{Entry, Fetched};
use crate::error::{BoxError, ComputeError};
use crate::inflight::{Completion, Flight, InFlight, Outcome};
use crate::metrics::Metrics;
use crate::store::BoundedStore;
use crate::ttl::{Expiry, Ttl};
use crate::TaskSpawner;

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A callback receiving compute failures. Invoked synchronously inside the
/// background execution unit, so it should return quickly.
pub type ErrorHandler = Arc<dyn Fn(&ComputeError) + Send + Sync>;

pub(crate) type ComputeResult<V> = Result<Option<V>, BoxError>;

/// The deferred computation carried by a task.
pub(crate) enum Job<V> {
  /// Runs on its own OS thread.
  Blocking(Box<dyn FnOnce() -> ComputeResult<V> + Send>),
  /// Runs as its own task on the configured `TaskSpawner`.
  Async(Pin<Box<dyn Future<Output = ComputeResult<V>> + Send>>),
}

impl<V: 'static> Job<V> {
  pub(crate) fn blocking<F, E>(compute: F) -> Self
  where
    F: FnOnce() -> Result<Option<V>, E> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    Job::Blocking(Box::new(move || compute().map_err(Into::into)))
  }

  pub(crate) fn future<F, Fut, E>(compute: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    Job::Async(Box::pin(async move { compute().await.map_err(Into::into) }))
  }
}

/// A unit of work handed to the dispatcher.
pub(crate) struct Task<K, V> {
  pub(crate) key: K,
  pub(crate) ttl: Ttl,
  pub(crate) job: Job<V>,
  pub(crate) on_error: Option<ErrorHandler>,
}

/// Everything an execution unit needs. Shared between the cache handles, the
/// dispatch thread and every running computation.
pub(crate) struct CacheCore<K, V> {
  pub(crate) store: Arc<dyn BoundedStore<K, V>>,
  pub(crate) inflight: Arc<InFlight<K>>,
  pub(crate) expiry: Expiry,
  pub(crate) cache_absent: bool,
  pub(crate) stale_grace: Option<Duration>,
  pub(crate) on_error: Option<ErrorHandler>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) spawner: Option<Arc<dyn TaskSpawner>>,
}

impl<K, V> CacheCore<K, V>
where
  K: Eq + Hash + Clone,
{
  /// Whether an entry may still be returned. Without a grace period every
  /// resident entry is usable, however old.
  #[inline]
  pub(crate) fn is_usable(&self, entry: &Entry<V>, now: Instant) -> bool {
    match self.stale_grace {
      Some(grace) => !entry.is_past_grace(now, grace),
      None => true,
    }
  }

  /// Applies a finished computation to the store and reports how it ended.
  /// Failures go to the per-call handler, else the default one; the store is
  /// left untouched.
  pub(crate) fn settle(
    &self,
    key: &K,
    ttl: Ttl,
    result: ComputeResult<V>,
    on_error: Option<&ErrorHandler>,
  ) -> Outcome {
    match result {
      Err(source) => {
        Metrics::incr(&self.metrics.loads_failed);
        let err = ComputeError::new(source);
        match on_error.or(self.on_error.as_ref()) {
          Some(handler) => handler(&err),
          None => tracing::warn!(error = %err, "compute failed with no error handler installed"),
        }
        Outcome::Failed
      }
      Ok(None) if !self.cache_absent => {
        Metrics::incr(&self.metrics.loads_discarded);
        Outcome::Discarded
      }
      Ok(value) => {
        let entry = Entry::new(
          value.map(Arc::new),
          self.expiry.expires_at(ttl, Instant::now()),
        );
        if self.store.add(key.clone(), entry) {
          Metrics::incr(&self.metrics.evicted_by_capacity);
        }
        Metrics::incr(&self.metrics.inserts);
        Metrics::incr(&self.metrics.loads_stored);
        Outcome::Stored
      }
    }
  }
}

/// How a key looked on the first store read of a `fetch`.
pub(crate) enum Lookup<V> {
  Fresh(Entry<V>),
  Stale(Entry<V>),
  Miss,
}

/// What the miss path should do next.
pub(crate) enum Load<V> {
  Ready(Fetched<V>),
  Wait(Arc<Completion>),
}

/// The internal, thread-safe core of the cache shared by its handles.
pub(crate) struct CacheShared<K: Send, V: Send> {
  pub(crate) core: Arc<CacheCore<K, V>>,
  dispatcher: Dispatcher<K, V>,
}

impl<K: Send, V: Send> fmt::Debug for CacheShared<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("len", &self.core.store.len())
      .field("default_ttl", &self.core.expiry.default_ttl())
      .field("jitter", &self.core.expiry.jitter())
      .field("cache_absent", &self.core.cache_absent)
      .field("stale_grace", &self.core.stale_grace)
      .field("metrics", &self.core.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K, V> CacheShared<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(core: CacheCore<K, V>, queue_capacity: usize) -> Self {
    let core = Arc::new(core);
    let dispatcher = Dispatcher::spawn(Arc::clone(&core), queue_capacity);
    Self { core, dispatcher }
  }

  pub(crate) fn lookup(&self, key: &K) -> Lookup<V> {
    let metrics = &self.core.metrics;
    let Some(entry) = self.core.store.get(key) else {
      Metrics::incr(&metrics.misses);
      return Lookup::Miss;
    };

    let now = Instant::now();
    if !entry.is_stale(now) {
      Metrics::incr(&metrics.hits);
      Lookup::Fresh(entry)
    } else if self.core.is_usable(&entry, now) {
      Metrics::incr(&metrics.stale_hits);
      Lookup::Stale(entry)
    } else {
      Metrics::incr(&metrics.misses);
      Lookup::Miss
    }
  }

  /// Stale path: request a background refresh without waiting for it. If a
  /// computation is already pending the task is dropped unrun.
  pub(crate) fn refresh(&self, task: Task<K, V>) {
    let key = task.key.clone();
    if let Flight::Started(_) = self.core.inflight.join_or_start(&key, || true) {
      if self.submit(&key, task) {
        tracing::debug!("stale entry served, background refresh started");
      }
    }
  }

  /// Miss path: join the pending computation or start one.
  ///
  /// The store is checked again under the registry lock, so a result that
  /// landed since `lookup` is returned instead of computed twice.
  pub(crate) fn load(&self, task: Task<K, V>) -> Load<V> {
    let key = task.key.clone();
    let mut landed = None;
    let flight = self.core.inflight.join_or_start(&key, || {
      if let Some(entry) = self.core.store.get(&key) {
        if self.core.is_usable(&entry, Instant::now()) {
          landed = Some(entry);
          return false;
        }
      }
      true
    });

    match flight {
      Flight::Joined(completion) => {
        Metrics::incr(&self.core.metrics.coalesced);
        tracing::debug!("cache miss, joined pending computation");
        Load::Wait(completion)
      }
      Flight::Started(completion) => {
        if !self.submit(&key, task) {
          return Load::Ready(Fetched::NotComputed);
        }
        tracing::debug!("cache miss, computation started");
        Load::Wait(completion)
      }
      Flight::Declined => match landed {
        Some(entry) => Load::Ready(entry.fetched()),
        None => Load::Ready(Fetched::NotComputed),
      },
    }
  }

  /// Hands a registered task to the dispatcher, blocking while its queue is
  /// full. Called with the registry lock released. If the dispatcher is gone
  /// the key is finished as failed so joined callers are released.
  fn submit(&self, key: &K, task: Task<K, V>) -> bool {
    if !self.dispatcher.submit(task) {
      self.core.inflight.finish(key, Outcome::Failed);
      return false;
    }
    Metrics::incr(&self.core.metrics.loads_started);
    true
  }

  /// Re-reads the store once the computation a miss waited on has finished.
  pub(crate) fn resolve(&self, key: &K, outcome: Outcome) -> Fetched<V> {
    match self.core.store.get(key) {
      Some(entry) if self.core.is_usable(&entry, Instant::now()) => entry.fetched(),
      _ => match outcome {
        Outcome::Discarded => Fetched::Absent,
        Outcome::Stored | Outcome::Failed => Fetched::NotComputed,
      },
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.core.store.len()
  }

  pub(crate) fn pending(&self) -> usize {
    self.core.inflight.len()
  }

  pub(crate) fn is_pending(&self, key: &K) -> bool {
    self.core.inflight.is_pending(key)
  }
}
